//! End-to-end tests through the reqwest transport
//!
//! These tests use wiremock to create mock HTTP servers standing in for the
//! target site and for proxy listing pages.

use crate::common::{tiny_delays, LogBuffer};
use std::sync::Arc;
use std::time::Duration;
use tenacious_fetch::config::parse_config;
use tenacious_fetch::fetcher::HttpTransport;
use tenacious_fetch::proxy::{discover, ProxyPool};
use tenacious_fetch::robots::{PolicyBasis, PolicyGate};
use tenacious_fetch::{FetchOutcome, FetchRequest, Fetcher, ReqwestTransport, Session};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> Arc<dyn HttpTransport> {
    Arc::new(ReqwestTransport::new().expect("Failed to build HTTP client"))
}

fn session_for(transport: &Arc<dyn HttpTransport>) -> Session {
    let gate = PolicyGate::new(Arc::clone(transport), "tenacious-fetch", Duration::from_secs(5));
    Session::new(ProxyPool::empty(), gate)
}

#[tokio::test]
async fn test_robots_disallow_skips_target() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/private/report"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>secret</html>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let transport = transport();
    let session = session_for(&transport);
    let fetcher = Fetcher::new(transport);

    let url = format!("{}/private/report", mock_server.uri());
    let request = FetchRequest::new(&url, 3, tiny_delays()).unwrap();
    let outcome = fetcher.fetch(&session, &request).await;

    assert!(matches!(outcome, FetchOutcome::Blocked { .. }));
    assert_eq!(session.policy().cached_origins().await, 1);
}

#[tokio::test]
async fn test_robots_server_error_fails_open() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>item page</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let transport = transport();
    let session = session_for(&transport);
    let fetcher = Fetcher::new(transport);

    let url = format!("{}/item", mock_server.uri());
    let decision = session.policy().decide(&Url::parse(&url).unwrap()).await;
    assert!(decision.allowed);
    assert_eq!(decision.basis, PolicyBasis::FailOpen);
    assert!(logs.contents().contains("allowing all requests"));

    let request = FetchRequest::new(&url, 1, tiny_delays()).unwrap();
    let outcome = fetcher.fetch(&session, &request).await;
    assert_eq!(outcome.body(), Some("<html>item page</html>"));
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let transport = transport();
    let session = session_for(&transport);

    let url = Url::parse(&format!("{}/anything", mock_server.uri())).unwrap();
    let decision = session.policy().decide(&url).await;
    assert!(decision.allowed);
    assert_eq!(decision.basis, PolicyBasis::Rules);
}

#[tokio::test]
async fn test_service_unavailable_then_success() {
    let mock_server = MockServer::start().await;
    let good_page = "<html><title>Example Store</title><body>Widget</body></html>";

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(&mock_server)
        .await;

    // First request is throttled, the next one succeeds
    Mock::given(method("GET"))
        .and(path("/dp/B0001"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/dp/B0001"))
        .respond_with(ResponseTemplate::new(200).set_body_string(good_page))
        .mount(&mock_server)
        .await;

    let config = parse_config(
        r#"
        [fetch]
        max-attempts = 3
        delay-min-secs = 0.0
        delay-max-secs = 0.01
        expected-marker = "example store"

        [debug]
        enabled = false
        "#,
    )
    .unwrap();

    let transport = transport();
    let session = session_for(&transport);
    let fetcher = Fetcher::from_config(transport, &config);

    let url = format!("{}/dp/B0001", mock_server.uri());
    let request = FetchRequest::from_config(&url, &config.fetch).unwrap();
    let report = fetcher.fetch_with_report(&session, &request).await;

    assert!(report.outcome.is_success());
    assert_eq!(report.attempt_count(), 2);
    assert_eq!(report.attempts[0].status, Some(503));
    assert_eq!(report.attempts[0].verdict, "rate_limited");
    assert_eq!(report.attempts[1].status, Some(200));
}

#[tokio::test]
async fn test_discover_from_listing_pages() {
    let mock_server = MockServer::start().await;

    let table = r#"
        <html><body><table>
          <tr><th>IP Address</th><th>Port</th><th>Https</th></tr>
          <tr><td>203.0.113.10</td><td>8080</td><td>yes</td></tr>
          <tr><td>203.0.113.11</td><td>3128</td><td>no</td></tr>
        </table></body></html>"#;

    Mock::given(method("GET"))
        .and(path("/table"))
        .respond_with(ResponseTemplate::new(200).set_body_string(table))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/plain"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("203.0.113.11:3128\n198.51.100.4:80\n"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let sources = vec![
        format!("{}/table", mock_server.uri()),
        format!("{}/broken", mock_server.uri()),
        format!("{}/plain", mock_server.uri()),
    ];

    let transport = ReqwestTransport::new().unwrap();
    let found = discover(&transport, &sources, Duration::from_secs(5)).await;

    let addresses: Vec<&str> = found.iter().map(|p| p.address()).collect();
    assert_eq!(
        addresses,
        vec![
            "http://198.51.100.4:80",
            "http://203.0.113.10:8080",
            "http://203.0.113.11:3128",
        ]
    );
    assert!(found.iter().all(|p| !p.is_validated()));
}
