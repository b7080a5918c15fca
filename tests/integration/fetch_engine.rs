//! Fetch engine behavior against a scripted in-memory transport

use crate::common::{connection_refused, page, tiny_delays, LogBuffer, ScriptedTransport};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tenacious_fetch::config::{ProxyConfig, ProxyStrategy};
use tenacious_fetch::fetcher::{ClassifyRules, DelayRange, HttpTransport, Pacing, RawResponse};
use tenacious_fetch::identity::{IdentityRotator, StaticIdentities};
use tenacious_fetch::proxy::{validate, ProbeSettings, ProxyCandidate, ProxyPool};
use tenacious_fetch::robots::{ParsedRobots, PolicyBasis, PolicyGate};
use tenacious_fetch::{FetchOutcome, FetchRequest, FetchState, Fetcher, Session, TransportError};
use url::Url;

const ITEM_URL: &str = "https://shop.example.com/item";

fn proxy_pool(count: u16) -> ProxyPool {
    ProxyPool::new((0..count).map(|i| ProxyCandidate::from_host_port("10.0.0.1", 8000 + i)))
}

fn request(budget: u32) -> FetchRequest {
    FetchRequest::new(ITEM_URL, budget, tiny_delays()).unwrap()
}

#[tokio::test]
async fn test_network_errors_use_whole_budget() {
    for budget in 1..=5 {
        let transport = ScriptedTransport::always(connection_refused());
        let fetcher = Fetcher::new(transport.clone());
        let session = Session::direct();

        let report = fetcher.fetch_with_report(&session, &request(budget)).await;

        assert_eq!(transport.call_count(), budget as usize, "budget {}", budget);
        assert_eq!(report.attempt_count(), budget as usize);
        assert_eq!(report.final_state, FetchState::Exhausted);
        match report.outcome {
            FetchOutcome::ExhaustedRetries { last_cause } => {
                assert!(last_cause.contains("connection refused"))
            }
            other => panic!("Expected ExhaustedRetries, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_each_attempt_waits_at_least_minimum_delay() {
    let transport = ScriptedTransport::always(connection_refused());
    let fetcher = Fetcher::new(transport.clone());
    let range = DelayRange::from_durations(Duration::from_millis(5), Duration::from_millis(10))
        .unwrap();
    let request = FetchRequest::new(ITEM_URL, 3, range).unwrap();

    let started = std::time::Instant::now();
    let report = fetcher.fetch_with_report(&Session::direct(), &request).await;

    assert!(matches!(report.outcome, FetchOutcome::ExhaustedRetries { .. }));
    assert_eq!(report.attempts.len(), 3);
    for attempt in &report.attempts {
        assert!(attempt.delay >= range.min() * attempt.number);
    }
    assert!(started.elapsed() >= report.total_delay());
}

#[tokio::test]
async fn test_crawl_delay_raises_minimum_wait() {
    let transport = ScriptedTransport::always(connection_refused());
    let site = Url::parse("https://shop.example.com/").unwrap();
    let gate = PolicyGate::new(transport.clone(), "tenacious-fetch", Duration::from_secs(1))
        .with_rules(&site, ParsedRobots::from_content("User-agent: *\nCrawl-delay: 0.05"));
    let session = Session::new(ProxyPool::empty(), gate);
    let fetcher = Fetcher::new(transport.clone());

    let report = fetcher.fetch_with_report(&session, &request(2)).await;

    for attempt in &report.attempts {
        assert!(attempt.delay >= Duration::from_millis(50));
    }
}

#[tokio::test]
async fn test_denied_url_sends_no_request() {
    let transport = ScriptedTransport::always(page(200, "<html>item</html>"));
    let site = Url::parse("https://shop.example.com/").unwrap();
    let gate = PolicyGate::new(transport.clone(), "tenacious-fetch", Duration::from_secs(1))
        .with_rules(&site, ParsedRobots::from_content("User-agent: *\nDisallow: /item"));
    let session = Session::new(proxy_pool(3), gate);
    let fetcher = Fetcher::new(transport.clone());

    let report = fetcher.fetch_with_report(&session, &request(3)).await;

    assert_eq!(transport.call_count(), 0);
    assert_eq!(report.final_state, FetchState::Denied);
    assert!(matches!(report.outcome, FetchOutcome::Blocked { .. }));
    assert!(session.excluded_proxies().is_empty());
}

#[tokio::test]
async fn test_proxy_exclusion_is_monotonic() {
    let transport = ScriptedTransport::always(connection_refused());
    let session = Session::new(proxy_pool(2), PolicyGate::disabled());
    let fetcher = Fetcher::new(transport.clone());

    let report = fetcher.fetch_with_report(&session, &request(4)).await;

    let mut excluded = HashSet::new();
    for call in transport.calls() {
        if let Some(proxy) = call.proxy {
            assert!(!excluded.contains(&proxy), "{} reused after exclusion", proxy);
            excluded.insert(proxy);
        }
    }
    assert_eq!(excluded.len(), 2);

    // Pool exhausted: the remaining attempts go out directly
    let proxies: Vec<Option<String>> = transport.calls().into_iter().map(|c| c.proxy).collect();
    assert!(proxies[0].is_some() && proxies[1].is_some());
    assert!(proxies[2..].iter().all(Option::is_none));
    assert_eq!(proxies.len(), 4);
    assert_eq!(report.excluded_proxies.len(), 2);
    assert_eq!(session.available_proxies(), 0);
}

#[tokio::test]
async fn test_rate_limit_then_success_excludes_first_proxy() {
    let good_page = "<html><title>Example Store</title><body>Widget, 4.5 stars</body></html>";
    let transport = ScriptedTransport::replaying(vec![page(503, ""), page(200, good_page)]);
    let session = Session::new(proxy_pool(3), PolicyGate::disabled());
    let fetcher = Fetcher::new(transport.clone()).with_rules(ClassifyRules {
        min_body_bytes: 40,
        expected_marker: Some("example store".to_string()),
        captcha_markers: vec!["captcha".to_string()],
    });

    let report = fetcher.fetch_with_report(&session, &request(3)).await;

    assert_eq!(
        report.outcome,
        FetchOutcome::Success {
            body: good_page.to_string(),
            status_code: 200
        }
    );
    assert_eq!(report.attempts.len(), 2);

    let first = report.attempts[0].proxy.clone().unwrap();
    let second = report.attempts[1].proxy.clone().unwrap();
    assert_ne!(first, second);
    assert_eq!(report.excluded_proxies, vec![first.clone()]);
    assert_eq!(session.excluded_proxies(), vec![first]);
}

#[tokio::test]
async fn test_captcha_on_every_attempt_is_blocked() {
    let transport =
        ScriptedTransport::always(page(200, "<html>Type the characters (captcha)</html>"));
    let session = Session::new(proxy_pool(5), PolicyGate::disabled());
    let fetcher = Fetcher::new(transport.clone());

    let report = fetcher.fetch_with_report(&session, &request(3)).await;

    assert!(matches!(report.outcome, FetchOutcome::Blocked { .. }));
    assert_eq!(report.final_state, FetchState::Exhausted);

    let used: Vec<String> = transport.calls().into_iter().filter_map(|c| c.proxy).collect();
    assert_eq!(used.len(), 3);
    for proxy in &used {
        assert!(session.is_excluded(&ProxyCandidate::new(proxy.as_str())));
    }
    assert_eq!(report.excluded_proxies, used);
}

#[tokio::test]
async fn test_identity_rotation_feeds_user_agent() {
    let transport = ScriptedTransport::always(connection_refused());
    let identities =
        IdentityRotator::new(StaticIdentities::from_list(vec!["TestAgent/1.0".to_string()]));
    let fetcher = Fetcher::new(transport.clone()).with_identities(identities);

    let report = fetcher.fetch_with_report(&Session::direct(), &request(2)).await;

    for call in transport.calls() {
        assert_eq!(call.user_agent.as_deref(), Some("TestAgent/1.0"));
    }
    assert!(report.attempts.iter().all(|a| a.user_agent == "TestAgent/1.0"));
}

#[tokio::test]
async fn test_concurrent_fetches_share_session() {
    let transport = ScriptedTransport::always(page(403, "forbidden"));
    let session = Arc::new(Session::new(proxy_pool(4), PolicyGate::disabled()));
    let fetcher = Arc::new(Fetcher::new(transport.clone()));

    let mut handles = Vec::new();
    for _ in 0..2 {
        let session = Arc::clone(&session);
        let fetcher = Arc::clone(&fetcher);
        handles.push(tokio::spawn(async move {
            fetcher.fetch(&session, &request(2)).await
        }));
    }
    for handle in handles {
        assert!(matches!(handle.await.unwrap(), FetchOutcome::Blocked { .. }));
    }

    // Every proxy either fetch used is excluded for both
    assert_eq!(transport.call_count(), 4);
    let used: HashSet<String> = transport.calls().into_iter().filter_map(|c| c.proxy).collect();
    let excluded: HashSet<String> = session.excluded_proxies().into_iter().collect();
    assert_eq!(used, excluded);
}

#[tokio::test]
async fn test_robots_failure_fails_open_with_warning() {
    let transport = ScriptedTransport::with_handler(|_, request| {
        if request.url.path() == "/robots.txt" {
            Err(TransportError::Timeout {
                url: request.url.to_string(),
            })
        } else {
            Ok(RawResponse::new(200, request.url.as_str(), "<html>item</html>"))
        }
    });
    let gate = PolicyGate::new(transport.clone(), "tenacious-fetch", Duration::from_secs(1));

    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let url = Url::parse(ITEM_URL).unwrap();
    let decision = gate.decide(&url).await;

    assert!(decision.allowed);
    assert_eq!(decision.basis, PolicyBasis::FailOpen);
    assert!(logs.contents().contains("allowing all requests"));

    // The failure is cached for the session, robots.txt is not refetched
    assert!(gate.is_allowed(&url).await);
    let robots_calls = transport
        .calls()
        .iter()
        .filter(|c| c.url.ends_with("/robots.txt"))
        .count();
    assert_eq!(robots_calls, 1);
}

#[tokio::test]
async fn test_validation_is_idempotent() {
    // Proxies on even ports answer, odd ports time out
    let transport = ScriptedTransport::with_handler(|_, request| {
        let alive = request
            .proxy
            .map(|p| p.address().ends_with(|c: char| matches!(c, '0' | '2' | '4' | '6' | '8')))
            .unwrap_or(false);
        if alive {
            Ok(RawResponse::new(200, request.url.as_str(), r#"{"origin": "10.0.0.1"}"#))
        } else {
            Err(TransportError::Timeout {
                url: request.url.to_string(),
            })
        }
    });
    let transport: Arc<dyn HttpTransport> = transport;
    let settings = ProbeSettings {
        echo_url: Url::parse("https://echo.example.com/ip").unwrap(),
        timeout: Duration::from_secs(1),
        max_workers: 3,
    };
    let candidates: Vec<ProxyCandidate> = (0..6)
        .map(|i| ProxyCandidate::from_host_port("10.0.0.1", 9000 + i))
        .collect();

    let first = validate(Arc::clone(&transport), candidates.clone(), &settings).await;
    let second = validate(Arc::clone(&transport), candidates, &settings).await;

    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert!(first.iter().all(|p| p.is_validated()));
}

#[tokio::test]
async fn test_direct_first_uses_pool_for_second_half() {
    let transport = ScriptedTransport::always(connection_refused());
    let session =
        Session::new(proxy_pool(3), PolicyGate::disabled()).with_strategy(ProxyStrategy::DirectFirst);
    let fetcher = Fetcher::new(transport.clone());

    fetcher.fetch_with_report(&session, &request(4)).await;

    let proxied: Vec<bool> = transport.calls().iter().map(|c| c.proxy.is_some()).collect();
    assert_eq!(proxied, vec![false, false, true, true]);
}

#[tokio::test]
async fn test_pacing_slows_later_fetches() {
    let transport = ScriptedTransport::always(page(200, "<html>item</html>"));
    let session = Session::direct();
    let slow = DelayRange::from_durations(Duration::from_millis(30), Duration::from_millis(40))
        .unwrap();
    let fetcher = Fetcher::new(transport.clone()).with_pacing(Pacing::new([(2, slow)]));

    let mut first_delays = Vec::new();
    for _ in 0..3 {
        let report = fetcher.fetch_with_report(&session, &request(1)).await;
        assert!(report.outcome.is_success());
        first_delays.push(report.attempts[0].delay);
    }

    assert_eq!(session.request_count(), 3);
    assert!(first_delays[0] < Duration::from_millis(30));
    assert!(first_delays[1] < Duration::from_millis(30));
    assert!(first_delays[2] >= Duration::from_millis(32));
}

#[tokio::test]
async fn test_burned_proxies_are_evicted_from_transport() {
    let transport = ScriptedTransport::always(page(403, "forbidden"));
    let session = Session::new(proxy_pool(3), PolicyGate::disabled());
    let fetcher = Fetcher::new(transport.clone());

    let report = fetcher.fetch_with_report(&session, &request(2)).await;

    let mut excluded = report.excluded_proxies.clone();
    excluded.sort();
    assert_eq!(excluded.len(), 2);
    assert_eq!(transport.evicted(), excluded);
}

#[tokio::test]
async fn test_pool_build_evicts_dead_and_surplus_proxies() {
    // Ports 8001-8005 listed; 8005 never answers
    let transport = ScriptedTransport::with_handler(|_, request| match request.proxy {
        None => Ok(RawResponse::new(
            200,
            request.url.as_str(),
            "10.0.0.1:8001\n10.0.0.1:8002\n10.0.0.1:8003\n10.0.0.1:8004\n10.0.0.1:8005\n",
        )),
        Some(proxy) if proxy.address().ends_with("8005") => Err(TransportError::Timeout {
            url: request.url.to_string(),
        }),
        Some(_) => Ok(RawResponse::new(200, request.url.as_str(), r#"{"origin": "10.0.0.1"}"#)),
    });
    let config = ProxyConfig {
        enabled: true,
        sources: vec!["https://lists.example.com/proxies".to_string()],
        echo_url: "https://echo.example.com/ip".to_string(),
        max_proxies: 2,
        ..ProxyConfig::default()
    };

    let pool = ProxyPool::build(transport.clone(), &config).await.unwrap();

    assert_eq!(pool.len(), 2);
    let evicted = transport.evicted();
    assert_eq!(evicted.len(), 3);
    assert!(evicted.contains(&"http://10.0.0.1:8005".to_string()));
    for proxy in pool.iter() {
        assert!(!evicted.contains(&proxy.address().to_string()));
    }
}
