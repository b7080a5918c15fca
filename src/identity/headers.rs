use crate::identity::Identity;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION, DNT,
    PRAGMA, REFERER, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use rand::seq::SliceRandom;
use rand::Rng;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

const CLIENT_HINTS: &str = "Sec-CH-UA, Sec-CH-UA-Mobile, Sec-CH-UA-Platform";

const VIEWPORT_WIDTHS: [&str; 4] = ["1920", "1366", "1536", "1440"];

/// Builds the header set a real browser would send for a page load
///
/// `Viewport-Width` is always sent with a common desktop width. The optional
/// `Sec-GPC`, `Pragma`, `Sec-Purpose` and `Accept-CH` headers are attached to
/// roughly seven requests in ten so the fingerprint is not constant.
pub fn browser_headers(identity: &Identity, referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let user_agent = HeaderValue::from_str(identity.user_agent()).unwrap_or_else(|_| {
        HeaderValue::from_str(Identity::default_browser().user_agent())
            .unwrap_or(HeaderValue::from_static("Mozilla/5.0"))
    });
    headers.insert(USER_AGENT, user_agent);
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));

    if let Some(referer) = referer.and_then(|r| HeaderValue::from_str(r).ok()) {
        headers.insert(REFERER, referer);
    }

    let mut rng = rand::thread_rng();
    let width = VIEWPORT_WIDTHS.choose(&mut rng).copied().unwrap_or("1920");
    headers.insert(
        HeaderName::from_static("viewport-width"),
        HeaderValue::from_static(width),
    );

    if rng.gen_bool(0.7) {
        headers.insert(HeaderName::from_static("sec-gpc"), HeaderValue::from_static("1"));
        headers.insert(
            HeaderName::from_static("sec-purpose"),
            HeaderValue::from_static("navigate"),
        );
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(
            HeaderName::from_static("accept-ch"),
            HeaderValue::from_static(CLIENT_HINTS),
        );
    }

    headers
}
