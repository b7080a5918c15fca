//! Proxy discovery from public listing pages
//!
//! Listing sites publish proxies either as HTML tables (IP in the first cell,
//! port in the second) or as plain `ip:port` lines. Both shapes are accepted.

use crate::fetcher::{HttpTransport, TransportRequest};
use crate::identity::{browser_headers, Identity};
use crate::proxy::ProxyCandidate;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use url::Url;

/// Fetches every listing source and returns the deduplicated candidates
///
/// A source that cannot be fetched, answers with a non-2xx status, or yields
/// nothing is logged and skipped; discovery carries on with the rest.
pub async fn discover(
    transport: &dyn HttpTransport,
    sources: &[String],
    timeout: Duration,
) -> BTreeSet<ProxyCandidate> {
    let identity = Identity::default_browser();
    let mut candidates = BTreeSet::new();

    for source in sources {
        let url = match Url::parse(source) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Skipping proxy source {}: {}", source, e);
                continue;
            }
        };

        let request = TransportRequest {
            url: &url,
            headers: browser_headers(&identity, None),
            proxy: None,
            timeout,
        };

        match transport.get(request).await {
            Ok(response) if response.is_success() => {
                let found = parse_listing(&response.body);
                tracing::debug!("Proxy source {} listed {} candidates", source, found.len());
                candidates.extend(found);
            }
            Ok(response) => {
                tracing::warn!(
                    "Error fetching proxies from {}: HTTP {}",
                    source,
                    response.status
                );
            }
            Err(e) => {
                tracing::warn!("Error fetching proxies from {}: {}", source, e);
            }
        }
    }

    tracing::info!("Found {} potential proxies", candidates.len());
    candidates
}

/// Extracts `http://ip:port` candidates from a listing page body
pub fn parse_listing(body: &str) -> BTreeSet<ProxyCandidate> {
    let mut found = from_tables(body);

    for token in body.split(|c: char| c.is_whitespace() || c == '<' || c == '>') {
        if let Some((ip, port)) = token.split_once(':') {
            if let Some(candidate) = candidate_from_parts(ip, port) {
                found.insert(candidate);
            }
        }
    }

    found
}

/// Reads table rows whose first two cells are an IPv4 address and a port
fn from_tables(body: &str) -> BTreeSet<ProxyCandidate> {
    let mut found = BTreeSet::new();

    let (Ok(row_selector), Ok(cell_selector)) = (Selector::parse("tr"), Selector::parse("td"))
    else {
        return found;
    };

    let document = Html::parse_document(body);
    for row in document.select(&row_selector) {
        let cells: Vec<String> = row
            .select(&cell_selector)
            .take(2)
            .map(|cell| cell.text().collect::<String>())
            .collect();

        if let [ip, port] = cells.as_slice() {
            if let Some(candidate) = candidate_from_parts(ip, port) {
                found.insert(candidate);
            }
        }
    }

    found
}

fn candidate_from_parts(ip: &str, port: &str) -> Option<ProxyCandidate> {
    let ip: Ipv4Addr = ip.trim().parse().ok()?;
    let port: u16 = port.trim().parse().ok()?;
    if port == 0 {
        return None;
    }
    Some(ProxyCandidate::from_host_port(&ip.to_string(), port))
}
