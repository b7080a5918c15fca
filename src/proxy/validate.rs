//! Concurrent proxy liveness validation
//!
//! Each candidate is probed independently through itself against an echo
//! endpoint. Probes run on a `JoinSet` bounded by a semaphore, so the number
//! in flight never exceeds the configured worker cap.

use crate::fetcher::{HttpTransport, TransportRequest};
use crate::identity::{browser_headers, Identity};
use crate::proxy::ProxyCandidate;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// How candidates are probed
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Known-good endpoint that answers 2xx when reached
    pub echo_url: Url,

    /// Timeout for a single probe
    pub timeout: Duration,

    /// Maximum number of probes in flight
    pub max_workers: usize,
}

/// Probes every candidate and returns those that answered, marked validated
///
/// Candidates that do not answer are evicted from the transport.
pub async fn validate<I>(
    transport: Arc<dyn HttpTransport>,
    candidates: I,
    settings: &ProbeSettings,
) -> BTreeSet<ProxyCandidate>
where
    I: IntoIterator<Item = ProxyCandidate>,
{
    let semaphore = Arc::new(Semaphore::new(settings.max_workers.max(1)));
    let mut probes = JoinSet::new();

    for candidate in candidates {
        let transport = Arc::clone(&transport);
        let semaphore = Arc::clone(&semaphore);
        let echo_url = settings.echo_url.clone();
        let timeout = settings.timeout;

        probes.spawn(async move {
            // Permit is held for the whole probe
            let _permit = semaphore.acquire_owned().await;
            let alive = probe(transport.as_ref(), &candidate, &echo_url, timeout).await;
            (candidate, alive)
        });
    }

    let mut validated = BTreeSet::new();
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok((candidate, true)) => {
                validated.insert(candidate.into_validated());
            }
            Ok((candidate, false)) => {
                tracing::trace!("Proxy {} failed liveness probe", candidate);
                transport.evict(&candidate);
            }
            Err(e) => {
                tracing::warn!("Proxy probe task failed: {}", e);
            }
        }
    }

    tracing::info!("Validated {} working proxies", validated.len());
    validated
}

/// Sends one request through `candidate` to the echo endpoint
async fn probe(
    transport: &dyn HttpTransport,
    candidate: &ProxyCandidate,
    echo_url: &Url,
    timeout: Duration,
) -> bool {
    let request = TransportRequest {
        url: echo_url,
        headers: browser_headers(&Identity::default_browser(), None),
        proxy: Some(candidate),
        timeout,
    };

    match transport.get(request).await {
        Ok(response) => response.is_success(),
        Err(e) => {
            tracing::trace!("Probe through {} failed: {}", candidate, e);
            false
        }
    }
}
