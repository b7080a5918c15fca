use crate::config::ProxyConfig;
use crate::fetcher::HttpTransport;
use crate::proxy::{discover, validate, ProbeSettings, ProxyCandidate};
use crate::ScrapeError;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Read-only set of proxies served for one session
///
/// The pool never changes after it is built; per-session failures are
/// tracked by the caller and passed to [`ProxyPool::acquire`] as exclusions.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    proxies: Vec<ProxyCandidate>,
}

impl ProxyPool {
    /// Creates an empty pool; every fetch goes out directly
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a pool from already known proxies, dropping duplicates
    pub fn new<I>(proxies: I) -> Self
    where
        I: IntoIterator<Item = ProxyCandidate>,
    {
        let unique: BTreeSet<ProxyCandidate> = proxies.into_iter().collect();
        Self {
            proxies: unique.into_iter().collect(),
        }
    }

    /// Discovers, validates and caps proxies as configured
    ///
    /// Returns an empty pool when proxies are disabled. Discovery and probe
    /// failures are logged by the stages themselves and never abort the build.
    pub async fn build(
        transport: Arc<dyn HttpTransport>,
        config: &ProxyConfig,
    ) -> Result<Self, ScrapeError> {
        if !config.enabled {
            tracing::debug!("Proxy pool disabled, fetching directly");
            return Ok(Self::empty());
        }

        tracing::info!("Fetching free proxies...");
        let probe_timeout = Duration::from_secs(config.probe_timeout_secs);
        let settings = ProbeSettings {
            echo_url: Url::parse(&config.echo_url)?,
            timeout: probe_timeout,
            max_workers: config.max_workers,
        };

        let listing_timeout = probe_timeout.saturating_mul(2);
        let candidates = discover(transport.as_ref(), &config.sources, listing_timeout).await;
        let working = validate(Arc::clone(&transport), candidates, &settings).await;

        let mut working = working.into_iter();
        let pool = Self::new(working.by_ref().take(config.max_proxies));
        for surplus in working {
            transport.evict(&surplus);
        }
        tracing::info!("Proxy pool ready with {} proxies", pool.len());
        Ok(pool)
    }

    /// Picks a uniformly random proxy whose address is not in `exclude`
    ///
    /// Returns `None` when the pool is empty or fully excluded, which means
    /// the caller should go out without a proxy.
    pub fn acquire(&self, exclude: &HashSet<String>) -> Option<ProxyCandidate> {
        let available: Vec<&ProxyCandidate> = self
            .proxies
            .iter()
            .filter(|proxy| !exclude.contains(proxy.address()))
            .collect();

        available.choose(&mut rand::thread_rng()).map(|p| (*p).clone())
    }

    /// Number of proxies in the pool
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Whether the pool holds no proxies
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Iterates over the pooled proxies in address order
    pub fn iter(&self) -> impl Iterator<Item = &ProxyCandidate> {
        self.proxies.iter()
    }
}
