use crate::config::RobotsConfig;
use crate::fetcher::{HttpTransport, TransportRequest};
use crate::identity::{browser_headers, Identity};
use crate::robots::{origin_key, robots_url, CachedRobots, ParsedRobots, PolicyBasis};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};
use url::Url;

/// Outcome of a robots.txt check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub basis: PolicyBasis,
}

type PolicySlot = Arc<OnceCell<Arc<CachedRobots>>>;

/// Approves or denies URLs according to each site's robots.txt
///
/// The first check against an origin fetches and parses its robots.txt; the
/// result is kept for the gate's lifetime (one session). Concurrent first
/// checks against the same origin share a single fetch.
///
/// When robots.txt cannot be fetched the gate fails open: the URL is allowed
/// and a warning is logged.
pub struct PolicyGate {
    transport: Option<Arc<dyn HttpTransport>>,
    agent_token: String,
    timeout: Duration,
    max_crawl_delay: Duration,
    cache: RwLock<HashMap<String, PolicySlot>>,
}

/// Default ceiling for a site's `Crawl-delay`
pub const DEFAULT_MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

impl PolicyGate {
    /// A gate that fetches robots.txt through `transport`
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        agent_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport: Some(transport),
            agent_token: agent_token.into(),
            timeout,
            max_crawl_delay: DEFAULT_MAX_CRAWL_DELAY,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// A gate that allows everything without touching the network
    pub fn disabled() -> Self {
        Self {
            transport: None,
            agent_token: String::new(),
            timeout: Duration::ZERO,
            max_crawl_delay: DEFAULT_MAX_CRAWL_DELAY,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Builds the gate described by the configuration
    pub fn from_config(
        transport: Arc<dyn HttpTransport>,
        config: &RobotsConfig,
        timeout: Duration,
    ) -> Self {
        if !config.respect {
            return Self::disabled();
        }

        let gate = Self::new(transport, config.agent_token.clone(), timeout);
        match Duration::try_from_secs_f64(config.max_crawl_delay_secs) {
            Ok(cap) => gate.with_max_crawl_delay(cap),
            Err(_) => gate,
        }
    }

    /// Caps the `Crawl-delay` any site can impose
    pub fn with_max_crawl_delay(mut self, cap: Duration) -> Self {
        self.max_crawl_delay = cap;
        self
    }

    /// Installs known rules for the origin of `url`, skipping the fetch
    pub fn with_rules(mut self, url: &Url, robots: ParsedRobots) -> Self {
        let entry = Arc::new(CachedRobots::new(robots, PolicyBasis::Rules));
        self.cache
            .get_mut()
            .insert(origin_key(url), Arc::new(OnceCell::new_with(Some(entry))));
        self
    }

    /// Whether compliance checks are active
    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Checks `url`, returning only the verdict
    pub async fn is_allowed(&self, url: &Url) -> bool {
        self.decide(url).await.allowed
    }

    /// Checks `url` and reports how the verdict was reached
    pub async fn decide(&self, url: &Url) -> PolicyDecision {
        let Some(cached) = self.policy_for(url).await else {
            return PolicyDecision {
                allowed: true,
                basis: PolicyBasis::Disabled,
            };
        };

        let allowed = cached.is_allowed(url.as_str(), &self.agent_token);
        if !allowed {
            tracing::warn!("robots.txt disallows: {}", url);
        }

        PolicyDecision {
            allowed,
            basis: cached.basis,
        }
    }

    /// `Crawl-delay` the site asks of our agent token, if any
    ///
    /// Values above the gate's ceiling are clamped to it.
    pub async fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        let cached = self.policy_for(url).await?;
        let secs = cached.content.crawl_delay(&self.agent_token)?;

        match Duration::try_from_secs_f64(secs) {
            Ok(delay) if delay <= self.max_crawl_delay => Some(delay),
            _ => {
                tracing::warn!(
                    "Crawl-delay of {}s at {} exceeds {:?}, clamping",
                    secs,
                    url.origin().ascii_serialization(),
                    self.max_crawl_delay
                );
                Some(self.max_crawl_delay)
            }
        }
    }

    /// Number of origins whose robots.txt is cached
    pub async fn cached_origins(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn policy_for(&self, url: &Url) -> Option<Arc<CachedRobots>> {
        let transport = self.transport.as_ref()?;
        let key = origin_key(url);

        let existing = self.cache.read().await.get(&key).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut cache = self.cache.write().await;
                Arc::clone(cache.entry(key).or_default())
            }
        };

        let cached = slot
            .get_or_init(|| self.load(transport.as_ref(), url))
            .await;
        tracing::trace!(
            "Using robots.txt for {} fetched {}s ago",
            url.origin().ascii_serialization(),
            cached.age().num_seconds()
        );
        Some(Arc::clone(cached))
    }

    async fn load(&self, transport: &dyn HttpTransport, url: &Url) -> Arc<CachedRobots> {
        let target = match robots_url(url) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("Failed to parse robots.txt location for {}: {}", url, e);
                return Arc::new(CachedRobots::fail_open());
            }
        };

        tracing::debug!("Fetching robots.txt from {}", target);
        let request = TransportRequest {
            url: &target,
            headers: browser_headers(&Identity::default_browser(), None),
            proxy: None,
            timeout: self.timeout,
        };

        let entry = match transport.get(request).await {
            Ok(response) if response.is_success() => {
                tracing::info!("Successfully parsed robots.txt from {}", target);
                CachedRobots::new(ParsedRobots::from_content(&response.body), PolicyBasis::Rules)
            }
            Ok(response) if response.status == 401 || response.status == 403 => {
                tracing::info!(
                    "robots.txt at {} is access-controlled (HTTP {}), disallowing all",
                    target,
                    response.status
                );
                CachedRobots::new(ParsedRobots::disallow_all(), PolicyBasis::Rules)
            }
            Ok(response) if (400..500).contains(&response.status) => {
                tracing::debug!("No robots.txt at {} (HTTP {})", target, response.status);
                CachedRobots::new(ParsedRobots::allow_all(), PolicyBasis::Rules)
            }
            Ok(response) => {
                tracing::warn!(
                    "Failed to parse robots.txt from {}: HTTP {}; allowing all requests",
                    target,
                    response.status
                );
                CachedRobots::fail_open()
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse robots.txt from {}: {}; allowing all requests",
                    target,
                    e
                );
                CachedRobots::fail_open()
            }
        };

        Arc::new(entry)
    }
}

impl std::fmt::Debug for PolicyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyGate")
            .field("enabled", &self.is_enabled())
            .field("agent_token", &self.agent_token)
            .field("timeout", &self.timeout)
            .field("max_crawl_delay", &self.max_crawl_delay)
            .finish()
    }
}
