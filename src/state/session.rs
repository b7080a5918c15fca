use crate::config::{validate_config, Config, ProxyStrategy};
use crate::fetcher::HttpTransport;
use crate::proxy::{ProxyCandidate, ProxyPool};
use crate::robots::PolicyGate;
use crate::ScrapeError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Shared state for one scraping session
///
/// Holds the validated proxy pool, the robots.txt gate with its per-origin
/// cache, and the set of proxies that failed during this session. Proxies
/// are only ever added to the failed set; a failed proxy is never handed out
/// again until a new session is built.
///
/// A session is shared by reference (or `Arc`) across concurrent fetches.
#[derive(Debug)]
pub struct Session {
    started_at: DateTime<Utc>,
    pool: ProxyPool,
    policy: PolicyGate,
    strategy: ProxyStrategy,
    failed_proxies: Mutex<HashSet<String>>,
    warmed_up: AtomicBool,
    requests: AtomicU64,
}

impl Session {
    pub fn new(pool: ProxyPool, policy: PolicyGate) -> Self {
        Self {
            started_at: Utc::now(),
            pool,
            policy,
            strategy: ProxyStrategy::default(),
            failed_proxies: Mutex::new(HashSet::new()),
            warmed_up: AtomicBool::new(false),
            requests: AtomicU64::new(0),
        }
    }

    pub fn with_strategy(mut self, strategy: ProxyStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// A session without proxies or robots.txt checks
    pub fn direct() -> Self {
        Self::new(ProxyPool::empty(), PolicyGate::disabled())
    }

    /// Bootstraps a session: builds the proxy pool and the policy gate
    ///
    /// # Arguments
    ///
    /// * `transport` - Transport used for proxy discovery, probing and robots.txt
    /// * `config` - Full configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Session)` - Ready session (the pool may be empty)
    /// * `Err(ScrapeError)` - The configuration is invalid
    pub async fn from_config(
        transport: Arc<dyn HttpTransport>,
        config: &Config,
    ) -> Result<Self, ScrapeError> {
        validate_config(config)?;

        let pool = ProxyPool::build(Arc::clone(&transport), &config.proxy).await?;
        let policy = PolicyGate::from_config(
            transport,
            &config.robots,
            Duration::from_secs(config.fetch.timeout_secs),
        );
        Ok(Self::new(pool, policy).with_strategy(config.proxy.strategy))
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    pub fn policy(&self) -> &PolicyGate {
        &self.policy
    }

    pub fn strategy(&self) -> ProxyStrategy {
        self.strategy
    }

    /// Proxy for attempt `attempt` (1-based) out of `budget`
    ///
    /// Under [`ProxyStrategy::DirectFirst`] the first half of the budget
    /// (rounded up) goes out directly; otherwise this is
    /// [`Session::acquire_proxy`].
    pub fn proxy_for_attempt(&self, attempt: u32, budget: u32) -> Option<ProxyCandidate> {
        match self.strategy {
            ProxyStrategy::DirectFirst if attempt <= budget.div_ceil(2) => None,
            _ => self.acquire_proxy(),
        }
    }

    /// Counts a new logical fetch and returns its 1-based number
    pub fn next_request_number(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Logical fetches started so far in this session
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Picks a random proxy that has not failed this session
    pub fn acquire_proxy(&self) -> Option<ProxyCandidate> {
        let failed = self.failed();
        self.pool.acquire(&failed)
    }

    /// Excludes `proxy` for the rest of the session
    ///
    /// Returns `true` if the proxy was not already excluded.
    pub fn mark_proxy_failed(&self, proxy: &ProxyCandidate) -> bool {
        let inserted = self.failed().insert(proxy.address().to_string());
        if inserted {
            tracing::debug!("Excluding proxy {} for the rest of the session", proxy);
        }
        inserted
    }

    pub fn is_excluded(&self, proxy: &ProxyCandidate) -> bool {
        self.failed().contains(proxy.address())
    }

    /// Addresses of every excluded proxy, sorted
    pub fn excluded_proxies(&self) -> Vec<String> {
        let mut excluded: Vec<String> = self.failed().iter().cloned().collect();
        excluded.sort();
        excluded
    }

    /// Number of pool proxies still usable
    pub fn available_proxies(&self) -> usize {
        let failed = self.failed();
        self.pool
            .iter()
            .filter(|p| !failed.contains(p.address()))
            .count()
    }

    /// Claims the one-time warm-up; `false` if it already ran
    pub(crate) fn begin_warm_up(&self) -> bool {
        !self.warmed_up.swap(true, Ordering::SeqCst)
    }

    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up.load(Ordering::SeqCst)
    }

    fn failed(&self) -> MutexGuard<'_, HashSet<String>> {
        self.failed_proxies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
