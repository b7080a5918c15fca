use serde::Deserialize;

/// Main configuration structure for tenacious-fetch
///
/// Every section is optional in the TOML file; missing sections fall back to
/// their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub proxy: ProxyConfig,
    pub identity: IdentityConfig,
    pub robots: RobotsConfig,
    pub debug: DebugConfig,
}

/// Attempt loop behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Number of HTTP attempts per logical fetch
    pub max_attempts: u32,

    /// Lower bound of the randomized pre-request delay (seconds)
    pub delay_min_secs: f64,

    /// Upper bound of the randomized pre-request delay (seconds)
    pub delay_max_secs: f64,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,

    /// 2xx bodies shorter than this are treated as incomplete
    pub min_body_bytes: usize,

    /// Marker that must appear in a 2xx body for it to count as the real page
    pub expected_marker: Option<String>,

    /// Case-insensitive substrings that flag a CAPTCHA / bot wall
    pub captcha_markers: Vec<String>,

    /// Referer sent with every request
    pub referer: String,

    /// Pages visited once per session before real work starts
    pub warmup_urls: Vec<String>,

    /// Extra wait before a fetch, growing with the session's request count
    pub pacing: Vec<PacingTier>,
}

/// One step of session pacing
///
/// Applies to every logical fetch numbered above `after-requests`; the
/// highest matching tier wins.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PacingTier {
    pub after_requests: u64,
    pub delay_min_secs: f64,
    pub delay_max_secs: f64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_min_secs: 3.0,
            delay_max_secs: 7.0,
            timeout_secs: 15,
            min_body_bytes: 0,
            expected_marker: None,
            captcha_markers: vec!["captcha".to_string()],
            referer: "https://www.google.com/".to_string(),
            warmup_urls: Vec::new(),
            pacing: Vec::new(),
        }
    }
}

/// Proxy discovery and validation
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProxyConfig {
    /// Whether to build a proxy pool at all
    pub enabled: bool,

    /// Listing pages to scrape for candidates
    pub sources: Vec<String>,

    /// Endpoint each candidate is probed against
    pub echo_url: String,

    /// Timeout for a single liveness probe (seconds)
    pub probe_timeout_secs: u64,

    /// Maximum number of probes in flight
    pub max_workers: usize,

    /// Maximum number of validated proxies kept in the pool
    pub max_proxies: usize,

    /// When attempts go through the pool
    pub strategy: ProxyStrategy,
}

/// How attempts choose between direct connections and pool proxies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyStrategy {
    /// Every attempt draws a proxy from the pool
    #[default]
    Rotate,

    /// The first half of the attempt budget (rounded up) goes out directly;
    /// later attempts use the pool
    DirectFirst,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sources: vec![
                "https://www.sslproxies.org/".to_string(),
                "https://free-proxy-list.net/".to_string(),
                "https://www.us-proxy.org/".to_string(),
            ],
            echo_url: "https://httpbin.org/ip".to_string(),
            probe_timeout_secs: 5,
            max_workers: 10,
            max_proxies: 10,
            strategy: ProxyStrategy::Rotate,
        }
    }
}

/// Browser identity sources
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IdentityConfig {
    /// Optional TOML file with an `agents = [...]` list
    pub profile_path: Option<String>,

    /// Replaces the built-in fallback list when non-empty
    pub user_agents: Vec<String>,
}

/// Robots.txt compliance
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RobotsConfig {
    /// Check robots.txt before fetching
    pub respect: bool,

    /// Product token matched against `User-agent` groups
    pub agent_token: String,

    /// Ceiling applied to a site's `Crawl-delay` (seconds)
    pub max_crawl_delay_secs: f64,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            respect: true,
            agent_token: "tenacious-fetch".to_string(),
            max_crawl_delay_secs: 60.0,
        }
    }
}

/// Raw response capture
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DebugConfig {
    /// Persist terminal response bodies
    pub enabled: bool,

    /// Directory the bodies are written to
    pub directory: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "scrape_data/debug".to_string(),
        }
    }
}
