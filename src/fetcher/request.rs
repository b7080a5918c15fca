use crate::config::{validate_delay_range, FetchConfig};
use crate::state::FetchState;
use crate::{ConfigError, RequestError};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Bounds for the jittered pre-attempt delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl DelayRange {
    /// Creates a range from seconds, rejecting negative or inverted bounds
    pub fn from_secs(min: f64, max: f64) -> Result<Self, RequestError> {
        validate_delay_range(min, max).map_err(|e| match e {
            ConfigError::Validation(message) => RequestError::InvalidDelay(message),
            other => RequestError::InvalidDelay(other.to_string()),
        })?;

        Ok(Self {
            min: Duration::from_secs_f64(min),
            max: Duration::from_secs_f64(max),
        })
    }

    /// Creates a range from durations, rejecting inverted bounds
    ///
    /// Unlike [`DelayRange::from_secs`], no upper limit applies; the backoff
    /// saturates instead of overflowing.
    pub fn from_durations(min: Duration, max: Duration) -> Result<Self, RequestError> {
        if min > max {
            return Err(RequestError::InvalidDelay(format!(
                "minimum {:?} exceeds maximum {:?}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

/// A validated request to fetch one URL
///
/// # Arguments
///
/// * `url` - Absolute http(s) URL
/// * `attempt_budget` - Maximum number of HTTP attempts (at least 1)
/// * `delay_range` - Base bounds for the delay before each attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: Url,
    attempt_budget: u32,
    delay_range: DelayRange,
}

impl FetchRequest {
    pub fn new(url: &str, attempt_budget: u32, delay_range: DelayRange) -> Result<Self, RequestError> {
        let url = Url::parse(url).map_err(|e| RequestError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RequestError::UnsupportedScheme(url.scheme().to_string()));
        }

        if attempt_budget == 0 {
            return Err(RequestError::ZeroBudget);
        }

        Ok(Self {
            url,
            attempt_budget,
            delay_range,
        })
    }

    /// Builds a request using the configured budget and delay range
    pub fn from_config(url: &str, config: &FetchConfig) -> Result<Self, RequestError> {
        let range = DelayRange::from_secs(config.delay_min_secs, config.delay_max_secs)?;
        Self::new(url, config.max_attempts, range)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn attempt_budget(&self) -> u32 {
        self.attempt_budget
    }

    pub fn delay_range(&self) -> DelayRange {
        self.delay_range
    }
}

/// Terminal result of a logical fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { body: String, status_code: u16 },
    Blocked { reason: String },
    RateLimited,
    TransientError { cause: String },
    ExhaustedRetries { last_cause: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The page body, for successful fetches
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn into_body(self) -> Option<String> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Short label used in logs and debug file names
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Blocked { .. } => "blocked",
            Self::RateLimited => "rate_limited",
            Self::TransientError { .. } => "transient_error",
            Self::ExhaustedRetries { .. } => "exhausted_retries",
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { body, status_code } => {
                write!(f, "success (HTTP {}, {} bytes)", status_code, body.len())
            }
            Self::Blocked { reason } => write!(f, "blocked: {}", reason),
            Self::RateLimited => write!(f, "rate limited"),
            Self::TransientError { cause } => write!(f, "transient error: {}", cause),
            Self::ExhaustedRetries { last_cause } => {
                write!(f, "retries exhausted, last cause: {}", last_cause)
            }
        }
    }
}

/// What happened on one HTTP attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based attempt index
    pub number: u32,
    pub proxy: Option<String>,
    pub user_agent: String,
    /// Delay slept before this attempt
    pub delay: Duration,
    pub status: Option<u16>,
    pub verdict: String,
    pub detail: String,
}

/// Outcome of a logical fetch plus the per-attempt trail that led to it
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub url: Url,
    pub outcome: FetchOutcome,
    pub final_state: FetchState,
    pub attempts: Vec<AttemptRecord>,
    /// Proxies this fetch excluded from the session, in order
    pub excluded_proxies: Vec<String>,
}

impl FetchReport {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Total time spent sleeping between attempts
    pub fn total_delay(&self) -> Duration {
        self.attempts.iter().map(|a| a.delay).sum()
    }
}
