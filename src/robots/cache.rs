//! Session-scoped robots.txt cache entries

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};

/// How a policy decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyBasis {
    /// Decided by the site's robots.txt (or its HTTP status)
    Rules,

    /// robots.txt could not be obtained, so the URL is allowed by default
    FailOpen,

    /// Compliance checks are turned off
    Disabled,
}

/// Robots.txt data held for the rest of the session
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// Whether the rules came from the site or from the fail-open default
    pub basis: PolicyBasis,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots, basis: PolicyBasis) -> Self {
        Self {
            content,
            basis,
            fetched_at: Utc::now(),
        }
    }

    /// Entry used when robots.txt could not be fetched
    pub fn fail_open() -> Self {
        Self::new(ParsedRobots::allow_all(), PolicyBasis::FailOpen)
    }

    /// Returns how long ago the robots.txt was fetched
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }

    /// Checks a URL against the cached rules
    pub fn is_allowed(&self, url: &str, agent_token: &str) -> bool {
        match self.basis {
            PolicyBasis::FailOpen | PolicyBasis::Disabled => true,
            PolicyBasis::Rules => self.content.is_allowed(url, agent_token),
        }
    }
}
