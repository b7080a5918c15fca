//! Browser identity rotation
//!
//! Every attempt goes out with a freshly drawn user agent. A dynamic source
//! (a profile file of user agents) is used when it loaded; otherwise the
//! rotator draws from a fixed fallback list, so it can always answer.

mod headers;

pub use headers::browser_headers;

use crate::config::IdentityConfig;
use crate::IdentityError;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Built-in user agents used when nothing else is available
const FALLBACK_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
];

/// The browser a request claims to come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_agent: String,
}

impl Identity {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// A fixed desktop identity for housekeeping requests (robots.txt, proxy probes)
    pub fn default_browser() -> Self {
        Self::new(FALLBACK_USER_AGENTS[0])
    }
}

/// Anything that can hand out browser identities
pub trait IdentitySource: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &str;

    /// Draws an identity, or `None` when the source has nothing to offer
    fn next_identity(&self) -> Option<Identity>;
}

/// A fixed, non-empty list of user agents
#[derive(Debug, Clone)]
pub struct StaticIdentities {
    agents: Vec<String>,
}

impl StaticIdentities {
    /// The built-in list
    pub fn builtin() -> Self {
        Self {
            agents: FALLBACK_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// A custom list; an empty list falls back to the built-in one
    pub fn from_list(agents: Vec<String>) -> Self {
        if agents.is_empty() {
            Self::builtin()
        } else {
            Self { agents }
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl IdentitySource for StaticIdentities {
    fn name(&self) -> &str {
        "static"
    }

    fn next_identity(&self) -> Option<Identity> {
        self.agents
            .choose(&mut rand::thread_rng())
            .map(|ua| Identity::new(ua.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    agents: Vec<String>,
}

/// User agents loaded from a TOML profile file (`agents = [...]`)
#[derive(Debug, Clone)]
pub struct ProfileIdentities {
    path: PathBuf,
    agents: Vec<String>,
}

impl ProfileIdentities {
    /// Reads and parses a profile file
    pub fn load(path: &Path) -> Result<Self, IdentityError> {
        let content = std::fs::read_to_string(path).map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let file: ProfileFile = toml::from_str(&content).map_err(|source| IdentityError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let agents: Vec<String> = file
            .agents
            .into_iter()
            .map(|ua| ua.trim().to_string())
            .filter(|ua| !ua.is_empty())
            .collect();

        if agents.is_empty() {
            return Err(IdentityError::Empty {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            agents,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentitySource for ProfileIdentities {
    fn name(&self) -> &str {
        "profile"
    }

    fn next_identity(&self) -> Option<Identity> {
        self.agents
            .choose(&mut rand::thread_rng())
            .map(|ua| Identity::new(ua.as_str()))
    }
}

/// Hands out one identity per request
pub struct IdentityRotator {
    dynamic: Option<Box<dyn IdentitySource>>,
    fallback: StaticIdentities,
}

impl IdentityRotator {
    /// A rotator that only uses the given fallback list
    pub fn new(fallback: StaticIdentities) -> Self {
        Self {
            dynamic: None,
            fallback,
        }
    }

    /// Adds a dynamic source that is preferred over the fallback list
    pub fn with_source(mut self, source: Box<dyn IdentitySource>) -> Self {
        self.dynamic = Some(source);
        self
    }

    /// Builds the rotator described by the configuration
    ///
    /// A profile that fails to load is logged and left out.
    pub fn from_config(config: &IdentityConfig) -> Self {
        let rotator = Self::new(StaticIdentities::from_list(config.user_agents.clone()));

        match &config.profile_path {
            Some(path) => match ProfileIdentities::load(Path::new(path)) {
                Ok(profile) => {
                    tracing::debug!(
                        "Loaded {} user agents from {}",
                        profile.agents.len(),
                        profile.path().display()
                    );
                    rotator.with_source(Box::new(profile))
                }
                Err(e) => {
                    tracing::warn!("Identity profile unavailable, using fallback list: {}", e);
                    rotator
                }
            },
            None => rotator,
        }
    }

    /// Name of the dynamic source, if one is attached
    pub fn dynamic_source(&self) -> Option<&str> {
        self.dynamic.as_ref().map(|s| s.name())
    }

    /// Draws the identity for the next request; never fails
    pub fn next(&self) -> Identity {
        self.dynamic
            .as_ref()
            .and_then(|source| source.next_identity())
            .or_else(|| self.fallback.next_identity())
            .unwrap_or_else(Identity::default_browser)
    }
}

impl Default for IdentityRotator {
    fn default() -> Self {
        Self::new(StaticIdentities::builtin())
    }
}

impl std::fmt::Debug for IdentityRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRotator")
            .field("dynamic", &self.dynamic_source())
            .field("fallback", &self.fallback.len())
            .finish()
    }
}
