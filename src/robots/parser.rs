//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate; `Crawl-delay`
//! is read here since the matcher does not expose it.

use robotstxt::DefaultMatcher;

#[derive(Debug, Clone)]
enum Rules {
    AllowAll,
    DisallowAll,
    Body(String),
}

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    rules: Rules,
}

impl ParsedRobots {
    /// Creates a ParsedRobots from raw robots.txt content
    ///
    /// An empty file allows everything.
    pub fn from_content(content: &str) -> Self {
        if content.trim().is_empty() {
            return Self::allow_all();
        }
        Self {
            rules: Rules::Body(content.to_string()),
        }
    }

    /// A ruleset that allows everything
    ///
    /// Used when a site has no robots.txt (4xx) or when the policy check
    /// fails open.
    pub fn allow_all() -> Self {
        Self {
            rules: Rules::AllowAll,
        }
    }

    /// A ruleset that forbids everything
    ///
    /// Used when robots.txt itself is access-controlled (401/403).
    pub fn disallow_all() -> Self {
        Self {
            rules: Rules::DisallowAll,
        }
    }

    /// Raw robots.txt content, empty for the synthetic rulesets
    pub fn content(&self) -> &str {
        match &self.rules {
            Rules::Body(body) => body,
            Rules::AllowAll | Rules::DisallowAll => "",
        }
    }

    /// Checks if a URL is allowed for the given agent token
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path (e.g., "/page.html")
    /// * `agent_token` - Product token matched against `User-agent` lines
    pub fn is_allowed(&self, url: &str, agent_token: &str) -> bool {
        match &self.rules {
            Rules::AllowAll => true,
            Rules::DisallowAll => false,
            Rules::Body(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, agent_token, url)
            }
        }
    }

    /// Gets the crawl delay for a specific agent token, in seconds
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, agent_token: &str) -> Option<f64> {
        let Rules::Body(body) = &self.rules else {
            return None;
        };

        let agent = agent_token.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut collecting_agents = false;
        let mut wildcard_delay = None;
        let mut agent_delay = None;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            if key == "user-agent" {
                // A user-agent line after rules starts a new group
                if !collecting_agents {
                    group.clear();
                    collecting_agents = true;
                }
                group.push(value.to_lowercase());
                continue;
            }
            collecting_agents = false;

            if key != "crawl-delay" {
                continue;
            }
            let Ok(delay) = value.parse::<f64>() else {
                continue;
            };
            if !delay.is_finite() || delay < 0.0 {
                continue;
            }

            if group
                .iter()
                .any(|ua| !ua.is_empty() && ua != "*" && agent.contains(ua.as_str()))
            {
                agent_delay = Some(delay);
            } else if group.iter().any(|ua| ua == "*") {
                wildcard_delay = Some(delay);
            }
        }

        agent_delay.or(wildcard_delay)
    }
}
