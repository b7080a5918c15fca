//! Robots.txt handling module
//!
//! This module provides the policy gate consulted before every logical fetch:
//! fetching, parsing, and session-caching robots.txt per origin.

mod cache;
mod gate;
mod parser;

pub use cache::{CachedRobots, PolicyBasis};
pub use gate::{PolicyDecision, PolicyGate, DEFAULT_MAX_CRAWL_DELAY};
pub use parser::ParsedRobots;

use url::Url;

/// Location of the robots.txt governing `url`
pub fn robots_url(url: &Url) -> Result<Url, url::ParseError> {
    url.join("/robots.txt")
}

/// Cache key for the origin of `url` (scheme, host, and port)
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}
