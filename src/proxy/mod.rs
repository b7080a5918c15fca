//! Proxy pool management
//!
//! This module provides the egress proxies the fetcher rotates through:
//! - Discovery of candidates from public proxy listing pages
//! - Concurrent liveness validation against an echo endpoint
//! - A read-only pool that hands out random, non-excluded proxies

mod discovery;
mod pool;
mod validate;

pub use discovery::{discover, parse_listing};
pub use pool::ProxyPool;
pub use validate::{validate, ProbeSettings};

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A proxy endpoint such as `http://10.0.0.1:8080`
///
/// Identity (equality, hashing, ordering) is the address alone; `validated`
/// only records whether the candidate passed a liveness probe.
#[derive(Debug, Clone)]
pub struct ProxyCandidate {
    address: String,
    validated: bool,
}

impl ProxyCandidate {
    /// Creates an unvalidated candidate
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            validated: false,
        }
    }

    /// Builds an `http://ip:port` candidate
    pub fn from_host_port(host: &str, port: u16) -> Self {
        Self::new(format!("http://{}:{}", host, port))
    }

    /// The proxy URL, scheme included
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the candidate passed a liveness probe
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Returns the same candidate marked as validated
    pub fn into_validated(mut self) -> Self {
        self.validated = true;
        self
    }
}

impl PartialEq for ProxyCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for ProxyCandidate {}

impl Hash for ProxyCandidate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl Ord for ProxyCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address.cmp(&other.address)
    }
}

impl PartialOrd for ProxyCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ProxyCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}
