//! tenacious-fetch: a resilient HTTP fetch engine for scrapers
//!
//! This crate implements the request-resilience layer that site-specific scrapers
//! sit on top of: proxy discovery and rotation, browser identity rotation,
//! robots.txt compliance, retry with jittered backoff, block/CAPTCHA detection,
//! and a debug sink for raw response bodies.

pub mod config;
pub mod fetcher;
pub mod identity;
pub mod output;
pub mod proxy;
pub mod robots;
pub mod state;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for tenacious-fetch operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while building a `FetchRequest`
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("Failed to parse URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Attempt budget must be at least 1")]
    ZeroBudget,

    #[error("Invalid delay range: {0}")]
    InvalidDelay(String),
}

/// Network-level failure of a single HTTP attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Proxy {proxy} unusable: {message}")]
    Proxy { proxy: String, message: String },

    #[error("Failed to read body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Other { url: String, message: String },
}

/// Errors from loading a dynamic identity source
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to read identity profile {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse identity profile {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Identity profile {path} contains no user agents")]
    Empty { path: PathBuf },
}

/// Result type alias for tenacious-fetch operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

// Re-export commonly used types
pub use config::Config;
pub use fetcher::{FetchOutcome, FetchReport, FetchRequest, Fetcher, ReqwestTransport};
pub use identity::{Identity, IdentityRotator};
pub use proxy::{ProxyCandidate, ProxyPool};
pub use robots::{PolicyDecision, PolicyGate};
pub use state::{FetchState, Session};
