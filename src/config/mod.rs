//! Configuration module for tenacious-fetch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use tenacious_fetch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("fetch.toml")).unwrap();
//! println!("Attempts per fetch: {}", config.fetch.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DebugConfig, FetchConfig, IdentityConfig, PacingTier, ProxyConfig, ProxyStrategy,
    RobotsConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

pub use validation::validate as validate_config;
pub(crate) use validation::validate_delay_range;
