use crate::config::types::{
    Config, DebugConfig, FetchConfig, IdentityConfig, ProxyConfig, RobotsConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_proxy_config(&config.proxy)?;
    validate_identity_config(&config.identity)?;
    validate_robots_config(&config.robots)?;
    validate_debug_config(&config.debug)?;
    Ok(())
}

/// Validates attempt loop configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 20, got {}",
            config.max_attempts
        )));
    }

    validate_delay_range(config.delay_min_secs, config.delay_max_secs)?;

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.captcha_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "captcha_markers cannot contain empty strings".to_string(),
        ));
    }

    if let Some(marker) = &config.expected_marker {
        if marker.trim().is_empty() {
            return Err(ConfigError::Validation(
                "expected_marker cannot be empty when set".to_string(),
            ));
        }
    }

    validate_http_url("referer", &config.referer)?;

    for url in &config.warmup_urls {
        validate_http_url("warmup_urls", url)?;
    }

    for tier in &config.pacing {
        validate_delay_range(tier.delay_min_secs, tier.delay_max_secs)?;
    }

    let mut thresholds: Vec<u64> = config.pacing.iter().map(|t| t.after_requests).collect();
    thresholds.sort_unstable();
    if thresholds.windows(2).any(|w| w[0] == w[1]) {
        return Err(ConfigError::Validation(
            "pacing tiers must have distinct after_requests values".to_string(),
        ));
    }

    Ok(())
}

/// Longest delay any single range may ask for (seconds)
pub(crate) const MAX_DELAY_SECS: f64 = 3600.0;

/// Validates a delay range given in seconds
pub(crate) fn validate_delay_range(min: f64, max: f64) -> Result<(), ConfigError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(ConfigError::Validation(format!(
            "delay range must be finite, got ({}, {})",
            min, max
        )));
    }

    if min < 0.0 {
        return Err(ConfigError::Validation(format!(
            "delay_min_secs must be >= 0, got {}",
            min
        )));
    }

    if min > max {
        return Err(ConfigError::Validation(format!(
            "delay_min_secs ({}) must not exceed delay_max_secs ({})",
            min, max
        )));
    }

    if max > MAX_DELAY_SECS {
        return Err(ConfigError::Validation(format!(
            "delay_max_secs must be <= {}, got {}",
            MAX_DELAY_SECS, max
        )));
    }

    Ok(())
}

/// Validates proxy configuration
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 100 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 100, got {}",
            config.max_workers
        )));
    }

    if config.probe_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "probe_timeout_secs must be >= 1".to_string(),
        ));
    }

    validate_http_url("echo_url", &config.echo_url)?;

    for source in &config.sources {
        validate_http_url("sources", source)?;
    }

    if config.enabled && config.sources.is_empty() {
        return Err(ConfigError::Validation(
            "proxy pool is enabled but no sources are configured".to_string(),
        ));
    }

    Ok(())
}

/// Validates identity configuration
fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain empty strings".to_string(),
        ));
    }

    if let Some(path) = &config.profile_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "profile_path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates robots configuration
fn validate_robots_config(config: &RobotsConfig) -> Result<(), ConfigError> {
    if config.agent_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "agent_token cannot be empty".to_string(),
        ));
    }

    if config.agent_token.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "agent_token must be a single product token, got '{}'",
            config.agent_token
        )));
    }

    let cap = config.max_crawl_delay_secs;
    if !cap.is_finite() || cap <= 0.0 || cap > MAX_DELAY_SECS {
        return Err(ConfigError::Validation(format!(
            "max_crawl_delay_secs must be in (0, {}], got {}",
            MAX_DELAY_SECS, cap
        )));
    }

    Ok(())
}

/// Validates debug sink configuration
fn validate_debug_config(config: &DebugConfig) -> Result<(), ConfigError> {
    if config.enabled && config.directory.is_empty() {
        return Err(ConfigError::Validation(
            "debug directory cannot be empty when the sink is enabled".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a field holds an absolute http(s) URL
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}
