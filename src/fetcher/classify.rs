//! Per-attempt response classification
//!
//! | Condition | Verdict | Proxy |
//! |-----------|---------|-------|
//! | Transport error | Transient | burned |
//! | HTTP 202 | Transient, longer backoff | kept |
//! | HTTP 403 | Blocked | burned |
//! | HTTP 429 / 503 | RateLimited | burned |
//! | CAPTCHA marker in body | Blocked | burned |
//! | Other non-2xx | Transient | kept |
//! | 2xx, too small or missing marker | Transient (incomplete) | kept |
//! | 2xx otherwise | Success | kept |

use crate::config::FetchConfig;
use crate::fetcher::RawResponse;
use crate::TransportError;
use std::fmt;

/// Coarse result of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Success,
    Blocked,
    RateLimited,
    Transient,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Blocked => "blocked",
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verdict plus what the attempt loop should do about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub verdict: Verdict,
    /// Human readable cause, carried into terminal outcomes
    pub detail: String,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// The proxy used should not be used again this session
    pub burn_proxy: bool,
    /// The next attempt should wait longer than usual
    pub extend_backoff: bool,
}

impl Classification {
    fn new(verdict: Verdict, detail: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            verdict,
            detail: detail.into(),
            status,
            burn_proxy: false,
            extend_backoff: false,
        }
    }

    fn burning(mut self) -> Self {
        self.burn_proxy = true;
        self
    }

    fn extended(mut self) -> Self {
        self.extend_backoff = true;
        self
    }
}

/// Site-specific heuristics for spotting blocked or incomplete pages
#[derive(Debug, Clone, Default)]
pub struct ClassifyRules {
    /// 2xx bodies shorter than this are incomplete
    pub min_body_bytes: usize,
    /// Must appear (case-insensitive) in a 2xx body
    pub expected_marker: Option<String>,
    /// Any of these (case-insensitive) flags a CAPTCHA / bot wall
    pub captcha_markers: Vec<String>,
}

impl ClassifyRules {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            min_body_bytes: config.min_body_bytes,
            expected_marker: config.expected_marker.clone(),
            captcha_markers: config.captcha_markers.clone(),
        }
    }
}

/// Classifies the result of one attempt
pub fn classify(
    result: &Result<RawResponse, TransportError>,
    rules: &ClassifyRules,
) -> Classification {
    let response = match result {
        Ok(response) => response,
        Err(e) => return Classification::new(Verdict::Transient, e.to_string(), None).burning(),
    };

    let status = Some(response.status);
    match response.status {
        202 => {
            return Classification::new(
                Verdict::Transient,
                "HTTP 202 accepted but not fulfilled",
                status,
            )
            .extended()
        }
        403 => return Classification::new(Verdict::Blocked, "HTTP 403", status).burning(),
        429 | 503 => {
            return Classification::new(
                Verdict::RateLimited,
                format!("HTTP {}", response.status),
                status,
            )
            .burning()
        }
        _ => {}
    }

    let lowered = response.body.to_lowercase();
    if let Some(marker) = rules
        .captcha_markers
        .iter()
        .find(|m| lowered.contains(&m.to_lowercase()))
    {
        return Classification::new(
            Verdict::Blocked,
            format!("CAPTCHA marker '{}' in response", marker),
            status,
        )
        .burning();
    }

    if !response.is_success() {
        return Classification::new(
            Verdict::Transient,
            format!("HTTP {}", response.status),
            status,
        );
    }

    if response.body.len() < rules.min_body_bytes {
        return Classification::new(
            Verdict::Transient,
            format!(
                "incomplete response: {} bytes (minimum {})",
                response.body.len(),
                rules.min_body_bytes
            ),
            status,
        );
    }

    if let Some(marker) = &rules.expected_marker {
        if !lowered.contains(&marker.to_lowercase()) {
            return Classification::new(
                Verdict::Transient,
                format!("incomplete response: marker '{}' missing", marker),
                status,
            );
        }
    }

    Classification::new(Verdict::Success, format!("HTTP {}", response.status), status)
}
