//! Raw response persistence for offline inspection

use crate::config::DebugConfig;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const MAX_LABEL_LEN: usize = 100;

/// Numbered suffixes tried before giving up on a colliding name
const MAX_NAME_SUFFIX: u32 = 1000;

/// Writes raw response bodies to disk
///
/// A disabled sink does nothing. Write failures are logged and never reach
/// the caller.
#[derive(Debug, Clone, Default)]
pub struct DebugSink {
    directory: Option<PathBuf>,
}

impl DebugSink {
    /// A sink writing into `directory`, created on first use
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { directory: None }
    }

    pub fn from_config(config: &DebugConfig) -> Self {
        if config.enabled {
            Self::new(&config.directory)
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Saves `body` as `<dir>/<label>_<UTC timestamp>.html`
    ///
    /// Existing files are never overwritten: a colliding name gets a
    /// `_1`, `_2`, ... suffix.
    ///
    /// # Arguments
    ///
    /// * `body` - Raw response body
    /// * `label` - Free-form label; sanitized before use in the file name
    ///
    /// # Returns
    ///
    /// The written path, or `None` when disabled or the write failed
    pub fn persist(&self, body: &str, label: &str) -> Option<PathBuf> {
        let directory = self.directory.as_ref()?;

        if let Err(e) = fs::create_dir_all(directory) {
            tracing::warn!(
                "Failed to create debug directory {}: {}",
                directory.display(),
                e
            );
            return None;
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let stem = format!("{}_{}", sanitize_label(label), timestamp);

        match write_new(directory, &stem, body) {
            Ok(path) => {
                tracing::debug!("Saved response body to {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to save debug file {}/{}.html: {}",
                    directory.display(),
                    stem,
                    e
                );
                None
            }
        }
    }
}

/// Writes `body` to `<dir>/<stem>.html`, or the first free `<stem>_<n>.html`
fn write_new(directory: &Path, stem: &str, body: &str) -> io::Result<PathBuf> {
    for n in 0..=MAX_NAME_SUFFIX {
        let name = match n {
            0 => format!("{}.html", stem),
            n => format!("{}_{}.html", stem, n),
        };
        let path = directory.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(body.as_bytes())?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for {}", stem),
    ))
}

/// Reduces `label` to a safe file name stem
///
/// Keeps ASCII letters, digits, `-` and `_`; every other run of characters
/// becomes a single `_`.
pub fn sanitize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    let trimmed: String = out.trim_matches('_').chars().take(MAX_LABEL_LEN).collect();
    if trimmed.is_empty() {
        "response".to_string()
    } else {
        trimmed
    }
}
