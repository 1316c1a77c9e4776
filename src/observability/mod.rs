//! Logging for the Numista client.
//!
//! The client never installs a global subscriber. When a log destination is
//! configured it builds its own [`Dispatch`] and scopes its futures to it.

use crate::errors::{NumistaError, NumistaResult};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::{debug, Dispatch};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "Numista-API-Key";

/// Logging configuration for one client instance.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Log at debug level instead of info.
    pub verbose: bool,
    /// Append records to this file.
    pub path: Option<PathBuf>,
}

impl LoggingConfig {
    /// Creates a logging configuration.
    pub fn new(verbose: bool, path: Option<PathBuf>) -> Self {
        Self { verbose, path }
    }

    /// Gets the maximum level to record.
    pub fn level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }

    /// Builds a dispatch writing to the configured file.
    ///
    /// Returns `None` when no path is set, in which case records go to
    /// whatever subscriber the application installed.
    pub fn build_dispatch(&self) -> NumistaResult<Option<Dispatch>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                NumistaError::configuration(format!(
                    "Failed to open log file {}: {}",
                    path.display(),
                    e
                ))
                .with_cause(e)
            })?;

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.level())
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
            .finish();

        Ok(Some(Dispatch::new(subscriber)))
    }
}

/// Masks a secret down to its last four characters, e.g. `***1234`.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("***{}", tail)
}

/// Produces a log-safe copy of request headers.
///
/// The API key and bearer token values keep only their last four characters.
pub fn masked_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let masked = if name.eq_ignore_ascii_case(API_KEY_HEADER) {
                mask_secret(value)
            } else if name.eq_ignore_ascii_case("authorization") {
                match value.strip_prefix("Bearer ") {
                    Some(token) => format!("Bearer {}", mask_secret(token)),
                    None => mask_secret(value),
                }
            } else {
                value.clone()
            };
            (name.clone(), masked)
        })
        .collect()
}

/// Logs an outgoing request with secrets masked.
pub fn on_request_start(
    method: &str,
    url: &str,
    params: &[(String, String)],
    headers: &HashMap<String, String>,
) {
    debug!(
        method = %method,
        url = %url,
        params = ?params,
        headers = ?masked_headers(headers),
        "Numista API request started"
    );
}

/// Logs a completed request.
pub fn on_request_complete(method: &str, url: &str, status: u16, failed: bool) {
    debug!(
        method = %method,
        url = %url,
        status,
        failed,
        "Numista API request completed"
    );
}
