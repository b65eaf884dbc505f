//! Environment construction errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building an environment.
///
/// Once an environment is constructed it never surfaces errors again: later
/// refresh failures are logged and the last good snapshot is retained.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum EnvironmentError {
    /// No initial snapshot could be produced
    #[error("{provider} environment initialization failed: {message}")]
    InitializationFailed {
        /// Which provider failed (`static-config`, `inventory`)
        provider: String,
        /// Description of the failure
        message: String,
    },
}

impl EnvironmentError {
    pub fn initialization(provider: &str, message: impl Into<String>) -> Self {
        Self::InitializationFailed { provider: provider.to_string(), message: message.into() }
    }

    /// Create an initialization error from a failed read of `path`.
    pub fn from_io_error(provider: &str, path: &std::path::Path, e: &std::io::Error) -> Self {
        Self::initialization(provider, format!("read {}: {}", path.display(), e))
    }
}
