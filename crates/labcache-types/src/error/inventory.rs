//! Inventory RPC errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a single `ListCachingServices` call.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum InventoryError {
    /// Connection or request failure
    #[error("inventory transport error: {message}")]
    Transport { message: String },

    /// Inventory answered with a non-success status
    #[error("inventory returned status {code}: {body}")]
    Status { code: u16, body: String },

    /// Response body could not be decoded
    #[error("inventory response decode error: {message}")]
    Decode { message: String },

    /// Call did not finish within its budget
    #[error("inventory call timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl InventoryError {
    pub fn from_json_error(e: &serde_json::Error) -> Self {
        Self::Decode { message: e.to_string() }
    }
}
