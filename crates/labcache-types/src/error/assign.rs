//! Backend assignment errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status code the surrounding RPC layer replies with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcCode {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Cancelled,
    DeadlineExceeded,
}

impl std::fmt::Display for RpcCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcCode::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            RpcCode::NotFound => write!(f, "NOT_FOUND"),
            RpcCode::FailedPrecondition => write!(f, "FAILED_PRECONDITION"),
            RpcCode::Cancelled => write!(f, "CANCELLED"),
            RpcCode::DeadlineExceeded => write!(f, "DEADLINE_EXCEEDED"),
        }
    }
}

/// Errors returned by `Frontend::assign_backend` and friends.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum AssignError {
    /// DUT address is not a dotted-quad IPv4 address
    #[error("invalid DUT address {address:?}: {message}")]
    InvalidAddress { address: String, message: String },

    /// Artifact path used as the hash key is empty
    #[error("artifact path is empty")]
    EmptyArtifactPath,

    /// Artifact URL could not be turned into a cache URL
    #[error("invalid artifact URL {url:?}: {message}")]
    InvalidArtifactUrl { url: String, message: String },

    /// No published subnet contains the DUT address
    #[error("{address} is not in any subnet served by a caching backend")]
    NotInAnySubnet { address: String },

    /// Every backend of the DUT's subnet failed its health probe
    #[error("no healthy backend in subnet {cidr} ({tried} probed)")]
    NoHealthyBackend { cidr: String, tried: usize },

    /// Caller cancelled the request
    #[error("assignment cancelled by caller")]
    Cancelled,

    /// Caller deadline elapsed before a backend was chosen
    #[error("assignment deadline exceeded")]
    DeadlineExceeded,
}

impl AssignError {
    /// Map the error kind to the reply code of the wiring service.
    pub fn status_code(&self) -> RpcCode {
        match self {
            Self::InvalidAddress { .. } | Self::EmptyArtifactPath | Self::InvalidArtifactUrl { .. } => {
                RpcCode::InvalidArgument
            },
            Self::NotInAnySubnet { .. } => RpcCode::NotFound,
            Self::NoHealthyBackend { .. } => RpcCode::FailedPrecondition,
            Self::Cancelled => RpcCode::Cancelled,
            Self::DeadlineExceeded => RpcCode::DeadlineExceeded,
        }
    }

    /// Input errors are deterministic rejections.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. } | Self::EmptyArtifactPath | Self::InvalidArtifactUrl { .. }
        )
    }

    /// Only availability errors are worth retrying without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoHealthyBackend { .. } | Self::DeadlineExceeded)
    }
}
