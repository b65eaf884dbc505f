//! Subnet construction errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum SubnetError {
    /// A subnet must keep at least one backend
    #[error("subnet {cidr} has no backends")]
    EmptyBackends { cidr: String },

    /// Backend entry is not an absolute `scheme://host:port` URL
    #[error("invalid backend URL {url:?}: {message}")]
    InvalidBackendUrl { url: String, message: String },

    /// Two subnets of one topology share addresses
    #[error("subnet {cidr} overlaps {other}")]
    Overlap { cidr: String, other: String },
}
