//! Caching-service descriptors as reported by the fleet inventory.

use serde::{Deserialize, Serialize};

/// Resource-name prefix the inventory puts in front of caching-service names.
pub const CACHING_SERVICE_PREFIX: &str = "cachingservice/";

/// Lifecycle state of a caching service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Unspecified,
    Registered,
    DeployedPreServing,
    DeployedTesting,
    Serving,
    NeedsRepair,
    Decommissioned,
    /// Any state this crate does not know about
    Other,
}

impl ServiceState {
    /// Parse the inventory enum name (`STATE_SERVING`, ...).
    pub fn from_proto_name(name: &str) -> Self {
        match name {
            "STATE_UNSPECIFIED" => Self::Unspecified,
            "STATE_REGISTERED" => Self::Registered,
            "STATE_DEPLOYED_PRE_SERVING" => Self::DeployedPreServing,
            "STATE_DEPLOYED_TESTING" => Self::DeployedTesting,
            "STATE_SERVING" => Self::Serving,
            "STATE_NEEDS_REPAIR" => Self::NeedsRepair,
            "STATE_DECOMMISSIONED" => Self::Decommissioned,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Unspecified => write!(f, "unspecified"),
            ServiceState::Registered => write!(f, "registered"),
            ServiceState::DeployedPreServing => write!(f, "deployed_pre_serving"),
            ServiceState::DeployedTesting => write!(f, "deployed_testing"),
            ServiceState::Serving => write!(f, "serving"),
            ServiceState::NeedsRepair => write!(f, "needs_repair"),
            ServiceState::Decommissioned => write!(f, "decommissioned"),
            ServiceState::Other => write!(f, "other"),
        }
    }
}

/// One caching service: a named host listening on `port`, serving DUTs in
/// each of `serving_subnets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachingService {
    pub name: String,
    pub port: i64,
    pub serving_subnets: Vec<String>,
    pub state: ServiceState,
}

impl CachingService {
    pub fn new(name: impl Into<String>, port: i64, serving_subnets: Vec<String>, state: ServiceState) -> Self {
        Self { name: name.into(), port, serving_subnets, state }
    }

    /// DNS-resolvable host name with any `cachingservice/` prefix removed.
    pub fn hostname(&self) -> &str {
        let name = self.name.trim();
        name.strip_prefix(CACHING_SERVICE_PREFIX).unwrap_or(name)
    }

    /// `http://<host>:<port>`, or `None` when the port is out of range or
    /// the name is empty.
    pub fn backend_url(&self) -> Option<String> {
        let host = self.hostname();
        let port = u16::try_from(self.port).ok().filter(|p| *p != 0)?;
        if host.is_empty() {
            return None;
        }
        Some(format!("http://{}:{}", host, port))
    }

    pub fn is_serving(&self) -> bool {
        self.state == ServiceState::Serving
    }
}
