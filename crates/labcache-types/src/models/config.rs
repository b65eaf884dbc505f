//! Configuration for the inventory endpoint and fixed frontend constants.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port clients are directed to on a statically configured backend host.
pub const PUBLISH_PORT: u16 = 8888;

/// How long an inventory snapshot is served before a refresh is attempted.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Upper bound on a single inventory RPC.
pub const INVENTORY_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Where and how to reach the fleet inventory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryEndpointConfig {
    /// Inventory service host, e.g. `ufs.api.cr.dev`
    pub host: String,
    /// Value of the `namespace` request metadata
    pub namespace: String,
    /// Page size requested per `ListCachingServices` call
    pub page_size: u32,
    /// User agent sent with each request
    pub user_agent: String,
    /// Talk plain HTTP instead of HTTPS (local test servers only)
    pub insecure_http: bool,
}

impl Default for InventoryEndpointConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            namespace: "os".to_string(),
            page_size: 1000,
            user_agent: concat!("labcache/", env!("CARGO_PKG_VERSION")).to_string(),
            insecure_http: false,
        }
    }
}

impl InventoryEndpointConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into(), ..Self::default() }
    }

    /// Base URL (`https://host`) the pRPC paths are appended to.
    pub fn base_url(&self) -> String {
        let scheme = if self.insecure_http { "http" } else { "https" };
        format!("{}://{}", scheme, self.host.trim_end_matches('/'))
    }
}
