pub mod caching_service;
pub mod config;
pub mod subnet;

pub use caching_service::{CachingService, ServiceState, CACHING_SERVICE_PREFIX};
pub use config::{InventoryEndpointConfig, INVENTORY_RPC_TIMEOUT, PUBLISH_PORT, REFRESH_INTERVAL};
pub use subnet::{check_disjoint, normalize_backend_url, Subnet, Topology};
