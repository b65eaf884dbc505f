//! Fleet inventory access.
//!
//! The environment needs exactly one remote operation: list every caching
//! service the inventory knows about. Transport and credentials live behind
//! [`InventoryClient`] so the refresh logic can be driven by a fake in tests.

mod prpc;

use async_trait::async_trait;
use labcache_types::{CachingService, InventoryError};
use std::time::Duration;

pub use prpc::{PrpcInventoryClient, LIST_CACHING_SERVICES_PATH};

#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Return all caching services. The whole call, including pagination,
    /// must finish within `timeout`.
    async fn list_caching_services(
        &self,
        timeout: Duration,
    ) -> Result<Vec<CachingService>, InventoryError>;
}
