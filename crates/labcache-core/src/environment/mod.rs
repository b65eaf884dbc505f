//! Topology environments.
//!
//! An environment owns the current topology snapshot and knows how to judge
//! backend health. The frontend only sees the [`Environment`] capability set,
//! so it cannot tell whether subnets came from a file or from the inventory.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Environment (trait)                                          │
//! │  ├── StaticConfigEnv: parsed once, immutable, HTTP probe      │
//! │  └── InventoryEnv:    ArcSwap<Vec<Subnet>> + hourly refresh,   │
//! │                       stale-cache fallback, SSH+curl probe    │
//! └───────────────────────────────────────────────────────────────┘
//! ```

mod inventory;
mod static_config;

use async_trait::async_trait;
use labcache_types::models::Subnet;
use labcache_types::Topology;
use std::sync::Arc;

use crate::context::CallContext;

pub use inventory::{assemble_inventory_topology, InventoryEnv};
pub use static_config::{parse_static_config, StaticConfig, StaticConfigEnv};

#[async_trait]
pub trait Environment: Send + Sync {
    /// Current topology. The returned handle stays valid and unchanged for
    /// as long as the caller holds it, even across refreshes.
    async fn snapshot(&self, ctx: &CallContext) -> Topology;

    /// Probe one backend. Never fails; any problem reads as unhealthy.
    async fn is_healthy(&self, backend: &str) -> bool;
}

/// Sort subnets by CIDR and drop any that overlap an earlier one.
///
/// Keeps the published topology disjoint no matter what the source said.
pub(crate) fn publish(mut subnets: Vec<Subnet>) -> Topology {
    subnets.sort_by_key(|s| s.cidr());

    let mut published: Vec<Subnet> = Vec::with_capacity(subnets.len());
    for subnet in subnets {
        if let Some(existing) = published.iter().find(|p| p.overlaps(&subnet)) {
            tracing::warn!(
                cidr = %subnet.cidr(),
                overlaps = %existing.cidr(),
                "Dropping subnet that overlaps an already published one"
            );
            continue;
        }
        published.push(subnet);
    }

    Arc::new(published)
}
