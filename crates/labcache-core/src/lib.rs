//! # Labcache Core
//!
//! Assigns lab devices (DUTs) to caching backends.
//!
//! ## Architecture
//!
//! ```text
//! labcache-core/src/
//! ├── frontend/      # subnet lookup, FNV-1a selection, failover, URL rewrite
//! ├── environment/   # topology sources: static config file, fleet inventory
//! ├── inventory/     # InventoryClient trait + JSON pRPC client
//! ├── health/        # HealthProbe trait: HTTP probe, ssh+curl probe
//! └── context.rs     # per-call cancellation and deadline
//! ```
//!
//! The frontend holds one `Arc<dyn Environment>` and never learns which
//! source produced the topology.

#![allow(
    clippy::significant_drop_tightening,
    reason = "Refresh guard is held across the inventory fetch on purpose"
)]
#![allow(clippy::implicit_clone, reason = "Explicit .clone() vs .to_string() is stylistic")]
#![allow(clippy::needless_continue, reason = "Explicit continue improves loop readability")]
// Test-only lints: allow panic!, expect, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::needless_collect,
        clippy::assertions_on_result_states
    )
)]

pub mod context;
pub mod environment;
pub mod frontend;
pub mod health;
pub mod inventory;

// Re-export commonly used types
pub use context::CallContext;
pub use environment::{Environment, InventoryEnv, StaticConfigEnv};
pub use frontend::Frontend;
pub use health::{HealthProbe, HttpProbe, SshCurlProbe};
pub use inventory::{InventoryClient, PrpcInventoryClient};
pub use labcache_types::{AssignError, EnvironmentError, InventoryError, RpcCode, Topology};
