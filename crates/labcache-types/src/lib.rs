//! # labcache Types
//!
//! Core types and error definitions for the lab cache frontend.
//!
//! - **`error`** - Typed error hierarchy for assignment, environments and topology
//! - **`models`** - Domain models (Subnet, CachingService, endpoint config)
//!
//! ## Architecture Role
//!
//! `labcache-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!        labcache-types (this crate)
//!                │
//!                ▼
//!         labcache-core
//!                │
//!                ▼
//!    wiring service (CacheForDut RPCs)
//! ```

pub mod error;
pub mod models;

pub use error::{AssignError, EnvironmentError, InventoryError, RpcCode, SubnetError};

pub use models::{CachingService, InventoryEndpointConfig, ServiceState, Subnet, Topology};
