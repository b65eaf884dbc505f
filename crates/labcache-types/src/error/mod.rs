//! Typed error definitions for labcache.
//!
//! Errors are grouped by where they surface:
//!
//! - [`AssignError`] crosses the public `assign_backend` boundary
//! - [`EnvironmentError`] is returned only by environment constructors
//! - [`InventoryError`] stays inside the inventory refresh path
//! - [`SubnetError`] guards the `Subnet` construction invariants

mod assign;
mod environment;
mod inventory;
mod subnet;

pub use assign::{AssignError, RpcCode};
pub use environment::EnvironmentError;
pub use inventory::InventoryError;
pub use subnet::SubnetError;
