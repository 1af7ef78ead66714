//! Warden Lock - Cluster wide advisory locks
//!
//! This crate provides:
//! - `LockCoordinator`: acquire, wait for, and release locks keyed by resource id
//! - Request scoped cleanup: locks left behind by a request are released when it ends
//! - Configurable wait policy with linear backoff
//! - Lock outcome statistics and metrics
//!
//! Locks are advisory. Nothing stops code that never asks for a lock from
//! touching the resource it guards.

pub mod config;
pub mod coordinator;
pub mod entry;
pub mod handle;
pub mod identity;
pub mod stats;

pub use config::{LockConfig, WaitPolicy};
pub use coordinator::{LockCoordinator, LockManager};
pub use entry::LockEntry;
pub use handle::LockHandle;
pub use identity::{IdentityProvider, RandomIdentity, current_thread_id};
pub use stats::{LockStats, describe_metrics};
