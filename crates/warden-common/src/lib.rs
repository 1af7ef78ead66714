//! Warden Common - Shared types and utilities
//!
//! This crate provides the foundational pieces used across all Warden components:
//! - The workspace error type
//! - Well-known cache names
//! - Utility functions

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::{Result, WardenError};
pub use utils::{check_resource_id, current_timestamp};

/// Name of the cluster replicated cache holding the lock table.
///
/// The backing cache must be configured with an expiry so that stale locks
/// left behind by crashed nodes are eventually removed.
pub const LOCK_MAP_CACHE: &str = "lockmanager.lockmap";

/// Name of the request scoped cache tracking locks taken by the current request
pub const REQUEST_LOCKS_CACHE: &str = "lockmanager.requestmap";

/// Prefix for configuration keys and environment overrides
pub const CONFIG_PREFIX: &str = "warden";
