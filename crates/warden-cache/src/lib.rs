//! Warden Cache - Cluster replicated and request scoped caches
//!
//! This crate provides:
//! - A byte level `Cache` contract with a typed JSON view (`TypedCache`)
//! - An in-process cluster backend on moka, shared by simulated nodes
//! - Thread bound request caches whose entries are unbound when the request ends
//! - The `CacheManagerService` tying both lifecycles together

pub mod cache;
pub mod cluster;
pub mod config;
pub mod manager;
pub mod request;
pub mod scope;

pub use cache::{Cache, TypedCache};
pub use cluster::{ClusterBackend, ClusterCache};
pub use config::CacheConfig;
pub use manager::{CacheManagerService, MemoryCacheManager, RequestGuard};
pub use request::{RequestCache, ScopeBound};
pub use scope::CacheScope;
