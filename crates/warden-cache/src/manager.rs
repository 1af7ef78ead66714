//! Cache manager service
//!
//! The manager is the single entry point a component uses to reach its
//! caches: cluster replicated caches by name, and request caches that are
//! swept when the current request ends.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use warden_common::Result;

use crate::cache::Cache;
use crate::cluster::ClusterBackend;
use crate::request::{self, RequestCache};
use crate::scope::CacheScope;

/// Access to named caches across both lifecycles
pub trait CacheManagerService: Send + Sync {
    /// Get (or create) the cluster replicated cache called `name`
    fn cluster_cache(&self, name: &str) -> Arc<dyn Cache>;

    /// Get the request cache called `name` for the calling thread's request
    fn request_cache(&self, name: &str) -> RequestCache;

    /// Tear down the calling thread's request, sweeping every request cache
    ///
    /// Returns the number of entries unbound.
    fn end_request(&self) -> usize;

    /// Clear the cache called `name` in the given scope
    ///
    /// Clearing a request cache unbinds each of its entries. Returns the
    /// number of entries removed (approximate for the cluster scope).
    fn clear(&self, scope: CacheScope, name: &str) -> Result<usize> {
        match scope {
            CacheScope::ClusterReplicated => {
                let cache = self.cluster_cache(name);
                let count = cache.len() as usize;
                cache.clear()?;
                Ok(count)
            }
            CacheScope::Request => Ok(self.request_cache(name).clear()),
        }
    }
}

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// In-process cache manager backed by a [`ClusterBackend`]
///
/// Managers built over the same backend behave like separate nodes of one
/// cluster: they share cluster entries but each has its own request scope.
pub struct MemoryCacheManager {
    id: u64,
    backend: Arc<ClusterBackend>,
}

impl Default for MemoryCacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCacheManager {
    /// Create a manager with a private backend
    pub fn new() -> Self {
        Self::with_backend(Arc::new(ClusterBackend::new()))
    }

    /// Create a manager joined to an existing backend
    pub fn with_backend(backend: Arc<ClusterBackend>) -> Self {
        let id = NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed);
        debug!(manager_id = id, "Cache manager created");
        Self { id, backend }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn backend(&self) -> &Arc<ClusterBackend> {
        &self.backend
    }
}

impl CacheManagerService for MemoryCacheManager {
    fn cluster_cache(&self, name: &str) -> Arc<dyn Cache> {
        Arc::new(self.backend.cache(name))
    }

    fn request_cache(&self, name: &str) -> RequestCache {
        RequestCache::new(self.id, name)
    }

    fn end_request(&self) -> usize {
        let swept = request::end_request(self.id);
        debug!(manager_id = self.id, swept, "Request ended");
        swept
    }
}

/// Ends the calling thread's request when dropped
///
/// Bound to the thread that created it, since request caches are per thread.
pub struct RequestGuard {
    manager: Arc<dyn CacheManagerService>,
    finished: bool,
    _not_send: PhantomData<*const ()>,
}

impl RequestGuard {
    pub fn new(manager: Arc<dyn CacheManagerService>) -> Self {
        Self {
            manager,
            finished: false,
            _not_send: PhantomData,
        }
    }

    /// End the request now and report how many entries were swept
    pub fn finish(mut self) -> usize {
        self.finished = true;
        self.manager.end_request()
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.manager.end_request();
        }
    }
}
