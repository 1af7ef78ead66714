//! Lock coordinator
//!
//! Advisory, cluster wide locks keyed by resource id. The lock table lives in
//! a cluster replicated cache so every node sees every entry; the locks a
//! request creates are also recorded in a request scoped cache so that ending
//! the request releases whatever it still holds.
//!
//! Mutual exclusion between threads of one process comes from a process local
//! monitor around the check-then-create step. Across processes the step is a
//! plain read followed by a write, so two nodes racing on a free resource can
//! both believe they won. Callers needing strict exclusion must not rely on
//! this coordinator alone.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use warden_cache::{CacheManagerService, TypedCache};
use warden_common::{Result, WardenError, check_resource_id};

use crate::config::LockConfig;
use crate::entry::LockEntry;
use crate::handle::LockHandle;
use crate::identity::{IdentityProvider, RandomIdentity, random_id};
use crate::stats::{LockStats, LockStatsCollector};

/// Object safe lock operations
pub trait LockManager: Send + Sync {
    /// Read the lock for `resource_id`, creating one owned by the caller
    /// when `create` is set and the resource is free
    fn get_lock(&self, resource_id: &str, create: bool) -> Result<Option<LockHandle>>;

    /// Claim the resource if free; otherwise return the current holder's lock
    fn acquire(&self, resource_id: &str) -> Result<LockHandle>;

    /// Retry [`acquire`](Self::acquire) until the caller owns the lock
    fn wait_for(&self, resource_id: &str) -> Result<LockHandle>;

    /// Remove the lock if the caller owns it
    fn release(&self, handle: &LockHandle) -> Result<bool>;

    /// Release every lock created during the calling thread's request
    fn clear_all(&self) -> usize;
}

struct Inner {
    cache_manager: Arc<dyn CacheManagerService>,
    lock_map: TypedCache<LockEntry>,
    identity: Arc<dyn IdentityProvider>,
    config: LockConfig,
    monitor: Mutex<()>,
    stats: LockStatsCollector,
}

/// Cluster wide advisory lock coordinator
///
/// One coordinator per process. Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct LockCoordinator {
    inner: Arc<Inner>,
}

impl LockCoordinator {
    /// Coordinator with a random instance id and default settings
    pub fn new(cache_manager: Arc<dyn CacheManagerService>) -> Self {
        Self::with_config(cache_manager, LockConfig::default())
    }

    pub fn with_config(cache_manager: Arc<dyn CacheManagerService>, config: LockConfig) -> Self {
        Self::with_identity(cache_manager, Arc::new(RandomIdentity::new()), config)
    }

    pub fn with_identity(
        cache_manager: Arc<dyn CacheManagerService>,
        identity: Arc<dyn IdentityProvider>,
        config: LockConfig,
    ) -> Self {
        let lock_map = TypedCache::new(cache_manager.cluster_cache(&config.lock_map));
        debug!(
            instance_id = identity.instance_id(),
            lock_map = %config.lock_map,
            request_map = %config.request_map,
            "Lock coordinator created"
        );

        Self {
            inner: Arc::new(Inner {
                cache_manager,
                lock_map,
                identity,
                config,
                monitor: Mutex::new(()),
                stats: LockStatsCollector::default(),
            }),
        }
    }

    pub fn instance_id(&self) -> u64 {
        self.inner.identity.instance_id()
    }

    /// Id of the calling thread as stamped on the locks it creates
    pub fn thread_id(&self) -> u64 {
        self.inner.identity.thread_id()
    }

    pub fn config(&self) -> &LockConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> LockStats {
        self.inner.stats.snapshot()
    }

    /// Read the current lock for `resource_id`
    ///
    /// With `create` set this behaves like [`acquire`](Self::acquire) and
    /// always returns a handle. Without it, returns `None` when the resource
    /// has no entry.
    pub fn get_lock(&self, resource_id: &str, create: bool) -> Result<Option<LockHandle>> {
        if create {
            return self.acquire(resource_id).map(Some);
        }
        check_resource_id(resource_id)?;
        Ok(self
            .read(resource_id)?
            .map(|entry| LockHandle::new(entry, self.clone())))
    }

    /// Claim `resource_id` if nobody holds it
    ///
    /// Never blocks on other holders. The returned handle belongs to the
    /// caller only if [`LockHandle::is_owner`] says so; otherwise it describes
    /// whoever holds the lock.
    pub fn acquire(&self, resource_id: &str) -> Result<LockHandle> {
        check_resource_id(resource_id)?;
        let handle = LockHandle::new(self.claim(resource_id)?, self.clone());

        if handle.is_owner() {
            self.inner.stats.record_granted();
        } else {
            self.inner.stats.record_contended();
        }
        Ok(handle)
    }

    /// Poll [`acquire`](Self::acquire) with growing pauses until the caller
    /// owns the lock or the attempts run out
    pub fn wait_for(&self, resource_id: &str) -> Result<LockHandle> {
        let policy = self.inner.config.wait;
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let handle = self.acquire(resource_id)?;
            if handle.is_owner() {
                if attempt > 1 {
                    debug!(resource_id = %resource_id, attempt, "Lock granted after waiting");
                }
                return Ok(handle);
            }
            if attempt == max_attempts {
                break;
            }

            let backoff = policy.backoff(attempt);
            if attempt % 100 == 0 {
                warn!(
                    resource_id = %resource_id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    owner_instance_id = handle.entry().owner_instance_id(),
                    held_ms = handle.entry().age_ms(),
                    "Still waiting for lock"
                );
            } else if attempt % 5 == 0 {
                debug!(
                    resource_id = %resource_id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Waiting for lock"
                );
            }
            std::thread::sleep(backoff);
        }

        self.inner.stats.record_timeout();
        warn!(resource_id = %resource_id, attempts = max_attempts, "Timed out waiting for lock");
        Err(WardenError::LockTimeout {
            resource_id: resource_id.to_string(),
            attempts: max_attempts,
        })
    }

    /// Remove the lock behind `handle` if the caller owns it
    ///
    /// Ownership is checked on the handle and again on the entry currently in
    /// the lock table. Returns whether an entry was removed; releasing a lock
    /// the caller does not hold is a no-op.
    pub fn release(&self, handle: &LockHandle) -> Result<bool> {
        let resource_id = handle.resource_id();
        if !handle.is_owner() {
            self.inner.stats.record_ignored_release();
            debug!(resource_id = %resource_id, "Release ignored, not the owner");
            return Ok(false);
        }

        let current = match self.read(resource_id)? {
            Some(entry) if entry.is_locked() && self.owns(&entry) => entry,
            _ => {
                self.inner.stats.record_ignored_release();
                debug!(resource_id = %resource_id, "Release ignored, lock no longer held");
                return Ok(false);
            }
        };

        {
            let _monitor = self.inner.monitor.lock();
            self.inner.lock_map.remove(resource_id)?;
        }
        self.request_locks().remove(resource_id);

        let held_ms = current.age_ms();
        self.inner.stats.record_released(held_ms);
        debug!(resource_id = %resource_id, token = current.token(), held_ms, "Lock released");
        Ok(true)
    }

    /// Release every lock created during the calling thread's request
    ///
    /// Returns the number of request entries swept. Locks already released
    /// or taken over by someone else are left untouched.
    pub fn clear_all(&self) -> usize {
        let swept = self.request_locks().clear();
        self.inner.stats.record_swept(swept);
        swept
    }

    /// Run `f` while holding the lock on `resource_id`
    ///
    /// The lock is released afterwards whether or not `f` succeeds. An error
    /// from `f` takes precedence over one from the release.
    pub fn with_lock<T>(
        &self,
        resource_id: &str,
        f: impl FnOnce(&LockHandle) -> Result<T>,
    ) -> Result<T> {
        let handle = self.wait_for(resource_id)?;
        let result = f(&handle);
        let released = self.release(&handle);

        let value = result?;
        released?;
        Ok(value)
    }

    pub(crate) fn owns(&self, entry: &LockEntry) -> bool {
        entry.is_owned_by(self.instance_id(), self.thread_id())
    }

    fn read(&self, resource_id: &str) -> Result<Option<LockEntry>> {
        self.inner.lock_map.get(resource_id)
    }

    fn request_locks(&self) -> warden_cache::RequestCache {
        self.inner
            .cache_manager
            .request_cache(&self.inner.config.request_map)
    }

    // Returns the live entry for `resource_id`, creating one owned by the
    // caller when there is none or it is unlocked.
    fn claim(&self, resource_id: &str) -> Result<LockEntry> {
        if let Some(entry) = self.read(resource_id)?
            && entry.is_locked()
        {
            return Ok(entry);
        }

        let _monitor = self.inner.monitor.lock();
        if let Some(entry) = self.read(resource_id)?
            && entry.is_locked()
        {
            return Ok(entry);
        }

        let entry = LockEntry::new(resource_id, random_id(), self.instance_id(), self.thread_id());
        self.inner.lock_map.put(resource_id, &entry)?;
        self.request_locks().put(
            resource_id,
            Arc::new(LockHandle::new(entry.clone(), self.clone())),
        );

        debug!(
            resource_id = %resource_id,
            instance_id = entry.owner_instance_id(),
            thread_id = entry.owner_thread_id(),
            token = entry.token(),
            "Lock acquired"
        );
        Ok(entry)
    }
}

impl fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("instance_id", &self.instance_id())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl LockManager for LockCoordinator {
    fn get_lock(&self, resource_id: &str, create: bool) -> Result<Option<LockHandle>> {
        LockCoordinator::get_lock(self, resource_id, create)
    }

    fn acquire(&self, resource_id: &str) -> Result<LockHandle> {
        LockCoordinator::acquire(self, resource_id)
    }

    fn wait_for(&self, resource_id: &str) -> Result<LockHandle> {
        LockCoordinator::wait_for(self, resource_id)
    }

    fn release(&self, handle: &LockHandle) -> Result<bool> {
        LockCoordinator::release(self, handle)
    }

    fn clear_all(&self) -> usize {
        LockCoordinator::clear_all(self)
    }
}
