//! Caller facing view of a lock entry

use std::fmt;

use warden_cache::ScopeBound;
use warden_common::Result;

use crate::coordinator::LockCoordinator;
use crate::entry::LockEntry;

/// A snapshot of a lock entry, bound to the coordinator that read it
///
/// The handle never changes after it is returned. Use [`refresh`](Self::refresh)
/// to observe the current state of the lock table.
#[derive(Clone)]
pub struct LockHandle {
    entry: LockEntry,
    coordinator: LockCoordinator,
}

impl LockHandle {
    pub(crate) fn new(entry: LockEntry, coordinator: LockCoordinator) -> Self {
        Self { entry, coordinator }
    }

    pub fn resource_id(&self) -> &str {
        self.entry.resource_id()
    }

    pub fn entry(&self) -> &LockEntry {
        &self.entry
    }

    pub fn is_locked(&self) -> bool {
        self.entry.is_locked()
    }

    /// Whether the snapshot names this process and the calling thread as owner
    ///
    /// The answer depends on the thread asking: a handle passed to another
    /// thread reports `false` there.
    pub fn is_owner(&self) -> bool {
        self.coordinator.owns(&self.entry)
    }

    /// Re-read the lock table entry for this resource
    pub fn refresh(&self) -> Result<Option<LockHandle>> {
        self.coordinator.get_lock(self.resource_id(), false)
    }

    /// Shorthand for [`LockCoordinator::release`]
    pub fn release(&self) -> Result<bool> {
        self.coordinator.release(self)
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("entry", &self.entry)
            .field("instance_id", &self.coordinator.instance_id())
            .finish()
    }
}

impl ScopeBound for LockHandle {
    fn unbind(&self) -> Result<()> {
        self.coordinator.release(self).map(|_| ())
    }
}
