//! Process and thread identity
//!
//! Lock ownership is a pair of ids: one for the node process and one for the
//! thread inside it. Both are random so that nodes never need to coordinate
//! to pick them.

use std::cell::Cell;

use rand::Rng;

/// Supplies the ids a coordinator stamps on the locks it creates
pub trait IdentityProvider: Send + Sync {
    /// Id of this process, stable for its lifetime
    fn instance_id(&self) -> u64;

    /// Id of the calling thread, stable for the thread's lifetime
    fn thread_id(&self) -> u64;
}

thread_local! {
    static THREAD_ID: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Random id of the calling thread, generated on first use
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| match id.get() {
        Some(value) => value,
        None => {
            let value = random_id();
            id.set(Some(value));
            value
        }
    })
}

/// A fresh id from the thread local CSPRNG
pub(crate) fn random_id() -> u64 {
    rand::rng().random()
}

/// Default identity: random instance id, lazily generated per-thread ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomIdentity {
    instance_id: u64,
}

impl Default for RandomIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomIdentity {
    pub fn new() -> Self {
        Self {
            instance_id: random_id(),
        }
    }

    /// Pin the instance id, e.g. to model a specific node in a simulation
    pub fn with_instance_id(instance_id: u64) -> Self {
        Self { instance_id }
    }
}

impl IdentityProvider for RandomIdentity {
    fn instance_id(&self) -> u64 {
        self.instance_id
    }

    fn thread_id(&self) -> u64 {
        current_thread_id()
    }
}
