//! Request scoped caches
//!
//! A request is served by exactly one thread, so request state lives in a
//! thread local map keyed by the owning cache manager and the cache name.
//! Clearing a request cache calls [`ScopeBound::unbind`] on every entry,
//! which is what lets values such as lock handles clean up after requests
//! that forgot to.
//!
//! Entries still present when a thread exits are dropped without being
//! unbound; end the request (or drop its [`RequestGuard`](crate::RequestGuard))
//! before the thread finishes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use warden_common::Result;

use crate::scope::CacheScope;

/// A value that must be notified when its request scope is torn down
pub trait ScopeBound: Send + Sync {
    /// Called once when the entry is swept out of a cleared request cache
    fn unbind(&self) -> Result<()>;
}

type Entries = HashMap<String, Arc<dyn ScopeBound>>;

thread_local! {
    // manager id -> cache name -> entries
    static REQUEST_SCOPE: RefCell<HashMap<u64, HashMap<String, Entries>>> =
        RefCell::new(HashMap::new());
}

/// Handle to a named request cache
///
/// The handle itself holds no entries: every operation acts on the request
/// currently being served by the calling thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCache {
    owner: u64,
    name: String,
}

impl RequestCache {
    pub(crate) fn new(owner: u64, name: impl Into<String>) -> Self {
        Self {
            owner,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> CacheScope {
        CacheScope::Request
    }

    /// Store `value` under `key`, replacing (without unbinding) any previous value
    pub fn put(&self, key: impl Into<String>, value: Arc<dyn ScopeBound>) {
        REQUEST_SCOPE.with(|scope| {
            scope
                .borrow_mut()
                .entry(self.owner)
                .or_default()
                .entry(self.name.clone())
                .or_default()
                .insert(key.into(), value);
        });
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn ScopeBound>> {
        self.with_entries(|entries| entries.and_then(|e| e.get(key).cloned()))
    }

    /// Drop `key` from the request without unbinding it
    pub fn remove(&self, key: &str) -> Option<Arc<dyn ScopeBound>> {
        REQUEST_SCOPE.with(|scope| {
            scope
                .borrow_mut()
                .get_mut(&self.owner)
                .and_then(|caches| caches.get_mut(&self.name))
                .and_then(|entries| entries.remove(key))
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.with_entries(|entries| entries.is_some_and(|e| e.contains_key(key)))
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys =
            self.with_entries(|entries| entries.map(|e| e.keys().cloned().collect::<Vec<_>>()))
                .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.with_entries(|entries| entries.map_or(0, |e| e.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry of this cache and unbind each one
    ///
    /// Returns the number of entries swept.
    pub fn clear(&self) -> usize {
        let entries = REQUEST_SCOPE.with(|scope| {
            let mut scope = scope.borrow_mut();
            let caches = scope.get_mut(&self.owner)?;
            let entries = caches.remove(&self.name);
            if caches.is_empty() {
                scope.remove(&self.owner);
            }
            entries
        });

        match entries {
            Some(entries) => unbind_all(&self.name, entries),
            None => 0,
        }
    }

    fn with_entries<R>(&self, f: impl FnOnce(Option<&Entries>) -> R) -> R {
        REQUEST_SCOPE.with(|scope| {
            let scope = scope.borrow();
            f(scope.get(&self.owner).and_then(|caches| caches.get(&self.name)))
        })
    }
}

/// Sweep every request cache owned by `owner` on the calling thread
pub(crate) fn end_request(owner: u64) -> usize {
    let caches = REQUEST_SCOPE.with(|scope| scope.borrow_mut().remove(&owner));

    caches
        .map(|caches| {
            caches
                .into_iter()
                .map(|(name, entries)| unbind_all(&name, entries))
                .sum()
        })
        .unwrap_or(0)
}

// Runs outside of any thread local borrow so unbind callbacks may touch the
// request scope again.
fn unbind_all(cache: &str, entries: Entries) -> usize {
    let count = entries.len();
    for (key, value) in entries {
        if let Err(e) = value.unbind() {
            warn!(cache = %cache, key = %key, error = %e, "Failed to unbind request scoped entry");
        }
    }
    if count > 0 {
        debug!(cache = %cache, count, "Request cache cleared");
    }
    count
}
