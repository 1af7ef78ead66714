//! Lock table entry

use serde::{Deserialize, Serialize};
use warden_common::current_timestamp;

/// Ownership record stored in the cluster lock table under its resource id
///
/// Entries are never mutated once written; a new acquisition writes a new
/// entry. Because the cluster cache decodes a fresh value on every read,
/// ownership is always decided from the two owner ids, never from identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    resource_id: String,
    /// Random per acquisition, kept for diagnostics only
    token: u64,
    owner_instance_id: u64,
    owner_thread_id: u64,
    locked: bool,
    /// Unix millis at creation
    #[serde(default)]
    acquired_at: i64,
}

impl LockEntry {
    /// A locked entry owned by the given instance and thread
    pub fn new(
        resource_id: impl Into<String>,
        token: u64,
        owner_instance_id: u64,
        owner_thread_id: u64,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            token,
            owner_instance_id,
            owner_thread_id,
            locked: true,
            acquired_at: current_timestamp(),
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn owner_instance_id(&self) -> u64 {
        self.owner_instance_id
    }

    pub fn owner_thread_id(&self) -> u64 {
        self.owner_thread_id
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn acquired_at(&self) -> i64 {
        self.acquired_at
    }

    /// Whether both owner ids match
    pub fn is_owned_by(&self, instance_id: u64, thread_id: u64) -> bool {
        self.owner_instance_id == instance_id && self.owner_thread_id == thread_id
    }

    /// Milliseconds since the entry was created, 0 when unknown
    pub fn age_ms(&self) -> u64 {
        if self.acquired_at <= 0 {
            return 0;
        }
        current_timestamp().saturating_sub(self.acquired_at).max(0) as u64
    }
}
