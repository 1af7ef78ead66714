//! Lock outcome counters
//!
//! Every outcome is counted twice: in per-coordinator atomics exposed by
//! [`LockCoordinator::stats`](crate::LockCoordinator::stats), and through the
//! `metrics` facade for whatever recorder the host process installs.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use serde::Serialize;

const GRANTED: &str = "warden_lock_granted_total";
const CONTENDED: &str = "warden_lock_contended_total";
const RELEASED: &str = "warden_lock_released_total";
const IGNORED_RELEASES: &str = "warden_lock_ignored_releases_total";
const TIMEOUTS: &str = "warden_lock_timeouts_total";
const SWEPT: &str = "warden_lock_swept_total";
const HOLD_TIME: &str = "warden_lock_hold_seconds";

/// Register metric descriptions, call once at startup
pub fn describe_metrics() {
    describe_counter!(GRANTED, "Acquire calls that returned a lock owned by the caller");
    describe_counter!(CONTENDED, "Acquire calls that found the lock held by someone else");
    describe_counter!(RELEASED, "Locks removed from the lock table by their owner");
    describe_counter!(
        IGNORED_RELEASES,
        "Release calls ignored because the caller was not the owner"
    );
    describe_counter!(TIMEOUTS, "Waits that gave up without the lock");
    describe_counter!(SWEPT, "Request locks visited when a request ended");
    describe_histogram!(HOLD_TIME, "Time between lock creation and release");
}

/// Snapshot of a coordinator's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStats {
    pub granted: u64,
    pub contended: u64,
    pub released: u64,
    pub ignored_releases: u64,
    pub timeouts: u64,
    pub swept: u64,
    /// Average hold time of released locks in milliseconds
    pub avg_hold_time_ms: u64,
}

#[derive(Debug, Default)]
pub(crate) struct LockStatsCollector {
    granted: AtomicU64,
    contended: AtomicU64,
    released: AtomicU64,
    ignored_releases: AtomicU64,
    timeouts: AtomicU64,
    swept: AtomicU64,
    total_hold_time_ms: AtomicU64,
}

impl LockStatsCollector {
    pub fn record_granted(&self) {
        self.granted.fetch_add(1, Ordering::Relaxed);
        counter!(GRANTED).increment(1);
    }

    pub fn record_contended(&self) {
        self.contended.fetch_add(1, Ordering::Relaxed);
        counter!(CONTENDED).increment(1);
    }

    pub fn record_released(&self, held_ms: u64) {
        self.released.fetch_add(1, Ordering::Relaxed);
        self.total_hold_time_ms.fetch_add(held_ms, Ordering::Relaxed);
        counter!(RELEASED).increment(1);
        histogram!(HOLD_TIME).record(held_ms as f64 / 1000.0);
    }

    pub fn record_ignored_release(&self) {
        self.ignored_releases.fetch_add(1, Ordering::Relaxed);
        counter!(IGNORED_RELEASES).increment(1);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        counter!(TIMEOUTS).increment(1);
    }

    pub fn record_swept(&self, count: usize) {
        if count == 0 {
            return;
        }
        self.swept.fetch_add(count as u64, Ordering::Relaxed);
        counter!(SWEPT).increment(count as u64);
    }

    pub fn snapshot(&self) -> LockStats {
        let released = self.released.load(Ordering::Relaxed);
        let total_hold = self.total_hold_time_ms.load(Ordering::Relaxed);

        LockStats {
            granted: self.granted.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            released,
            ignored_releases: self.ignored_releases.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
            avg_hold_time_ms: if released > 0 { total_hold / released } else { 0 },
        }
    }
}
