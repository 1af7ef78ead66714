//! Cluster cache sizing and expiry

use std::time::Duration;

/// Default number of entries held per named cluster cache
pub const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// Default entry time-to-live (10 minutes)
pub const DEFAULT_TIME_TO_LIVE_SECS: u64 = 600;

/// Configuration for one named cluster cache
///
/// The time-to-live doubles as the stale lock reclamation policy: an entry
/// left behind by a node that never released it disappears once it expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries before eviction kicks in
    pub max_capacity: u64,
    /// Expiry measured from insertion, `None` keeps entries until evicted
    pub time_to_live: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            time_to_live: Some(Duration::from_secs(DEFAULT_TIME_TO_LIVE_SECS)),
        }
    }
}

impl CacheConfig {
    /// Read `warden.cache.*` settings, falling back to defaults
    ///
    /// A `time-to-live-secs` of 0 disables expiry.
    pub fn from_config(config: &config::Config) -> Self {
        let max_capacity = config
            .get_int("warden.cache.max-capacity")
            .map(|v| v.max(1) as u64)
            .unwrap_or(DEFAULT_MAX_CAPACITY);

        let ttl_secs = config
            .get_int("warden.cache.time-to-live-secs")
            .map(|v| v.max(0) as u64)
            .unwrap_or(DEFAULT_TIME_TO_LIVE_SECS);

        Self {
            max_capacity,
            time_to_live: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        }
    }
}
