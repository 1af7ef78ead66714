//! Lock coordinator configuration

use std::time::Duration;

use warden_common::{LOCK_MAP_CACHE, REQUEST_LOCKS_CACHE};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 300;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;
pub const DEFAULT_BACKOFF_STEP_MS: u64 = 10;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 500;

/// Retry schedule used while waiting for a contended lock
///
/// The pause after the n-th failed attempt is
/// `min(initial_backoff + (n - 1) * backoff_step, max_backoff)`, so the
/// default schedule pauses 100, 110, 120 ms and so on. There is no pause after
/// the last attempt. The first pause is the bare `initial_backoff`, not
/// `initial_backoff + backoff_step` (100 ms rather than 110 ms by default).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_step: Duration,
    pub max_backoff: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            backoff_step: Duration::from_millis(DEFAULT_BACKOFF_STEP_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl WaitPolicy {
    /// Pause after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let growth = self.backoff_step.saturating_mul(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_add(growth)
            .min(self.max_backoff)
    }

    /// Total time spent sleeping before a wait gives up
    pub fn total_budget(&self) -> Duration {
        (1..self.max_attempts).fold(Duration::ZERO, |total, attempt| {
            total.saturating_add(self.backoff(attempt))
        })
    }
}

/// Settings for a [`LockCoordinator`](crate::LockCoordinator)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    pub wait: WaitPolicy,
    /// Cluster replicated cache holding the lock table
    pub lock_map: String,
    /// Request cache tracking the locks created by the current request
    pub request_map: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            lock_map: LOCK_MAP_CACHE.to_string(),
            request_map: REQUEST_LOCKS_CACHE.to_string(),
        }
    }
}

impl LockConfig {
    /// Read `warden.lock.*` settings, falling back to defaults
    pub fn from_config(config: &config::Config) -> Self {
        let millis = |key: &str, default: u64| {
            config
                .get_int(key)
                .map(|v| Duration::from_millis(v.max(0) as u64))
                .unwrap_or(Duration::from_millis(default))
        };

        let wait = WaitPolicy {
            max_attempts: config
                .get_int("warden.lock.wait.max-attempts")
                .map(|v| v.clamp(1, u32::MAX as i64) as u32)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            initial_backoff: millis(
                "warden.lock.wait.initial-backoff-ms",
                DEFAULT_INITIAL_BACKOFF_MS,
            ),
            backoff_step: millis("warden.lock.wait.backoff-step-ms", DEFAULT_BACKOFF_STEP_MS),
            max_backoff: millis("warden.lock.wait.max-backoff-ms", DEFAULT_MAX_BACKOFF_MS),
        };

        Self {
            wait,
            lock_map: config
                .get_string("warden.lock.cache.lock-map")
                .unwrap_or_else(|_| LOCK_MAP_CACHE.to_string()),
            request_map: config
                .get_string("warden.lock.cache.request-map")
                .unwrap_or_else(|_| REQUEST_LOCKS_CACHE.to_string()),
        }
    }

    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }
}
