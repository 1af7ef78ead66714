//! Contention soak run
//!
//! Spins up several simulated nodes over one shared cluster backend and lets
//! their workers fight over a small set of resources. Each worker wraps every
//! round trip in its own request, the way a request handler would. Overlaps
//! count grants made while another worker already held the same resource;
//! they can only come from the unsynchronized check-then-create between
//! nodes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use rand::Rng;
use tracing::{debug, info};
use warden_cache::{ClusterBackend, MemoryCacheManager, RequestGuard};
use warden_common::WardenError;
use warden_lock::{LockConfig, LockCoordinator, LockStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoakConfig {
    pub nodes: u32,
    pub workers: u32,
    pub resources: u32,
    pub iterations: u32,
    /// Time each grant is held before release
    pub hold: Duration,
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            nodes: 2,
            workers: 4,
            resources: 8,
            iterations: 50,
            hold: Duration::from_millis(5),
        }
    }
}

/// Outcome of a soak run
#[derive(Debug, Clone)]
pub struct SoakReport {
    pub grants: u64,
    pub timeouts: u64,
    pub overlaps: u64,
    pub elapsed: Duration,
    /// Per node instance id and coordinator counters
    pub nodes: Vec<(u64, LockStats)>,
}

impl SoakReport {
    pub fn attempts(&self) -> u64 {
        self.grants + self.timeouts
    }
}

impl fmt::Display for SoakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "soak finished in {:.2?}: {} grants, {} timeouts, {} overlaps",
            self.elapsed, self.grants, self.timeouts, self.overlaps
        )?;
        for (instance_id, stats) in &self.nodes {
            writeln!(
                f,
                "  node {instance_id:016x}: granted={} contended={} released={} ignored={} swept={} avg_hold={}ms",
                stats.granted,
                stats.contended,
                stats.released,
                stats.ignored_releases,
                stats.swept,
                stats.avg_hold_time_ms
            )?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Tally {
    grants: AtomicU64,
    timeouts: AtomicU64,
    overlaps: AtomicU64,
}

/// Run the soak and collect its report
///
/// Timeouts are counted, not fatal. Any other lock error aborts the run.
pub fn run(
    backend: Arc<ClusterBackend>,
    lock_config: &LockConfig,
    soak: &SoakConfig,
) -> anyhow::Result<SoakReport> {
    let nodes: Vec<(Arc<MemoryCacheManager>, LockCoordinator)> = (0..soak.nodes.max(1))
        .map(|_| {
            let manager = Arc::new(MemoryCacheManager::with_backend(backend.clone()));
            let coordinator = LockCoordinator::with_config(manager.clone(), lock_config.clone());
            (manager, coordinator)
        })
        .collect();
    let holders: Vec<AtomicU32> = (0..soak.resources.max(1)).map(|_| AtomicU32::new(0)).collect();
    let tally = Tally::default();

    info!(
        nodes = nodes.len(),
        workers = soak.workers,
        resources = holders.len(),
        iterations = soak.iterations,
        "Starting soak run"
    );
    let started = Instant::now();

    std::thread::scope(|scope| {
        let workers: Vec<_> = nodes
            .iter()
            .flat_map(|node| (0..soak.workers.max(1)).map(move |_| node))
            .map(|(manager, coordinator)| {
                let (holders, tally) = (&holders, &tally);
                scope.spawn(move || worker(manager, coordinator, holders, tally, soak))
            })
            .collect();

        workers.into_iter().try_for_each(|handle| {
            handle
                .join()
                .map_err(|_| anyhow!("Soak worker panicked"))?
                .map_err(anyhow::Error::from)
        })
    })?;

    let report = SoakReport {
        grants: tally.grants.load(Ordering::Relaxed),
        timeouts: tally.timeouts.load(Ordering::Relaxed),
        overlaps: tally.overlaps.load(Ordering::Relaxed),
        elapsed: started.elapsed(),
        nodes: nodes
            .iter()
            .map(|(_, coordinator)| (coordinator.instance_id(), coordinator.stats()))
            .collect(),
    };
    info!(
        grants = report.grants,
        timeouts = report.timeouts,
        overlaps = report.overlaps,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Soak run finished"
    );
    Ok(report)
}

fn worker(
    manager: &Arc<MemoryCacheManager>,
    coordinator: &LockCoordinator,
    holders: &[AtomicU32],
    tally: &Tally,
    soak: &SoakConfig,
) -> Result<(), WardenError> {
    let mut rng = rand::rng();

    for _ in 0..soak.iterations {
        let slot = rng.random_range(0..holders.len());
        let resource_id = format!("soak/{slot}");
        let _request = RequestGuard::new(manager.clone());

        match coordinator.wait_for(&resource_id) {
            Ok(handle) => {
                tally.grants.fetch_add(1, Ordering::Relaxed);
                if holders[slot].fetch_add(1, Ordering::SeqCst) > 0 {
                    tally.overlaps.fetch_add(1, Ordering::Relaxed);
                    debug!(resource_id = %resource_id, "Overlapping grant");
                }
                std::thread::sleep(soak.hold);
                holders[slot].fetch_sub(1, Ordering::SeqCst);
                coordinator.release(&handle)?;
            }
            Err(e) if e.is_lock_timeout() => {
                tally.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
