// Integration tests for LockCoordinator
// Simulates cluster nodes as coordinators sharing one in-process backend

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use warden_cache::{
    Cache, CacheConfig, CacheManagerService, ClusterBackend, MemoryCacheManager, RequestGuard,
};
use warden_common::WardenError;
use warden_lock::{LockConfig, LockCoordinator, RandomIdentity, WaitPolicy};

fn node_with(
    backend: &Arc<ClusterBackend>,
    instance_id: u64,
    config: LockConfig,
) -> (Arc<MemoryCacheManager>, LockCoordinator) {
    let manager = Arc::new(MemoryCacheManager::with_backend(backend.clone()));
    let coordinator = LockCoordinator::with_identity(
        manager.clone(),
        Arc::new(RandomIdentity::with_instance_id(instance_id)),
        config,
    );
    (manager, coordinator)
}

fn node(backend: &Arc<ClusterBackend>, instance_id: u64) -> LockCoordinator {
    node_with(backend, instance_id, LockConfig::default()).1
}

fn fast_wait(max_attempts: u32) -> LockConfig {
    LockConfig::default().with_wait(WaitPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        backoff_step: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    })
}

#[test]
fn test_contended_lock_between_nodes() {
    let backend = Arc::new(ClusterBackend::new());
    let node1 = node(&backend, 1);
    let node2 = node(&backend, 2);

    let held = node1.acquire("doc/42").unwrap();
    assert!(held.is_owner());

    // Second node sees the first node's lock
    let seen = node2.acquire("doc/42").unwrap();
    assert!(!seen.is_owner());
    assert_eq!(seen.entry().owner_instance_id(), 1);
    assert_eq!(seen.entry().token(), held.entry().token());

    assert!(node1.release(&held).unwrap());

    let taken = node2.acquire("doc/42").unwrap();
    assert!(taken.is_owner());
    assert_eq!(taken.entry().owner_instance_id(), 2);

    assert_eq!(node2.stats().contended, 1);
    assert_eq!(node2.stats().granted, 1);
    node2.clear_all();
}

#[test]
fn test_wait_for_times_out() {
    let backend = Arc::new(ClusterBackend::new());
    let node1 = node(&backend, 1);
    let config = LockConfig::default().with_wait(WaitPolicy {
        max_attempts: 3,
        ..WaitPolicy::default()
    });
    let (_, node2) = node_with(&backend, 2, config);

    node1.acquire("doc/99").unwrap();

    let started = Instant::now();
    let err = node2.wait_for("doc/99").unwrap_err();

    assert!(started.elapsed() >= Duration::from_millis(210));
    match err {
        WardenError::LockTimeout {
            resource_id,
            attempts,
        } => {
            assert_eq!(resource_id, "doc/99");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }

    let stats = node2.stats();
    assert_eq!(stats.contended, 3);
    assert_eq!(stats.timeouts, 1);

    // Lock untouched by the failed wait
    assert!(node1.get_lock("doc/99", false).unwrap().unwrap().is_owner());
    node1.clear_all();
}

#[test]
fn test_wait_for_succeeds_once_holder_releases() {
    let backend = Arc::new(ClusterBackend::new());
    let node1 = node(&backend, 1);
    let node2 = node(&backend, 2);
    let (locked_tx, locked_rx) = mpsc::channel();

    let holder = std::thread::spawn(move || {
        let handle = node1.acquire("doc/7").unwrap();
        locked_tx.send(()).unwrap();
        std::thread::sleep(Duration::from_millis(150));
        node1.release(&handle).unwrap()
    });

    locked_rx.recv().unwrap();
    let handle = node2.wait_for("doc/7").unwrap();

    assert!(handle.is_owner());
    assert!(holder.join().unwrap());
    assert!(node2.stats().contended >= 1);
    node2.clear_all();
}

#[test]
fn test_request_end_releases_forgotten_locks() {
    let backend = Arc::new(ClusterBackend::new());
    let (manager, node1) = node_with(&backend, 1, LockConfig::default());
    let node2 = node(&backend, 2);

    {
        let _request = RequestGuard::new(manager.clone());
        for id in ["doc/1", "doc/2", "doc/3"] {
            assert!(node1.acquire(id).unwrap().is_owner());
        }
        assert!(!node2.acquire("doc/2").unwrap().is_owner());
    }

    for id in ["doc/1", "doc/2", "doc/3"] {
        assert!(node2.acquire(id).unwrap().is_owner());
    }
    assert_eq!(node1.stats().released, 3);
    node2.clear_all();
}

#[test]
fn test_clear_all_after_explicit_release() {
    let backend = Arc::new(ClusterBackend::new());
    let node1 = node(&backend, 1);

    let first = node1.acquire("doc/1").unwrap();
    node1.acquire("doc/2").unwrap();
    assert!(node1.release(&first).unwrap());

    assert_eq!(node1.clear_all(), 1);
    assert!(node1.get_lock("doc/2", false).unwrap().is_none());
    assert_eq!(node1.clear_all(), 0);
}

#[test]
fn test_non_owner_release_is_ignored() {
    let backend = Arc::new(ClusterBackend::new());
    let node1 = node(&backend, 1);
    let node2 = node(&backend, 2);

    let held = node1.acquire("doc/42").unwrap();
    let seen = node2.acquire("doc/42").unwrap();

    assert!(!node2.release(&seen).unwrap());
    assert!(!seen.release().unwrap());

    let current = node1.get_lock("doc/42", false).unwrap().unwrap();
    assert_eq!(current.entry(), held.entry());
    assert_eq!(node2.stats().ignored_releases, 2);
    node1.clear_all();
}

#[test]
fn test_double_release() {
    let backend = Arc::new(ClusterBackend::new());
    let node1 = node(&backend, 1);

    let held = node1.acquire("doc/1").unwrap();
    assert!(node1.release(&held).unwrap());
    assert!(!node1.release(&held).unwrap());
}

#[test]
fn test_get_lock_without_create() {
    let backend = Arc::new(ClusterBackend::new());
    let node1 = node(&backend, 1);
    let node2 = node(&backend, 2);

    assert!(node1.get_lock("doc/5", false).unwrap().is_none());

    node1.acquire("doc/5").unwrap();
    let seen = node2.get_lock("doc/5", false).unwrap().unwrap();
    assert!(!seen.is_owner());
    assert!(seen.is_locked());

    // Read only lookups do not count as contention
    assert_eq!(node2.stats().contended, 0);
    node1.clear_all();
}

#[test]
fn test_reads_decode_fresh_entries() {
    let backend = Arc::new(ClusterBackend::new());
    let node1 = node(&backend, 1);
    node1.acquire("doc/8").unwrap();

    let first = node1.get_lock("doc/8", false).unwrap().unwrap();
    let second = node1.get_lock("doc/8", false).unwrap().unwrap();
    assert!(!std::ptr::eq(first.entry(), second.entry()));
    assert_eq!(first.entry(), second.entry());
    assert!(first.is_owner() && second.is_owner());
    node1.clear_all();
}

#[test]
fn test_threads_of_one_node_are_exclusive() {
    let backend = Arc::new(ClusterBackend::new());
    let (_, coordinator) = node_with(&backend, 1, fast_wait(10_000));
    let inside = Arc::new(AtomicBool::new(false));
    let entered = Arc::new(AtomicU32::new(0));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = coordinator.clone();
            let inside = inside.clone();
            let entered = entered.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    coordinator
                        .with_lock("counter", |_| {
                            assert!(!inside.swap(true, Ordering::SeqCst));
                            entered.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(1));
                            inside.store(false, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(entered.load(Ordering::SeqCst), 80);
    let stats = coordinator.stats();
    assert_eq!(stats.granted, 80);
    assert_eq!(stats.released, 80);
    assert!(coordinator.get_lock("counter", false).unwrap().is_none());
}

#[test]
fn test_expired_lock_is_reclaimed() {
    let backend = Arc::new(ClusterBackend::new());
    backend.configure(
        warden_common::LOCK_MAP_CACHE,
        CacheConfig {
            max_capacity: 100,
            time_to_live: Some(Duration::from_millis(50)),
        },
    );
    let node1 = node(&backend, 1);
    let node2 = node(&backend, 2);

    // node1 never releases, as if it crashed
    node1.acquire("doc/3").unwrap();
    assert!(!node2.acquire("doc/3").unwrap().is_owner());

    std::thread::sleep(Duration::from_millis(120));
    let taken = node2.acquire("doc/3").unwrap();
    assert!(taken.is_owner());

    // Sweeping node1's request leaves node2's lock alone
    assert_eq!(node1.clear_all(), 1);
    assert!(taken.refresh().unwrap().is_some_and(|h| h.is_owner()));
    assert_eq!(node1.stats().ignored_releases, 1);
    node2.clear_all();
}

#[test]
fn test_custom_cache_names() {
    let backend = Arc::new(ClusterBackend::new());
    let config = LockConfig {
        lock_map: "tenant-a.locks".to_string(),
        request_map: "tenant-a.requests".to_string(),
        ..LockConfig::default()
    };
    let (manager, tenant_a) = node_with(&backend, 1, config);
    let other = node(&backend, 2);

    tenant_a.acquire("doc/1").unwrap();
    assert!(other.acquire("doc/1").unwrap().is_owner());
    assert!(manager.request_cache("tenant-a.requests").contains_key("doc/1"));
    assert!(backend.cache_names().contains(&"tenant-a.locks".to_string()));

    tenant_a.clear_all();
    other.clear_all();
}

#[test]
fn test_corrupt_entry_surfaces_serialization_error() {
    let backend = Arc::new(ClusterBackend::new());
    let (_, coordinator) = node_with(&backend, 1, fast_wait(50));
    backend
        .cache(warden_common::LOCK_MAP_CACHE)
        .put("doc/1", b"not json".to_vec())
        .unwrap();

    assert!(matches!(
        coordinator.acquire("doc/1"),
        Err(WardenError::Serialization(_))
    ));
    assert!(matches!(
        coordinator.get_lock("doc/1", false),
        Err(WardenError::Serialization(_))
    ));
    assert!(matches!(
        coordinator.get_lock("doc/1", true),
        Err(WardenError::Serialization(_))
    ));
    // Not treated as contention, so no retries
    assert!(matches!(
        coordinator.wait_for("doc/1"),
        Err(WardenError::Serialization(_))
    ));

    let stats = coordinator.stats();
    assert_eq!(stats.granted, 0);
    assert_eq!(stats.contended, 0);
    assert_eq!(stats.timeouts, 0);
}

#[test]
fn test_sweep_continues_past_failed_release() {
    let backend = Arc::new(ClusterBackend::new());
    let coordinator = node(&backend, 1);
    coordinator.acquire("doc/1").unwrap();
    coordinator.acquire("doc/2").unwrap();

    backend
        .cache(warden_common::LOCK_MAP_CACHE)
        .put("doc/1", b"not json".to_vec())
        .unwrap();

    assert_eq!(coordinator.clear_all(), 2);
    assert!(coordinator.get_lock("doc/2", false).unwrap().is_none());

    let stats = coordinator.stats();
    assert_eq!(stats.released, 1);
    assert_eq!(stats.swept, 2);
}
