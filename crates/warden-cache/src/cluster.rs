//! Cluster replicated cache backend
//!
//! Every node that holds the same `Arc<ClusterBackend>` observes the same
//! entries, which is how several nodes are simulated inside one process.
//! Values are stored as bytes so that each read produces a fresh decode, the
//! same way a replicating cache hands back a new object per lookup.

use std::sync::Arc;

use dashmap::DashMap;
use moka::sync::Cache as MokaCache;
use tracing::debug;
use warden_common::Result;

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::scope::CacheScope;

/// Registry of named cluster caches
pub struct ClusterBackend {
    caches: DashMap<String, ClusterCache>,
    default_config: CacheConfig,
    overrides: DashMap<String, CacheConfig>,
}

impl Default for ClusterBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterBackend {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a backend whose caches use `config` unless overridden by name
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            caches: DashMap::new(),
            default_config: config,
            overrides: DashMap::new(),
        }
    }

    /// Set the configuration used for the cache called `name`
    ///
    /// Only affects a cache that has not been created yet.
    pub fn configure(&self, name: impl Into<String>, config: CacheConfig) {
        let name = name.into();
        if self.caches.contains_key(&name) {
            debug!(cache = %name, "Cache already created, configuration ignored");
            return;
        }
        self.overrides.insert(name, config);
    }

    /// Get or create the cache called `name`
    pub fn cache(&self, name: &str) -> ClusterCache {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = self
                    .overrides
                    .get(name)
                    .map(|c| c.clone())
                    .unwrap_or_else(|| self.default_config.clone());
                debug!(
                    cache = %name,
                    max_capacity = config.max_capacity,
                    ttl = ?config.time_to_live,
                    "Creating cluster cache"
                );
                ClusterCache::new(name, &config)
            })
            .clone()
    }

    /// Names of every cache created so far
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

/// One named cache inside a [`ClusterBackend`]
#[derive(Clone)]
pub struct ClusterCache {
    name: Arc<str>,
    entries: MokaCache<String, Arc<[u8]>>,
}

impl ClusterCache {
    fn new(name: &str, config: &CacheConfig) -> Self {
        let mut builder = MokaCache::builder().max_capacity(config.max_capacity);
        if let Some(ttl) = config.time_to_live {
            builder = builder.time_to_live(ttl);
        }
        Self {
            name: Arc::from(name),
            entries: builder.build(),
        }
    }
}

impl std::fmt::Debug for ClusterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterCache")
            .field("name", &self.name)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl Cache for ClusterCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> CacheScope {
        CacheScope::ClusterReplicated
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|bytes| bytes.to_vec()))
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key.to_string(), Arc::from(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.invalidate(key);
        Ok(())
    }

    fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.entries.contains_key(key))
    }

    fn clear(&self) -> Result<()> {
        self.entries.invalidate_all();
        Ok(())
    }

    fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}
