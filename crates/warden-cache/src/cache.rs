//! Byte level cache contract and a typed serde view over it

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use warden_common::Result;

use crate::scope::CacheScope;

/// A named key-value store holding serialized values
///
/// Implementations may hand back a freshly decoded copy on every read, so
/// callers must never rely on the identity of what they get back.
pub trait Cache: Send + Sync {
    /// Name the cache was registered under
    fn name(&self) -> &str;

    /// Lifecycle of the entries held by this cache
    fn scope(&self) -> CacheScope;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn contains_key(&self, key: &str) -> Result<bool>;

    fn clear(&self) -> Result<()>;

    /// Approximate number of live entries
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed access to a [`Cache`], encoding values as JSON
pub struct TypedCache<T> {
    inner: Arc<dyn Cache>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for TypedCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCache")
            .field("name", &self.inner.name())
            .field("scope", &self.inner.scope())
            .finish()
    }
}

impl<T> TypedCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(inner: Arc<dyn Cache>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Read and decode the value stored under `key`
    pub fn get(&self, key: &str) -> Result<Option<T>> {
        match self.inner.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.inner.put(key, bytes)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> Result<bool> {
        self.inner.contains_key(key)
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use warden_common::WardenError;

    use super::*;
    use crate::cluster::ClusterBackend;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        path: String,
        count: u32,
    }

    fn typed(name: &str) -> TypedCache<Sample> {
        let backend = ClusterBackend::new();
        TypedCache::new(Arc::new(backend.cache(name)))
    }

    #[test]
    fn test_typed_put_get_remove() {
        let cache = typed("samples");
        let sample = Sample {
            path: "/a/b".to_string(),
            count: 2,
        };

        assert_eq!(cache.get("k").unwrap(), None);
        cache.put("k", &sample).unwrap();
        assert!(cache.contains_key("k").unwrap());
        assert_eq!(cache.get("k").unwrap(), Some(sample));

        cache.remove("k").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
        assert!(!cache.contains_key("k").unwrap());
    }

    #[test]
    fn test_corrupt_value_surfaces_as_serialization_error() {
        let backend = ClusterBackend::new();
        let raw = backend.cache("samples");
        raw.put("k", b"{not json".to_vec()).unwrap();

        let cache: TypedCache<Sample> = TypedCache::new(Arc::new(raw));
        assert!(matches!(
            cache.get("k"),
            Err(WardenError::Serialization(_))
        ));
    }
}
