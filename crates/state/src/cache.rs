// Path: crates/state/src/cache.rs
//! The generic write-back cache behind the account, name and proposal
//! caches.
//!
//! Each entry carries `{value, updated, removed}` behind its own lock so
//! writes to unrelated keys never contend; the cache-wide lock only guards
//! the entry map. `sync` flushes in sorted key order, which is what makes
//! commit hashes reproducible across replicas.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use arbor_types::StateError;

/// Read-through source for cache misses.
pub trait CacheBackend<K, V>: Send + Sync {
    /// Loads the backend value for `key`, `None` if absent.
    fn load(&self, key: &K) -> Result<Option<V>, StateError>;
}

/// One flush operation produced by [`TypedCache::sync`].
pub enum SyncOp<'a, V> {
    /// The entry was updated to this value.
    Update(&'a V),
    /// The entry was removed.
    Remove,
}

#[derive(Debug)]
struct EntryInfo<V> {
    value: Option<V>,
    updated: bool,
    removed: bool,
}

/// A concurrency-safe write-back cache over a read-through backend.
pub struct TypedCache<K, V> {
    backend: RwLock<Arc<dyn CacheBackend<K, V>>>,
    entries: RwLock<HashMap<K, Arc<RwLock<EntryInfo<V>>>>>,
}

impl<K, V> TypedCache<K, V>
where
    K: Eq + Hash + Ord + Clone,
    V: Clone,
{
    /// A cache reading through to `backend`.
    pub fn new(backend: Arc<dyn CacheBackend<K, V>>) -> Self {
        TypedCache {
            backend: RwLock::new(backend),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The cached value under the per-entry read lock; `None` if removed or
    /// absent.
    pub fn get(&self, key: &K) -> Result<Option<V>, StateError> {
        let entry = self.entry(key)?;
        let info = entry.read();
        if info.removed {
            return Ok(None);
        }
        Ok(info.value.clone())
    }

    /// Stores `value` under the per-entry write lock. Fails if the entry was
    /// removed this generation: removal is terminal until `reset`.
    pub fn update(&self, key: K, value: V) -> Result<(), StateError>
    where
        K: std::fmt::Debug,
    {
        let entry = self.entry(&key)?;
        let mut info = entry.write();
        if info.removed {
            return Err(StateError::Removed(format!("update on removed entry {key:?}")));
        }
        info.value = Some(value);
        info.updated = true;
        Ok(())
    }

    /// Marks the entry removed. Fails if already removed.
    pub fn remove(&self, key: &K) -> Result<(), StateError>
    where
        K: std::fmt::Debug,
    {
        let entry = self.entry(key)?;
        let mut info = entry.write();
        if info.removed {
            return Err(StateError::Removed(format!("remove on removed entry {key:?}")));
        }
        info.removed = true;
        info.value = None;
        Ok(())
    }

    /// Applies every dirty entry to `apply` in ascending key order, under
    /// the cache-wide write lock. Does not clear the cache; call `reset`
    /// afterwards to start a new generation.
    pub fn sync<F>(&self, mut apply: F) -> Result<(), StateError>
    where
        F: FnMut(&K, SyncOp<'_, V>) -> Result<(), StateError>,
    {
        let entries = self.entries.write();
        let mut keys: Vec<&K> = entries.keys().collect();
        keys.sort();
        for key in keys {
            let info = entries
                .get(key)
                .ok_or_else(|| StateError::Corrupt("cache key vanished during sync".into()))?
                .read();
            if info.removed {
                apply(key, SyncOp::Remove)?;
            } else if info.updated {
                let value = info
                    .value
                    .as_ref()
                    .ok_or_else(|| StateError::Corrupt("updated entry with no value".into()))?;
                apply(key, SyncOp::Update(value))?;
            }
        }
        Ok(())
    }

    /// Starts a new generation, optionally rebinding the backend.
    pub fn reset(&self, backend: Option<Arc<dyn CacheBackend<K, V>>>) {
        let mut entries = self.entries.write();
        if let Some(backend) = backend {
            *self.backend.write() = backend;
        }
        entries.clear();
    }

    // The entry record for `key`, created from the backend if missing.
    // Double-checked: the fast path holds only the map read lock.
    fn entry(&self, key: &K) -> Result<Arc<RwLock<EntryInfo<V>>>, StateError> {
        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(key) {
                return Ok(entry.clone());
            }
        }
        let backend = self.backend.read().clone();
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(key) {
            return Ok(entry.clone());
        }
        let value = backend.load(key)?;
        let entry = Arc::new(RwLock::new(EntryInfo {
            value,
            updated: false,
            removed: false,
        }));
        entries.insert(key.clone(), entry.clone());
        Ok(entry)
    }
}
