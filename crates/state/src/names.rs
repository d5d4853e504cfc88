// Path: crates/state/src/names.rs
//! The name registry cache and its reader/writer seams.

use std::sync::Arc;

use arbor_types::{NameEntry, StateError};

use crate::cache::{CacheBackend, SyncOp, TypedCache};

/// Read access to name entries.
pub trait NameReader: Send + Sync {
    /// Loads the entry for `name`, `None` if absent.
    fn get_name(&self, name: &str) -> Result<Option<NameEntry>, StateError>;
}

/// Write access to name entries.
pub trait NameWriter: NameReader {
    /// Inserts or overwrites an entry.
    fn update_name(&self, entry: NameEntry) -> Result<(), StateError>;
    /// Removes an entry.
    fn remove_name(&self, name: &str) -> Result<(), StateError>;
}

struct ReaderBackend(Arc<dyn NameReader>);

impl CacheBackend<String, NameEntry> for ReaderBackend {
    fn load(&self, key: &String) -> Result<Option<NameEntry>, StateError> {
        self.0.get_name(key)
    }
}

/// Write-back cache of name entries over any [`NameReader`].
pub struct NameCache {
    cache: TypedCache<String, NameEntry>,
}

impl NameCache {
    /// A cache reading through to `backend`.
    pub fn new(backend: Arc<dyn NameReader>) -> Self {
        NameCache {
            cache: TypedCache::new(Arc::new(ReaderBackend(backend))),
        }
    }

    /// Flushes dirty entries to `writer` in ascending name order.
    pub fn sync(&self, writer: &dyn NameWriter) -> Result<(), StateError> {
        self.cache.sync(|name, op| match op {
            SyncOp::Update(entry) => writer.update_name(entry.clone()),
            SyncOp::Remove => writer.remove_name(name),
        })
    }

    /// Starts a new generation, optionally over a new backend.
    pub fn reset(&self, backend: Option<Arc<dyn NameReader>>) {
        self.cache
            .reset(backend.map(|b| Arc::new(ReaderBackend(b)) as _));
    }
}

impl NameReader for NameCache {
    fn get_name(&self, name: &str) -> Result<Option<NameEntry>, StateError> {
        self.cache.get(&name.to_string())
    }
}

impl NameWriter for NameCache {
    fn update_name(&self, entry: NameEntry) -> Result<(), StateError> {
        self.cache.update(entry.name.clone(), entry)
    }

    fn remove_name(&self, name: &str) -> Result<(), StateError> {
        self.cache.remove(&name.to_string())
    }
}
