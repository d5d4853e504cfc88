// Path: crates/state/src/storage.rs
//! Contract storage: a KVCache overlay keyed by `<address>/<storage key>`
//! over a read-through backend.

use std::sync::Arc;

use arbor_types::keys::storage_key;
use arbor_types::{Address, StateError};

use crate::kvcache::{KVCache, KVWriter};

/// Read access to contract storage cells.
pub trait StorageReader: Send + Sync {
    /// Loads the cell, `None` if never written.
    fn get_storage(&self, address: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, StateError>;
}

/// A copy-on-write storage overlay.
pub struct StorageCache {
    backend: Arc<dyn StorageReader>,
    cache: KVCache,
}

impl StorageCache {
    /// An empty overlay over `backend`.
    pub fn new(backend: Arc<dyn StorageReader>) -> Self {
        StorageCache {
            backend,
            cache: KVCache::new(),
        }
    }

    /// Reads a cell through the overlay.
    pub fn get_storage(&self, address: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let full_key = storage_key(address, key);
        match self.cache.lookup(&full_key) {
            Some(info) if info.deleted => Ok(None),
            Some(info) => Ok(Some(info.value)),
            None => self.backend.get_storage(address, key),
        }
    }

    /// Writes a cell into the overlay. An empty value clears the cell.
    pub fn set_storage(&self, address: &Address, key: &[u8], value: &[u8]) {
        let full_key = storage_key(address, key);
        if value.is_empty() {
            self.cache.delete(&full_key);
        } else {
            self.cache.set(&full_key, value);
        }
    }

    /// Writes a cell by its full `<address>/<storage key>` concatenation.
    /// Used when merging one overlay into another.
    pub fn set_raw(&self, full_key: &[u8], value: &[u8]) {
        self.cache.set(full_key, value);
    }

    /// Tombstones a cell by its full key.
    pub fn delete_raw(&self, full_key: &[u8]) {
        self.cache.delete(full_key);
    }

    /// Flushes every touched cell to `writer`; keys are the full
    /// `<address>/<storage key>` concatenations.
    pub fn write_to<W: KVWriter + ?Sized>(&self, writer: &mut W) {
        self.cache.write_to(writer);
    }

    /// Discards the overlay.
    pub fn reset(&self) {
        self.cache.reset();
    }
}

impl StorageReader for StorageCache {
    fn get_storage(&self, address: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        StorageCache::get_storage(self, address, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;
    impl StorageReader for Empty {
        fn get_storage(&self, _: &Address, _: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
            Ok(None)
        }
    }

    #[test]
    fn overlay_masks_backend() {
        let addr = Address([1; 20]);
        let cache = StorageCache::new(Arc::new(Empty));
        assert_eq!(cache.get_storage(&addr, b"slot").unwrap(), None);
        cache.set_storage(&addr, b"slot", b"value");
        assert_eq!(
            cache.get_storage(&addr, b"slot").unwrap(),
            Some(b"value".to_vec())
        );
        cache.set_storage(&addr, b"slot", b"");
        assert_eq!(cache.get_storage(&addr, b"slot").unwrap(), None);
    }

    #[test]
    fn layered_overlays_read_through() {
        let addr = Address([2; 20]);
        let base = Arc::new(StorageCache::new(Arc::new(Empty)));
        base.set_storage(&addr, b"k", b"base");
        let child = StorageCache::new(base.clone());
        assert_eq!(child.get_storage(&addr, b"k").unwrap(), Some(b"base".to_vec()));
        child.set_storage(&addr, b"k", b"child");
        assert_eq!(child.get_storage(&addr, b"k").unwrap(), Some(b"child".to_vec()));
        // Parent unchanged until merge.
        assert_eq!(base.get_storage(&addr, b"k").unwrap(), Some(b"base".to_vec()));
    }
}
