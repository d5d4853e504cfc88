// Path: crates/state/src/kvcache.rs
//! An in-memory copy-on-write overlay over opaque byte keys.
//!
//! Deleted keys are kept as tombstones so that a flush can propagate the
//! deletion to the backing store. A sidecar key index avoids rebuilding the
//! sort on every iteration; it is sorted lazily when an iterator is created
//! and stays sorted until the next first-touch of a key.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Value plus tombstone flag for one cached key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueInfo {
    /// The cached value; cleared when the key is tombstoned.
    pub value: Vec<u8>,
    /// Whether the key is deleted in this overlay.
    pub deleted: bool,
}

/// A flush target for [`KVCache::write_to`].
///
/// The flush order is unspecified; the writer must be commutative over
/// distinct keys (or the caller must sort, as the typed caches do).
pub trait KVWriter {
    /// Inserts or overwrites a key.
    fn set(&mut self, key: &[u8], value: &[u8]);
    /// Deletes a key.
    fn delete(&mut self, key: &[u8]);
}

#[derive(Default)]
struct Inner {
    cache: HashMap<Vec<u8>, ValueInfo>,
    // Every key ever touched this generation; sorted lazily at iteration.
    keys: Vec<Vec<u8>>,
    keys_sorted: bool,
}

/// The overlay cache. Multiple concurrent readers, exclusive writer.
#[derive(Default)]
pub struct KVCache {
    inner: RwLock<Inner>,
}

/// Coerces an optional domain to concrete bounds: `None` low becomes the
/// empty key, `None` high stays open-ended.
pub fn normalise_domain(
    low: Option<&[u8]>,
    high: Option<&[u8]>,
) -> (Vec<u8>, Option<Vec<u8>>) {
    (
        low.map(|l| l.to_vec()).unwrap_or_default(),
        high.map(|h| h.to_vec()),
    )
}

fn in_domain(key: &[u8], low: &[u8], high: Option<&Vec<u8>>) -> bool {
    key >= low && high.map_or(true, |h| key < h.as_slice())
}

impl KVCache {
    /// An empty overlay.
    pub fn new() -> Self {
        KVCache::default()
    }

    /// The raw `(value, deleted)` pair; a default pair means the key was
    /// never touched.
    pub fn info(&self, key: &[u8]) -> ValueInfo {
        self.inner.read().cache.get(key).cloned().unwrap_or_default()
    }

    /// The raw pair only if the key was touched this generation. Unlike
    /// `info`, distinguishes an untouched key from one set to empty.
    pub fn lookup(&self, key: &[u8]) -> Option<ValueInfo> {
        self.inner.read().cache.get(key).cloned()
    }

    /// The cached value; `None` for absent or tombstoned keys.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let inner = self.inner.read();
        match inner.cache.get(key) {
            Some(vi) if !vi.deleted => Some(vi.value.clone()),
            _ => None,
        }
    }

    /// Whether the key is present and not tombstoned.
    pub fn has(&self, key: &[u8]) -> bool {
        let inner = self.inner.read();
        inner.cache.get(key).is_some_and(|vi| !vi.deleted)
    }

    /// Inserts or overwrites, clearing any tombstone.
    pub fn set(&self, key: &[u8], value: &[u8]) {
        let mut inner = self.inner.write();
        if !inner.cache.contains_key(key) {
            // First touch of this key this generation.
            inner.keys.push(key.to_vec());
            inner.keys_sorted = false;
        }
        inner.cache.insert(
            key.to_vec(),
            ValueInfo {
                value: value.to_vec(),
                deleted: false,
            },
        );
    }

    /// Marks a tombstone; the cached value is cleared.
    pub fn delete(&self, key: &[u8]) {
        let mut inner = self.inner.write();
        if !inner.cache.contains_key(key) {
            inner.keys.push(key.to_vec());
            inner.keys_sorted = false;
        }
        inner.cache.insert(
            key.to_vec(),
            ValueInfo {
                value: Vec::new(),
                deleted: true,
            },
        );
    }

    /// Ascending iterator over the half-open domain `[low, high)`.
    /// Tombstoned entries are yielded; consumers must filter.
    pub fn iterator(&self, low: Option<&[u8]>, high: Option<&[u8]>) -> KVCacheIterator {
        self.make_iterator(low, high, false)
    }

    /// Descending iterator over `[low, high)`.
    pub fn reverse_iterator(&self, low: Option<&[u8]>, high: Option<&[u8]>) -> KVCacheIterator {
        self.make_iterator(low, high, true)
    }

    fn make_iterator(&self, low: Option<&[u8]>, high: Option<&[u8]>, reverse: bool) -> KVCacheIterator {
        let (low, high) = normalise_domain(low, high);
        let mut inner = self.inner.write();
        if !inner.keys_sorted {
            inner.keys.sort_unstable();
            inner.keys_sorted = true;
        }
        let entries: Vec<(Vec<u8>, ValueInfo)> = inner
            .keys
            .iter()
            .filter(|k| in_domain(k.as_slice(), &low, high.as_ref()))
            .map(|k| {
                let vi = inner.cache.get(k).cloned().unwrap_or_default();
                (k.clone(), vi)
            })
            .collect();
        KVCacheIterator {
            entries,
            index: 0,
            reverse,
        }
    }

    /// Flushes every live entry and tombstone to `writer` without clearing
    /// the cache. Order of flush is unspecified.
    pub fn write_to<W: KVWriter + ?Sized>(&self, writer: &mut W) {
        let inner = self.inner.read();
        for (key, vi) in &inner.cache {
            if vi.deleted {
                writer.delete(key);
            } else {
                writer.set(key, &vi.value);
            }
        }
    }

    /// Discards all entries.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.cache = HashMap::new();
        inner.keys = Vec::new();
        inner.keys_sorted = true;
    }

    /// Number of touched keys, tombstones included.
    pub fn len(&self) -> usize {
        self.inner.read().cache.len()
    }

    /// Whether no key has been touched.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owning iterator over a domain snapshot of the cache.
pub struct KVCacheIterator {
    entries: Vec<(Vec<u8>, ValueInfo)>,
    index: usize,
    reverse: bool,
}

impl Iterator for KVCacheIterator {
    type Item = (Vec<u8>, ValueInfo);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.entries.len() {
            return None;
        }
        let slot = if self.reverse {
            self.entries.len() - 1 - self.index
        } else {
            self.index
        };
        self.index += 1;
        Some(self.entries[slot].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_of(iter: KVCacheIterator) -> Vec<Vec<u8>> {
        iter.map(|(k, _)| k).collect()
    }

    #[test]
    fn last_write_wins() {
        let cache = KVCache::new();
        cache.set(b"k", b"v1");
        cache.delete(b"k");
        cache.set(b"k", b"v2");
        assert_eq!(cache.get(b"k"), Some(b"v2".to_vec()));
        assert!(cache.has(b"k"));

        cache.delete(b"k");
        assert_eq!(cache.get(b"k"), None);
        assert!(!cache.has(b"k"));
        assert!(cache.info(b"k").deleted);
    }

    #[test]
    fn iteration_is_sorted_and_complete() {
        let cache = KVCache::new();
        for key in [b"c".to_vec(), b"a".to_vec(), b"e".to_vec(), b"b".to_vec()] {
            cache.set(&key, b"v");
        }
        assert_eq!(
            keys_of(cache.iterator(None, None)),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"e".to_vec()]
        );
        assert_eq!(
            keys_of(cache.iterator(Some(b"b"), Some(b"e"))),
            vec![b"b".to_vec(), b"c".to_vec()]
        );
        assert_eq!(
            keys_of(cache.reverse_iterator(None, None)),
            vec![b"e".to_vec(), b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]
        );
    }

    #[test]
    fn iterator_includes_tombstones() {
        let cache = KVCache::new();
        cache.set(b"a", b"v");
        cache.delete(b"b");
        let entries: Vec<_> = cache.iterator(None, None).collect();
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].1.deleted);
        assert!(entries[1].1.deleted);
    }

    #[test]
    fn write_to_propagates_tombstones() {
        struct Recorder {
            sets: Vec<Vec<u8>>,
            deletes: Vec<Vec<u8>>,
        }
        impl KVWriter for Recorder {
            fn set(&mut self, key: &[u8], _value: &[u8]) {
                self.sets.push(key.to_vec());
            }
            fn delete(&mut self, key: &[u8]) {
                self.deletes.push(key.to_vec());
            }
        }

        let cache = KVCache::new();
        cache.set(b"keep", b"v");
        cache.delete(b"drop");
        let mut rec = Recorder {
            sets: vec![],
            deletes: vec![],
        };
        cache.write_to(&mut rec);
        assert_eq!(rec.sets, vec![b"keep".to_vec()]);
        assert_eq!(rec.deletes, vec![b"drop".to_vec()]);
    }

    #[test]
    fn reset_discards_everything() {
        let cache = KVCache::new();
        cache.set(b"a", b"v");
        cache.reset();
        assert!(cache.is_empty());
        assert_eq!(cache.get(b"a"), None);
        assert_eq!(keys_of(cache.iterator(None, None)), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn interleaved_ops_end_state_only() {
        // Property 1: the final operation alone dictates the observation.
        let cache = KVCache::new();
        let ops: [(&[u8], bool); 6] = [
            (b"k1", true),
            (b"k1", false),
            (b"k2", false),
            (b"k1", true),
            (b"k2", true),
            (b"k2", false),
        ];
        for (key, is_set) in ops {
            if is_set {
                cache.set(key, b"v");
            } else {
                cache.delete(key);
            }
        }
        assert!(cache.has(b"k1"));
        assert!(!cache.has(b"k2"));
    }
}
