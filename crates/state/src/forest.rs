// Path: crates/state/src/forest.rs
//! The versioned forest: prefixed key/value sub-trees under one root.
//!
//! Each commit digests every sub-tree in prefix order and appends the
//! resulting root to a height-indexed chain. The forest is single-writer
//! (the committer) and multi-reader; all RPC paths read only.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use arbor_types::StateError;

use crate::kvcache::KVWriter;

/// A committed root in the height-indexed chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitId {
    /// The block height of the commit.
    pub height: u64,
    /// The forest root hash at that height.
    pub hash: [u8; 32],
}

#[derive(Default)]
struct ForestInner {
    trees: BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>,
    roots: Vec<CommitId>,
}

/// The persistent state forest.
#[derive(Default)]
pub struct Forest {
    inner: RwLock<ForestInner>,
}

impl Forest {
    /// An empty forest with no committed roots.
    pub fn new() -> Self {
        Forest::default()
    }

    /// Reads `key` from the sub-tree under `prefix`.
    pub fn get(&self, prefix: &[u8], key: &[u8]) -> Option<Vec<u8>> {
        self.inner
            .read()
            .trees
            .get(prefix)
            .and_then(|tree| tree.get(key).cloned())
    }

    /// Writes `key` in the sub-tree under `prefix`. Single-writer
    /// discipline: only the committer mutates between commits.
    pub fn set(&self, prefix: &[u8], key: &[u8], value: &[u8]) {
        self.inner
            .write()
            .trees
            .entry(prefix.to_vec())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
    }

    /// Deletes `key` from the sub-tree under `prefix`.
    pub fn delete(&self, prefix: &[u8], key: &[u8]) {
        if let Some(tree) = self.inner.write().trees.get_mut(prefix) {
            tree.remove(key);
        }
    }

    /// Calls `consumer` for every entry of the sub-tree under `prefix`, in
    /// ascending key order, until it returns `false`.
    pub fn iterate<F>(&self, prefix: &[u8], mut consumer: F) -> Result<(), StateError>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool, StateError>,
    {
        let inner = self.inner.read();
        if let Some(tree) = inner.trees.get(prefix) {
            for (key, value) in tree {
                if !consumer(key, value)? {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Number of entries in the sub-tree under `prefix`.
    pub fn tree_len(&self, prefix: &[u8]) -> usize {
        self.inner
            .read()
            .trees
            .get(prefix)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    /// Commits the forest at `height`, appending the new root to the chain.
    /// Heights must be strictly increasing; anything else means the
    /// committer and the chain have diverged, which is fatal.
    pub fn commit(&self, height: u64) -> Result<[u8; 32], StateError> {
        let mut inner = self.inner.write();
        if let Some(last) = inner.roots.last() {
            if height <= last.height {
                return Err(StateError::Corrupt(format!(
                    "commit at height {height} after height {}",
                    last.height
                )));
            }
        }
        let mut forest_hasher = Sha256::new();
        for (prefix, tree) in &inner.trees {
            let mut tree_hasher = Sha256::new();
            for (key, value) in tree {
                tree_hasher.update((key.len() as u64).to_be_bytes());
                tree_hasher.update(key);
                tree_hasher.update((value.len() as u64).to_be_bytes());
                tree_hasher.update(value);
            }
            forest_hasher.update((prefix.len() as u64).to_be_bytes());
            forest_hasher.update(prefix);
            forest_hasher.update(tree_hasher.finalize());
        }
        let hash: [u8; 32] = forest_hasher.finalize().into();
        inner.roots.push(CommitId { height, hash });
        Ok(hash)
    }

    /// The root committed at exactly `height`, if any.
    pub fn root_at(&self, height: u64) -> Option<[u8; 32]> {
        let inner = self.inner.read();
        inner
            .roots
            .iter()
            .find(|c| c.height == height)
            .map(|c| c.hash)
    }

    /// The most recent commit.
    pub fn latest(&self) -> Option<CommitId> {
        self.inner.read().roots.last().copied()
    }
}

/// Adapts one forest sub-tree as a flush target for `KVCache::write_to`.
/// The forest's BTreeMap sub-trees are commutative over distinct keys, so
/// unsorted flushes land deterministically.
pub struct ForestTreeWriter<'a> {
    forest: &'a Forest,
    prefix: &'a [u8],
}

impl<'a> ForestTreeWriter<'a> {
    /// A writer into the sub-tree under `prefix`.
    pub fn new(forest: &'a Forest, prefix: &'a [u8]) -> Self {
        ForestTreeWriter { forest, prefix }
    }
}

impl KVWriter for ForestTreeWriter<'_> {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.forest.set(self.prefix, key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.forest.delete(self.prefix, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_roots_are_height_indexed() {
        let forest = Forest::new();
        forest.set(b"acc/", b"a", b"1");
        let r1 = forest.commit(1).unwrap();
        forest.set(b"acc/", b"b", b"2");
        let r2 = forest.commit(2).unwrap();
        assert_ne!(r1, r2);
        assert_eq!(forest.root_at(1), Some(r1));
        assert_eq!(forest.root_at(2), Some(r2));
        assert_eq!(forest.latest().unwrap().height, 2);
    }

    #[test]
    fn same_content_same_root() {
        let a = Forest::new();
        let b = Forest::new();
        // Insertion order must not matter.
        a.set(b"acc/", b"x", b"1");
        a.set(b"name/", b"y", b"2");
        b.set(b"name/", b"y", b"2");
        b.set(b"acc/", b"x", b"1");
        assert_eq!(a.commit(1).unwrap(), b.commit(1).unwrap());
    }

    #[test]
    fn non_monotonic_commit_is_fatal() {
        let forest = Forest::new();
        forest.commit(5).unwrap();
        let err = forest.commit(5).unwrap_err();
        assert!(matches!(err, StateError::Corrupt(_)));
    }

    #[test]
    fn delete_removes_from_root() {
        let forest = Forest::new();
        forest.set(b"acc/", b"x", b"1");
        let r1 = forest.commit(1).unwrap();
        forest.delete(b"acc/", b"x");
        let r2 = forest.commit(2).unwrap();
        assert_ne!(r1, r2);
        assert_eq!(forest.get(b"acc/", b"x"), None);
    }
}
