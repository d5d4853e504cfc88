// Path: crates/state/src/proposals.rs
//! The ballot cache and its reader/writer seams.

use std::sync::Arc;

use arbor_types::{Ballot, StateError};

use crate::cache::{CacheBackend, SyncOp, TypedCache};

/// A ballot key: the sha256 content address of its proposal.
pub type ProposalHash = [u8; 32];

/// Read access to ballots.
pub trait ProposalReader: Send + Sync {
    /// Loads the ballot under `hash`, `None` if absent.
    fn get_proposal(&self, hash: &ProposalHash) -> Result<Option<Ballot>, StateError>;
}

/// Write access to ballots.
pub trait ProposalWriter: ProposalReader {
    /// Inserts or overwrites a ballot.
    fn update_proposal(&self, hash: ProposalHash, ballot: Ballot) -> Result<(), StateError>;
    /// Removes a ballot.
    fn remove_proposal(&self, hash: &ProposalHash) -> Result<(), StateError>;
}

struct ReaderBackend(Arc<dyn ProposalReader>);

impl CacheBackend<ProposalHash, Ballot> for ReaderBackend {
    fn load(&self, key: &ProposalHash) -> Result<Option<Ballot>, StateError> {
        self.0.get_proposal(key)
    }
}

/// Write-back cache of ballots over any [`ProposalReader`].
pub struct ProposalCache {
    cache: TypedCache<ProposalHash, Ballot>,
}

impl ProposalCache {
    /// A cache reading through to `backend`.
    pub fn new(backend: Arc<dyn ProposalReader>) -> Self {
        ProposalCache {
            cache: TypedCache::new(Arc::new(ReaderBackend(backend))),
        }
    }

    /// Flushes dirty entries to `writer` in ascending hash order.
    pub fn sync(&self, writer: &dyn ProposalWriter) -> Result<(), StateError> {
        self.cache.sync(|hash, op| match op {
            SyncOp::Update(ballot) => writer.update_proposal(*hash, ballot.clone()),
            SyncOp::Remove => writer.remove_proposal(hash),
        })
    }

    /// Starts a new generation, optionally over a new backend.
    pub fn reset(&self, backend: Option<Arc<dyn ProposalReader>>) {
        self.cache
            .reset(backend.map(|b| Arc::new(ReaderBackend(b)) as _));
    }
}

impl ProposalReader for ProposalCache {
    fn get_proposal(&self, hash: &ProposalHash) -> Result<Option<Ballot>, StateError> {
        self.cache.get(hash)
    }
}

impl ProposalWriter for ProposalCache {
    fn update_proposal(&self, hash: ProposalHash, ballot: Ballot) -> Result<(), StateError> {
        self.cache.update(hash, ballot)
    }

    fn remove_proposal(&self, hash: &ProposalHash) -> Result<(), StateError> {
        self.cache.remove(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::proposal::Proposal;
    use parking_lot::Mutex;

    struct Empty;
    impl ProposalReader for Empty {
        fn get_proposal(&self, _: &ProposalHash) -> Result<Option<Ballot>, StateError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(ProposalHash, bool)>>,
    }

    impl ProposalReader for Recorder {
        fn get_proposal(&self, _: &ProposalHash) -> Result<Option<Ballot>, StateError> {
            Ok(None)
        }
    }

    impl ProposalWriter for Recorder {
        fn update_proposal(&self, hash: ProposalHash, _: Ballot) -> Result<(), StateError> {
            self.calls.lock().push((hash, true));
            Ok(())
        }
        fn remove_proposal(&self, hash: &ProposalHash) -> Result<(), StateError> {
            self.calls.lock().push((*hash, false));
            Ok(())
        }
    }

    fn ballot(tag: &str) -> Ballot {
        Ballot::new(Proposal {
            name: tag.to_string(),
            description: String::new(),
            batch: Vec::new(),
        })
    }

    #[test]
    fn sync_flushes_in_ascending_hash_order() {
        let cache = ProposalCache::new(std::sync::Arc::new(Empty));
        // Three inserts and one remove in arbitrary order.
        let mut hashes = Vec::new();
        for tag in ["gamma", "alpha", "delta"] {
            let b = ballot(tag);
            let hash = b.proposal.hash();
            cache.update_proposal(hash, b).unwrap();
            hashes.push(hash);
        }
        let removed = [9u8; 32];
        cache.remove_proposal(&removed).unwrap();
        hashes.push(removed);

        let recorder = Recorder::default();
        cache.sync(&recorder).unwrap();

        let calls = recorder.calls.lock();
        let flushed: Vec<ProposalHash> = calls.iter().map(|(h, _)| *h).collect();
        let mut expected = hashes.clone();
        expected.sort();
        assert_eq!(flushed, expected);
        // The remove surfaced as a remove, not an update.
        let removed_call = calls.iter().find(|(h, _)| *h == removed).unwrap();
        assert!(!removed_call.1);
    }
}

