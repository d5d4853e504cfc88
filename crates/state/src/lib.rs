// Path: crates/state/src/lib.rs
//! Copy-on-write state caches over the versioned forest.
//!
//! Layering, leaf first: [`kvcache::KVCache`] is the raw overlay;
//! [`cache::TypedCache`] adds per-entry records and deterministic sync;
//! the account/name/proposal caches and [`storage::StorageCache`] are its
//! typed instantiations; [`forest::Forest`] is the persistent, versioned
//! bottom; [`state::State`] ties them together and owns the commit path.

pub mod accounts;
pub mod cache;
pub mod chain;
pub mod forest;
pub mod kvcache;
pub mod names;
pub mod proposals;
pub mod state;
pub mod storage;
pub mod validators;

pub use accounts::{AccountCache, AccountReader, AccountWriter};
pub use chain::{Blockchain, SyncInfo};
pub use forest::{CommitId, Forest};
pub use kvcache::{KVCache, KVWriter};
pub use names::{NameCache, NameReader, NameWriter};
pub use proposals::{ProposalCache, ProposalHash, ProposalReader, ProposalWriter};
pub use state::{BlockState, State};
pub use storage::{StorageCache, StorageReader};
pub use validators::{ValidatorDeltas, ValidatorReader, ValidatorWriter};
