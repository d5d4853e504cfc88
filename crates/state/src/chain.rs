// Path: crates/state/src/chain.rs
//! Chain tip bookkeeping and the sync snapshot surfaced by timeouts.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of chain progress. Serialized into broadcast
/// timeout errors so callers can judge whether the chain is moving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncInfo {
    /// The chain identifier.
    pub chain_id: String,
    /// Height of the latest committed block.
    pub latest_height: u64,
    /// Hex app hash of the latest commit.
    pub latest_app_hash: String,
    /// Unix-millisecond timestamp of the latest commit.
    pub latest_block_time: u64,
}

#[derive(Debug, Default, Clone)]
struct Tip {
    height: u64,
    app_hash: [u8; 32],
    block_time: u64,
}

/// The chain identity and committed tip.
#[derive(Debug)]
pub struct Blockchain {
    chain_id: String,
    tip: RwLock<Tip>,
}

impl Blockchain {
    /// A chain at height zero.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Blockchain {
            chain_id: chain_id.into(),
            tip: RwLock::new(Tip::default()),
        }
    }

    /// The chain identifier envelopes must carry.
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Height of the latest commit.
    pub fn last_height(&self) -> u64 {
        self.tip.read().height
    }

    /// App hash of the latest commit.
    pub fn last_app_hash(&self) -> [u8; 32] {
        self.tip.read().app_hash
    }

    /// Records a commit.
    pub fn advance(&self, height: u64, app_hash: [u8; 32], block_time: u64) {
        let mut tip = self.tip.write();
        tip.height = height;
        tip.app_hash = app_hash;
        tip.block_time = block_time;
    }

    /// The current sync snapshot.
    pub fn sync_info(&self) -> SyncInfo {
        let tip = self.tip.read();
        SyncInfo {
            chain_id: self.chain_id.clone(),
            latest_height: tip.height,
            latest_app_hash: hex::encode(tip.app_hash),
            latest_block_time: tip.block_time,
        }
    }
}
