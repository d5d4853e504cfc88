// Path: crates/node/src/dev.rs
//! A single-node development loop standing in for the external BFT
//! engine: an in-process mempool plus an interval block producer driving
//! the consensus hooks.
//!
//! The transactor needs the CheckTx hand-off at construction while the
//! hook application only exists once the kernel is assembled, so the loop
//! exposes a late-bound slot: build the loop, hand its CheckTx function to
//! the kernel, then bind the kernel's app back into the loop.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arbor_execution::{CheckTxFn, CHECK_TX_SUCCESS};
use arbor_state::Blockchain;
use arbor_types::error::MempoolError;

use crate::abci::{App, BlockHeader};

const DEFAULT_CAPACITY: usize = 10_000;

/// The dev mempool: validated transaction bytes waiting for the next
/// block.
pub struct LocalMempool {
    queue: Mutex<VecDeque<Vec<u8>>>,
    capacity: usize,
}

impl LocalMempool {
    /// A mempool with the default capacity.
    pub fn new() -> Self {
        LocalMempool {
            queue: Mutex::new(VecDeque::new()),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Drains every pending transaction for block assembly.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.queue.lock().drain(..).collect()
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LocalMempool {
    fn default() -> Self {
        LocalMempool::new()
    }
}

/// The in-process consensus stand-in.
pub struct DevLoop {
    mempool: Arc<LocalMempool>,
    app: Arc<OnceLock<Arc<App>>>,
}

impl DevLoop {
    /// An empty loop; bind the app once the kernel is assembled.
    pub fn new() -> Self {
        DevLoop {
            mempool: Arc::new(LocalMempool::new()),
            app: Arc::new(OnceLock::new()),
        }
    }

    /// The pending-transaction queue.
    pub fn mempool(&self) -> &Arc<LocalMempool> {
        &self.mempool
    }

    /// Completes the wiring; must be called exactly once.
    pub fn bind(&self, app: Arc<App>) {
        if self.app.set(app).is_err() {
            tracing::warn!(target: "dev", "dev loop already bound, ignoring rebind");
        }
    }

    /// The CheckTx hand-off the transactor uses in dev mode: admission
    /// through the app's CheckTx, then enqueue for the next block.
    pub fn check_tx_fn(&self) -> CheckTxFn {
        let mempool = self.mempool.clone();
        let app = self.app.clone();
        Arc::new(move |tx_bytes, callback| {
            let Some(app) = app.get() else {
                return Err(MempoolError::Rejected {
                    code: u32::MAX,
                    log: "node is still starting".to_string(),
                });
            };
            {
                let queue = mempool.queue.lock();
                if queue.len() >= mempool.capacity {
                    return Err(MempoolError::Full);
                }
            }
            let result = app.check_tx(&tx_bytes);
            if result.code == CHECK_TX_SUCCESS {
                mempool.queue.lock().push_back(tx_bytes);
            }
            callback(result);
            Ok(())
        })
    }

    /// Produces a block from pending transactions every `interval`. Runs
    /// until the task is dropped. A commit failure aborts the process: the
    /// forest may be partially written and must not serve another root.
    pub async fn run(&self, blockchain: Arc<Blockchain>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let Some(app) = self.app.get() else { continue };
            let txs = self.mempool.drain();
            if txs.is_empty() {
                continue;
            }
            let height = blockchain.last_height() + 1;
            let header = BlockHeader {
                height,
                time_ms: now_ms(),
            };
            let produced = (|| {
                app.begin_block(header)?;
                for tx_bytes in &txs {
                    app.deliver_tx(tx_bytes)?;
                }
                let updates = app.end_block(height)?;
                if !updates.is_empty() {
                    tracing::debug!(
                        target: "dev",
                        height,
                        updates = updates.len(),
                        "validator set changed"
                    );
                }
                app.commit()
            })();
            match produced {
                Ok(app_hash) => {
                    tracing::info!(
                        target: "dev",
                        height,
                        txs = txs.len(),
                        app_hash = %hex::encode(app_hash),
                        "produced block"
                    );
                }
                Err(err) => {
                    tracing::error!(target: "dev", height, error = %err, "fatal commit failure");
                    std::process::abort();
                }
            }
        }
    }
}

impl Default for DevLoop {
    fn default() -> Self {
        DevLoop::new()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
