// Path: crates/node/src/abci.rs
//! The consensus hook surface: how an external BFT replicated log drives
//! the execution core.
//!
//! The engine calls `check_tx` from its mempool and the block hooks
//! (`begin_block` / `deliver_tx` / `end_block` / `commit`) in order while
//! applying a decided block. Commit-time failures are fatal: continuing
//! past a partially flushed forest would diverge from the rest of the
//! network.

use parking_lot::Mutex;
use std::sync::Arc;

use arbor_execution::{Accounts, CheckTxResult, Executor, CHECK_TX_SUCCESS};
use arbor_state::{Blockchain, State};
use arbor_types::codec::to_bytes_canonical;
use arbor_types::{Envelope, StateError, ValidatorUpdate};

/// Response codes reported through CheckTx and DeliverTx.
pub mod codes {
    /// The transaction was accepted (or executed).
    pub const TX_EXECUTION_SUCCESS: u32 = 0;
    /// The bytes did not decode into an envelope.
    pub const ENCODING_ERROR: u32 = 1;
    /// The envelope failed validation (chain id, signatures, inputs).
    pub const INVALID_TX: u32 = 2;
    /// The input sequence cannot follow committed state.
    pub const BAD_SEQUENCE: u32 = 3;
}

/// The block header fields the engine hands to `begin_block`.
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    /// Height of the block being applied.
    pub height: u64,
    /// Block time in unix milliseconds.
    pub time_ms: u64,
}

/// Outcome of a DeliverTx hook.
#[derive(Debug, Clone)]
pub struct DeliverTxResult {
    /// `codes::TX_EXECUTION_SUCCESS` unless the envelope was unusable.
    pub code: u32,
    /// Log line for the engine.
    pub log: String,
}

/// The consensus-facing application: the hook implementation the BFT
/// engine drives.
pub struct App {
    executor: Mutex<Executor>,
    accounts: Arc<Accounts>,
    blockchain: Arc<Blockchain>,
    state: Arc<State>,
}

impl App {
    /// Wires the hooks to the executor and the mempool accounts.
    pub fn new(
        executor: Executor,
        accounts: Arc<Accounts>,
        blockchain: Arc<Blockchain>,
        state: Arc<State>,
    ) -> Self {
        App {
            executor: Mutex::new(executor),
            accounts,
            blockchain,
            state,
        }
    }

    /// Mempool admission: decode, validate, and precheck sequences against
    /// committed state. Success returns the canonical receipt bytes.
    pub fn check_tx(&self, tx_bytes: &[u8]) -> CheckTxResult {
        let envelope = match Envelope::decode(tx_bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                return CheckTxResult {
                    code: codes::ENCODING_ERROR,
                    data: Vec::new(),
                    log: format!("could not decode transaction: {err}"),
                }
            }
        };
        if let Err(err) = envelope.validate(self.blockchain.chain_id()) {
            return CheckTxResult {
                code: codes::INVALID_TX,
                data: Vec::new(),
                log: err.to_string(),
            };
        }
        for input in envelope.payload.inputs() {
            let committed = match self.accounts.committed_sequence(&input.address) {
                Ok(sequence) => sequence,
                Err(err) => {
                    return CheckTxResult {
                        code: codes::INVALID_TX,
                        data: Vec::new(),
                        log: err.to_string(),
                    }
                }
            };
            if input.sequence <= committed {
                return CheckTxResult {
                    code: codes::BAD_SEQUENCE,
                    data: Vec::new(),
                    log: format!(
                        "input {} sequence {} already used (committed {committed})",
                        input.address, input.sequence
                    ),
                };
            }
        }
        CheckTxResult {
            code: CHECK_TX_SUCCESS,
            data: to_bytes_canonical(&envelope.receipt()),
            log: String::new(),
        }
    }

    /// Opens a block.
    pub fn begin_block(&self, header: BlockHeader) -> Result<(), StateError> {
        self.executor.lock().begin_block(header.height, header.time_ms)
    }

    /// Applies one transaction. Execution failures are captured into the
    /// recorded `TxExecution` and still report success to the engine; only
    /// unusable bytes are refused.
    pub fn deliver_tx(&self, tx_bytes: &[u8]) -> Result<DeliverTxResult, StateError> {
        let envelope = match Envelope::decode(tx_bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                return Ok(DeliverTxResult {
                    code: codes::ENCODING_ERROR,
                    log: format!("could not decode transaction: {err}"),
                })
            }
        };
        let mut executor = self.executor.lock();
        let txe = executor.deliver_tx(envelope)?;
        let log = match &txe.exception {
            Some(exception) => exception.description.clone(),
            None => String::new(),
        };
        Ok(DeliverTxResult {
            code: codes::TX_EXECUTION_SUCCESS,
            log,
        })
    }

    /// Closes the execution phase, reporting validator power deltas.
    pub fn end_block(&self, _height: u64) -> Result<Vec<ValidatorUpdate>, StateError> {
        self.executor.lock().end_block()
    }

    /// Flushes and publishes the block, reconciles mempool sequence
    /// counters, and returns the new app hash. An error here means the
    /// forest may be partially written; the caller must abort the process.
    pub fn commit(&self) -> Result<[u8; 32], StateError> {
        let committed = self.executor.lock().commit()?;
        for txe in &committed.executions {
            for input in txe.envelope.payload.inputs() {
                let confirmed = !committed.rejected_inputs.contains(&input.address);
                self.accounts.reconcile(&input.address, confirmed)?;
            }
        }
        Ok(committed.app_hash)
    }

    /// The committed state behind the hooks.
    pub fn state(&self) -> &Arc<State> {
        &self.state
    }
}
