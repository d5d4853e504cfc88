// Path: crates/execution/src/executor.rs
//! The executor: drives one block's transactions through their contexts
//! and owns the commit path.
//!
//! Per transaction the lifecycle is
//! `Entered -> Validated -> Executed -> (Succeeded | Reverted | Errored)
//! -> Published`. A reverted execution keeps its gas charge (the context
//! merged it before reporting the revert); an errored one is discarded
//! wholesale with its nested cache.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_state::{BlockState, Blockchain, State};
use arbor_types::error::ExecutionError;
use arbor_types::{Address, Envelope, StateError, TxExecution, ValidatorUpdate};
use arbor_vm::Vm;

use crate::contexts::{execute_payload, ContextEnv};
use crate::events::EventSink;

/// Terminal lifecycle phase of one transaction inside the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    /// Context ran to completion and the nested cache was merged.
    Succeeded,
    /// The VM reverted; gas and sequence survived, VM effects did not.
    Reverted,
    /// A precondition or hard fault; the nested cache was discarded.
    Errored,
}

struct BlockInProgress {
    height: u64,
    block_time: u64,
    state: BlockState,
    executions: Vec<TxExecution>,
    // Addresses whose tx was rejected this block; their mempool pending
    // counters must reset at reconcile time.
    rejected_inputs: HashMap<Address, ()>,
}

/// Summary of a committed block handed back to the kernel.
pub struct CommittedBlock {
    /// The committed height.
    pub height: u64,
    /// The new forest root (the app hash reported to consensus).
    pub app_hash: [u8; 32],
    /// Every execution record of the block, published and persisted.
    pub executions: Vec<Arc<TxExecution>>,
    /// Input addresses that had a transaction rejected this block.
    pub rejected_inputs: Vec<Address>,
}

/// Owns the write-side caches for the duration of a block.
pub struct Executor {
    state: Arc<State>,
    blockchain: Arc<Blockchain>,
    emitter: Arc<dyn EventSink>,
    vm: Arc<dyn Vm>,
    block: Option<BlockInProgress>,
}

impl Executor {
    /// Wires the executor to committed state, the chain tip and the event
    /// sink.
    pub fn new(
        state: Arc<State>,
        blockchain: Arc<Blockchain>,
        emitter: Arc<dyn EventSink>,
        vm: Arc<dyn Vm>,
    ) -> Self {
        Executor {
            state,
            blockchain,
            emitter,
            vm,
            block: None,
        }
    }

    /// The committed state this executor flushes into.
    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    /// Opens a block: snapshots the forest behind a fresh cache bundle.
    pub fn begin_block(&mut self, height: u64, block_time: u64) -> Result<(), StateError> {
        if self.block.is_some() {
            return Err(StateError::Corrupt(
                "begin_block while a block is in progress".to_string(),
            ));
        }
        self.block = Some(BlockInProgress {
            height,
            block_time,
            state: self.state.block_state(),
            executions: Vec::new(),
            rejected_inputs: HashMap::new(),
        });
        Ok(())
    }

    /// Executes one envelope inside a nested cache, merging on success and
    /// discarding on failure. Always records a `TxExecution`; the returned
    /// reference reports the outcome to the consensus layer.
    pub fn deliver_tx(&mut self, envelope: Envelope) -> Result<&TxExecution, StateError> {
        let chain_id = self.blockchain.chain_id().to_string();
        let block = self
            .block
            .as_mut()
            .ok_or_else(|| StateError::Corrupt("deliver_tx outside a block".to_string()))?;

        let index = block.executions.len() as u32;
        let mut txe = TxExecution::new(block.height, index, envelope.clone());
        txe.header.block_time = block.block_time;
        tracing::trace!(target: "executor", index, "entered");

        let outcome = envelope.validate(&chain_id).and_then(|()| {
            tracing::trace!(target: "executor", index, "validated");
            let nested = block.state.child();
            let env = ContextEnv {
                state: &nested,
                height: block.height,
                vm: self.vm.as_ref(),
                depth: 0,
            };
            let result = execute_payload(&env, &mut txe, &envelope.payload);
            tracing::trace!(target: "executor", index, "executed");
            result.map(|()| nested)
        });

        let phase = match outcome {
            Ok(nested) => {
                block.state.absorb(&nested)?;
                if txe.is_reverted() {
                    TxPhase::Reverted
                } else {
                    TxPhase::Succeeded
                }
            }
            Err(err) => {
                if let ExecutionError::State(StateError::Corrupt(msg)) = &err {
                    // Divergent caches are not recoverable per-tx.
                    return Err(StateError::Corrupt(msg.clone()));
                }
                txe.set_exception(&err);
                for input in envelope.payload.inputs() {
                    block.rejected_inputs.insert(input.address, ());
                }
                TxPhase::Errored
            }
        };

        tracing::debug!(
            target: "executor",
            height = block.height,
            index,
            tx_hash = %hex::encode(txe.header.tx_hash),
            tx_type = %txe.header.tx_type,
            phase = ?phase,
            "delivered transaction"
        );

        block.executions.push(txe);
        block
            .executions
            .last()
            .ok_or_else(|| StateError::Corrupt("execution record vanished".to_string()))
    }

    /// Closes the block's execution phase, reporting the validator power
    /// deltas accrued by its transactions.
    pub fn end_block(&mut self) -> Result<Vec<ValidatorUpdate>, StateError> {
        let block = self
            .block
            .as_ref()
            .ok_or_else(|| StateError::Corrupt("end_block outside a block".to_string()))?;
        block.state.validators.updates()
    }

    /// Flushes the block caches to the forest in deterministic order,
    /// persists and publishes every execution record, and advances the
    /// chain tip. Returns the new root hash.
    ///
    /// A failure here is fatal to the process: the forest may have
    /// partially absorbed the block.
    pub fn commit(&mut self) -> Result<CommittedBlock, StateError> {
        let block = self
            .block
            .take()
            .ok_or_else(|| StateError::Corrupt("commit outside a block".to_string()))?;

        let app_hash = self.state.commit_block(&block.state, block.height)?;
        self.blockchain
            .advance(block.height, app_hash, block.block_time);

        let mut executions = Vec::with_capacity(block.executions.len());
        for txe in block.executions {
            self.state.store_tx_execution(&txe)?;
            let txe = Arc::new(txe);
            self.emitter.publish_tx(&txe);
            executions.push(txe);
        }

        tracing::info!(
            target: "executor",
            height = block.height,
            app_hash = %hex::encode(app_hash),
            txs = executions.len(),
            "committed block"
        );

        Ok(CommittedBlock {
            height: block.height,
            app_hash,
            executions,
            rejected_inputs: block.rejected_inputs.into_keys().collect(),
        })
    }
}
