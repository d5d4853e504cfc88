// Path: crates/rpc/src/transact.rs
//! The transact service: formulate, sign, broadcast and simulate
//! transactions over the execution core.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use arbor_execution::{call_code_sim, call_sim, Transactor};
use arbor_state::{Blockchain, State};
use arbor_types::error::TransactError;
use arbor_types::{Address, CallTx, Envelope, Payload, Receipt, TxExecution};
use arbor_vm::Vm;

/// A transaction parameter: either a prebuilt envelope or a bare payload
/// to wrap with the current chain id.
#[derive(Debug, Clone, Default)]
pub struct TxEnvelopeParam {
    /// A fully formed (possibly signed) envelope.
    pub envelope: Option<Envelope>,
    /// A bare payload to enclose.
    pub payload: Option<Payload>,
    /// Optional broadcast deadline; `None` inherits the kernel maximum.
    pub timeout: Option<Duration>,
}

impl TxEnvelopeParam {
    /// A parameter carrying a bare payload.
    pub fn from_payload(payload: Payload) -> Self {
        TxEnvelopeParam {
            envelope: None,
            payload: Some(payload),
            timeout: None,
        }
    }

    /// The envelope to submit: the prebuilt one, or the payload wrapped
    /// with `chain_id`. `None` when the parameter is empty.
    pub fn into_envelope(self, chain_id: &str) -> Option<Envelope> {
        match (self.envelope, self.payload) {
            (Some(envelope), _) => Some(envelope),
            (None, Some(payload)) => Some(Envelope::enclose(chain_id, payload)),
            (None, None) => None,
        }
    }
}

/// Parameters of a raw code simulation.
#[derive(Debug, Clone)]
pub struct CallCodeParam {
    /// The notional caller.
    pub from: Address,
    /// The code to run.
    pub code: Vec<u8>,
    /// Input data.
    pub data: Vec<u8>,
    /// Gas budget for the simulation.
    pub gas_limit: u64,
}

/// The transact service.
pub struct TransactService {
    state: Arc<State>,
    blockchain: Arc<Blockchain>,
    transactor: Arc<Transactor>,
    vm: Arc<dyn Vm>,
    // Simulations take a single global read lock over state; they never
    // mutate.
    sim_lock: Mutex<()>,
}

impl TransactService {
    /// Wires the service to the kernel's components.
    pub fn new(
        state: Arc<State>,
        blockchain: Arc<Blockchain>,
        transactor: Arc<Transactor>,
        vm: Arc<dyn Vm>,
    ) -> Self {
        TransactService {
            state,
            blockchain,
            transactor,
            vm,
            sim_lock: Mutex::new(()),
        }
    }

    fn envelope_from(&self, param: TxEnvelopeParam) -> Result<(Envelope, Option<Duration>), TransactError> {
        let timeout = param.timeout;
        let envelope = param
            .into_envelope(self.blockchain.chain_id())
            .ok_or_else(|| {
                TransactError::InvalidRequest(
                    "no transaction envelope or payload provided".to_string(),
                )
            })?;
        Ok((envelope, timeout))
    }

    /// Signs (if needed), submits, and waits for the committed execution.
    pub async fn broadcast_tx_sync(
        &self,
        param: TxEnvelopeParam,
    ) -> Result<TxExecution, TransactError> {
        let (envelope, timeout) = self.envelope_from(param)?;
        tracing::debug!(
            target: "rpc",
            tx_type = %envelope.payload.kind(),
            "broadcast_tx_sync"
        );
        self.transactor.broadcast_tx_sync(timeout, envelope).await
    }

    /// Signs (if needed) and submits, returning the mempool receipt.
    pub async fn broadcast_tx_async(
        &self,
        param: TxEnvelopeParam,
    ) -> Result<Receipt, TransactError> {
        let (envelope, _) = self.envelope_from(param)?;
        self.transactor.broadcast_tx_async(envelope).await
    }

    /// Signs at committed sequences without broadcasting.
    pub fn sign_tx(&self, param: TxEnvelopeParam) -> Result<Envelope, TransactError> {
        let (envelope, _) = self.envelope_from(param)?;
        self.transactor.sign_tx(envelope)
    }

    /// Wraps a payload in an unsigned envelope for the current chain.
    pub fn formulate_tx(&self, payload: Payload) -> Envelope {
        Envelope::enclose(self.blockchain.chain_id(), payload)
    }

    /// Simulates a call transaction read-only against committed state.
    pub fn call_tx_sim(&self, tx: &CallTx) -> Result<TxExecution, TransactError> {
        let callee = tx.address.ok_or_else(|| {
            TransactError::InvalidRequest(
                "call simulation requires an address to retrieve code from".to_string(),
            )
        })?;
        let _guard = self.sim_lock.lock();
        call_sim(
            &self.state,
            self.blockchain.chain_id(),
            self.blockchain.last_height(),
            tx.input.address,
            callee,
            tx.data.clone(),
            tx.gas_limit,
            self.vm.as_ref(),
        )
        .map_err(TransactError::from)
    }

    /// Simulates raw code read-only against committed state.
    pub fn call_code_sim(&self, param: CallCodeParam) -> Result<TxExecution, TransactError> {
        let _guard = self.sim_lock.lock();
        call_code_sim(
            &self.state,
            self.blockchain.chain_id(),
            self.blockchain.last_height(),
            param.from,
            param.code,
            param.data,
            param.gas_limit,
            self.vm.as_ref(),
        )
        .map_err(TransactError::from)
    }
}
