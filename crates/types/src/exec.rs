// Path: crates/types/src/exec.rs
//! Immutable records of applied transactions and the events they emit.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::crypto::{Address, PublicKey};
use crate::envelope::{Envelope, Receipt};
use crate::error::{ErrorCode, ExecutionError};
use crate::payload::PayloadKind;

/// Identity of one applied envelope: where in the chain it landed.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct TxHeader {
    /// Block height the envelope committed at.
    pub height: u64,
    /// Offset of the envelope within the block.
    pub index: u32,
    /// Block time in unix milliseconds; zero for simulations.
    pub block_time: u64,
    /// Envelope content hash.
    pub tx_hash: [u8; 32],
    /// Kind of the enclosed payload.
    pub tx_type: PayloadKind,
}

/// A state-transition event emitted during execution, in generation order.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum Event {
    /// Value moved between accounts.
    Transfer {
        /// Debited account.
        from: Address,
        /// Credited account.
        to: Address,
        /// Amount moved.
        amount: u64,
    },
    /// A contract was invoked.
    Call {
        /// The calling account.
        caller: Address,
        /// The callee.
        callee: Address,
        /// Value transferred with the call.
        value: u64,
        /// Gas consumed.
        gas_used: u64,
    },
    /// A contract account was created.
    ContractCreated {
        /// The deterministic contract address.
        address: Address,
    },
    /// Balance bonded into validator power.
    Bond {
        /// The validator identity.
        validator: PublicKey,
        /// Amount bonded.
        amount: u64,
        /// Resulting power.
        power: u64,
    },
    /// Validator power returned to balance.
    Unbond {
        /// The validator identity.
        validator: PublicKey,
        /// Amount unbonded.
        amount: u64,
        /// Resulting power.
        power: u64,
    },
    /// A name lease was created or extended.
    NameUpdated {
        /// The name.
        name: String,
        /// The (possibly new) owner.
        owner: Address,
        /// New expiry height.
        expires: u64,
    },
    /// An account's permissions changed.
    PermissionsChanged {
        /// The mutated account.
        target: Address,
    },
    /// A governance template was applied to an account.
    GovernanceApplied {
        /// The shaped account.
        address: Address,
    },
    /// A vote accreted onto a ballot.
    ProposalVoted {
        /// The ballot hash.
        proposal: [u8; 32],
        /// The voter.
        voter: Address,
        /// Power behind the vote.
        power: u64,
    },
    /// A ballot passed threshold and its batch was applied.
    ProposalExecuted {
        /// The ballot hash.
        proposal: [u8; 32],
    },
}

impl Event {
    /// The `event.type` tag value.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Event::Transfer { .. } => "Transfer",
            Event::Call { .. } => "Call",
            Event::ContractCreated { .. } => "ContractCreated",
            Event::Bond { .. } => "Bond",
            Event::Unbond { .. } => "Unbond",
            Event::NameUpdated { .. } => "NameUpdated",
            Event::PermissionsChanged { .. } => "PermissionsChanged",
            Event::GovernanceApplied { .. } => "GovernanceApplied",
            Event::ProposalVoted { .. } => "ProposalVoted",
            Event::ProposalExecuted { .. } => "ProposalExecuted",
        }
    }
}

/// A captured execution failure. Stored in the `TxExecution` rather than
/// aborting the block.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Exception {
    /// Stable machine-readable code of the underlying error.
    pub code: String,
    /// Human-readable description.
    pub description: String,
}

/// Stable code of a VM revert, the one exception kind that is returned to
/// callers as a success.
pub const REVERT_CODE: &str = "EXEC_REVERTED";

impl Exception {
    /// Captures an execution error into an exception record.
    pub fn from_error(err: &ExecutionError) -> Self {
        Exception {
            code: err.code().to_string(),
            description: err.to_string(),
        }
    }

    /// Whether this exception is a VM revert.
    pub fn is_revert(&self) -> bool {
        self.code == REVERT_CODE
    }
}

/// VM output attached to a call execution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode, Serialize, Deserialize)]
pub struct TxResult {
    /// Return (or revert) data.
    pub return_data: Vec<u8>,
    /// Gas consumed and charged.
    pub gas_used: u64,
}

/// The immutable record of one applied envelope, emitted exactly once per
/// inclusion and keyed by `(height, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct TxExecution {
    /// Where the envelope landed.
    pub header: TxHeader,
    /// The applied envelope.
    pub envelope: Envelope,
    /// Events in generation order.
    pub events: Vec<Event>,
    /// VM output, when the payload ran code.
    pub result: Option<TxResult>,
    /// The captured failure, if execution did not succeed.
    pub exception: Option<Exception>,
    /// The mempool receipt for the envelope.
    pub receipt: Receipt,
    /// Executions of envelopes applied on behalf of this one (ballot
    /// batches).
    pub children: Vec<TxExecution>,
}

impl TxExecution {
    /// Starts a record for an envelope at a chain position.
    pub fn new(height: u64, index: u32, envelope: Envelope) -> Self {
        let receipt = envelope.receipt();
        TxExecution {
            header: TxHeader {
                height,
                index,
                block_time: 0,
                tx_hash: envelope.hash(),
                tx_type: envelope.payload.kind(),
            },
            envelope,
            events: Vec::new(),
            result: None,
            exception: None,
            receipt,
            children: Vec::new(),
        }
    }

    /// Appends an event.
    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Captures an execution error.
    pub fn set_exception(&mut self, err: &ExecutionError) {
        self.exception = Some(Exception::from_error(err));
    }

    /// The exception, unless it is a revert (reverts are surfaced to
    /// callers as successful executions carrying the exception).
    pub fn call_error(&self) -> Option<&Exception> {
        self.exception.as_ref()
    }

    /// Whether execution ended in a VM revert.
    pub fn is_reverted(&self) -> bool {
        self.exception.as_ref().is_some_and(|e| e.is_revert())
    }

    /// Tag lookup for event subscription queries. `height` and the tx
    /// identity tags are always present.
    pub fn get_tag(&self, key: &str) -> Option<String> {
        match key {
            "tx.hash" => Some(hex::encode(self.header.tx_hash)),
            "tx.type" => Some(self.header.tx_type.to_string()),
            "height" => Some(self.header.height.to_string()),
            "timestamp" => Some(self.header.block_time.to_string()),
            "index" => Some(self.header.index.to_string()),
            "exception" => self.exception.as_ref().map(|e| e.code.clone()),
            "event.type" => {
                // A tx matches on any of its events' types.
                self.events.first().map(|e| e.type_tag().to_string())
            }
            _ => None,
        }
    }
}
