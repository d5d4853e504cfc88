// Path: crates/types/src/error.rs
//! Core error types for the Arbor kernel.

use thiserror::Error;

use crate::crypto::Address;
use crate::payload::PayloadKind;

/// A trait for assigning a stable, machine-readable string code to an error.
///
/// RPC responses and `TxExecution` exception records carry these codes, so
/// they must never change for an existing variant.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors from cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The signature failed cryptographic verification.
    #[error("signature verification failed")]
    VerificationFailed,
    /// The provided key material is malformed for the stated curve.
    #[error("invalid cryptographic key: {0}")]
    InvalidKey(String),
    /// The node cannot sign with this curve (only holds ed25519 keys).
    #[error("unsupported curve for operation: {0}")]
    UnsupportedCurve(&'static str),
    /// No private key is held for the requested address.
    #[error("no key held for address {0}")]
    KeyNotFound(Address),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::VerificationFailed => "CRYPTO_VERIFICATION_FAILED",
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::UnsupportedCurve(_) => "CRYPTO_UNSUPPORTED_CURVE",
            Self::KeyNotFound(_) => "CRYPTO_KEY_NOT_FOUND",
        }
    }
}

/// Errors related to the persistent forest and the caches layered over it.
#[derive(Debug, Error)]
pub enum StateError {
    /// An error occurred during state deserialization.
    #[error("decode error: {0}")]
    Decode(String),
    /// An error occurred in the state backend.
    #[error("state backend error: {0}")]
    Backend(String),
    /// A mutation was attempted on an entry already removed in this cache
    /// generation. Removal is terminal until the cache is reset.
    #[error("operation on removed entry: {0}")]
    Removed(String),
    /// The persistent state is inconsistent. Fatal: the process must not
    /// continue producing roots from a corrupt forest.
    #[error("state corrupt: {0}")]
    Corrupt(String),
}

impl ErrorCode for StateError {
    fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "STATE_DECODE_ERROR",
            Self::Backend(_) => "STATE_BACKEND_ERROR",
            Self::Removed(_) => "STATE_REMOVED_ENTRY",
            Self::Corrupt(_) => "STATE_CORRUPT",
        }
    }
}

/// Errors raised while executing a transaction payload against cached state.
///
/// These are captured into the `TxExecution` record rather than aborting the
/// block; only `State(StateError::Corrupt)` escalates to a process abort.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The payload was not of the kind the context expected.
    #[error("payload must be {expected}, but is {got}")]
    WrongPayload {
        /// The kind the context handles.
        expected: PayloadKind,
        /// The kind actually received.
        got: PayloadKind,
    },
    /// An input or target account does not exist.
    #[error("unknown account {0}")]
    UnknownAccount(Address),
    /// The input account lacks a required permission.
    #[error("account {address} lacks {perm} permission")]
    PermissionDenied {
        /// The account that failed the check.
        address: Address,
        /// Human-readable name of the missing permission.
        perm: &'static str,
    },
    /// The account balance does not cover the deduction.
    #[error("insufficient funds: account {address} has balance {balance}, deducting {amount}")]
    InsufficientFunds {
        /// The paying account.
        address: Address,
        /// Its current balance.
        balance: u64,
        /// The attempted deduction.
        amount: u64,
    },
    /// The operation amount was zero.
    #[error("nothing to transfer or bond: zero amount")]
    ZeroAmount,
    /// A validator does not have the power being unbonded.
    #[error("insufficient power: validator has {power}, unbonding {amount}")]
    InsufficientPower {
        /// Current power.
        power: u64,
        /// The attempted decrement.
        amount: u64,
    },
    /// A balance or power mutation would overflow.
    #[error("balance overflow on account {0}")]
    BalanceOverflow(Address),
    /// The input sequence does not follow the account sequence.
    #[error("bad sequence: expected {expected}, got {got}")]
    BadSequence {
        /// `account.sequence + 1`.
        expected: u64,
        /// The sequence carried by the input.
        got: u64,
    },
    /// A signature did not verify against its input.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    /// The input key curve is not acceptable in this position.
    #[error("curve {0} not supported here")]
    UnsupportedCurve(&'static str),
    /// An account's code may only be set once.
    #[error("code is immutable once set on account {0}")]
    CodeAlreadySet(Address),
    /// A name entry is owned by a different, still-live registrant.
    #[error("name '{name}' is owned by {owner}")]
    NameOwnership {
        /// The contested name.
        name: String,
        /// Its current owner.
        owner: Address,
    },
    /// The fee does not cover the requested name lease.
    #[error("fee {fee} insufficient for name lease of {blocks} blocks")]
    InsufficientFee {
        /// The offered fee.
        fee: u64,
        /// The requested lease length.
        blocks: u64,
    },
    /// A ballot has already executed and is terminal.
    #[error("proposal {0} already executed")]
    ProposalExecuted(String),
    /// The payload is structurally invalid for its kind.
    #[error("invalid transaction: {0}")]
    Invalid(String),
    /// The VM halted via REVERT; revert data lives in the execution result.
    #[error("execution reverted")]
    Reverted,
    /// A non-revert VM fault (out of gas, invalid opcode, trap).
    #[error("execution error: {0}")]
    VmFault(String),
    /// An error surfaced from the state layer.
    #[error(transparent)]
    State(#[from] StateError),
}

impl ErrorCode for ExecutionError {
    fn code(&self) -> &'static str {
        match self {
            Self::WrongPayload { .. } => "EXEC_WRONG_PAYLOAD",
            Self::UnknownAccount(_) => "EXEC_UNKNOWN_ACCOUNT",
            Self::PermissionDenied { .. } => "EXEC_PERMISSION_DENIED",
            Self::InsufficientFunds { .. } => "EXEC_INSUFFICIENT_FUNDS",
            Self::ZeroAmount => "EXEC_ZERO_AMOUNT",
            Self::InsufficientPower { .. } => "EXEC_INSUFFICIENT_POWER",
            Self::BalanceOverflow(_) => "EXEC_BALANCE_OVERFLOW",
            Self::BadSequence { .. } => "EXEC_BAD_SEQUENCE",
            Self::InvalidSignature(_) => "EXEC_INVALID_SIGNATURE",
            Self::UnsupportedCurve(_) => "EXEC_UNSUPPORTED_CURVE",
            Self::CodeAlreadySet(_) => "EXEC_CODE_ALREADY_SET",
            Self::NameOwnership { .. } => "EXEC_PERMISSION_DENIED",
            Self::InsufficientFee { .. } => "EXEC_INSUFFICIENT_FEE",
            Self::ProposalExecuted(_) => "EXEC_PROPOSAL_EXECUTED",
            Self::Invalid(_) => "EXEC_INVALID",
            Self::Reverted => "EXEC_REVERTED",
            Self::VmFault(_) => "EXEC_VM_FAULT",
            Self::State(e) => e.code(),
        }
    }
}

/// Errors from the consensus mempool hand-off.
#[derive(Debug, Error)]
pub enum MempoolError {
    /// The mempool cannot accept more transactions.
    #[error("mempool is full")]
    Full,
    /// CheckTx returned a non-success code.
    #[error("transaction rejected by mempool with code {code}: {log}")]
    Rejected {
        /// The CheckTx response code.
        code: u32,
        /// The CheckTx log line.
        log: String,
    },
}

impl ErrorCode for MempoolError {
    fn code(&self) -> &'static str {
        match self {
            Self::Full => "MEMPOOL_FULL",
            Self::Rejected { .. } => "MEMPOOL_REJECTED",
        }
    }
}

/// Errors surfaced by the transactor and the transact RPC surface.
#[derive(Debug, Error)]
pub enum TransactError {
    /// The request carried neither an envelope nor a payload.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The broadcast deadline elapsed before the transaction committed.
    /// The submission is NOT retracted; it may still commit later.
    #[error("timed out waiting for transaction {tx_hash}, SyncInfo: {sync_info}")]
    Timeout {
        /// Hex hash of the submitted transaction.
        tx_hash: String,
        /// JSON snapshot of chain sync state at the deadline.
        sync_info: String,
    },
    /// The caller cancelled the broadcast.
    #[error("broadcast cancelled by caller")]
    Cancelled,
    /// The envelope could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// Server-side signing failed.
    #[error("signing error: {0}")]
    Signing(#[from] CryptoError),
    /// The consensus mempool refused the transaction.
    #[error(transparent)]
    Mempool(#[from] MempoolError),
    /// The committed execution carried a non-revert exception.
    #[error("exception during transaction execution [{code}]: {description}")]
    ExecutionException {
        /// Stable code of the captured exception.
        code: String,
        /// Its description.
        description: String,
    },
    /// An execution error raised before the envelope reached the chain
    /// (validation, simulation).
    #[error("exception during transaction execution: {0}")]
    Execution(#[from] ExecutionError),
    /// An error surfaced from the state layer.
    #[error(transparent)]
    State(#[from] StateError),
}

impl ErrorCode for TransactError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "TRANSACT_INVALID_REQUEST",
            Self::Timeout { .. } => "TRANSACT_TIMEOUT",
            Self::Cancelled => "TRANSACT_CANCELLED",
            Self::Encoding(_) => "TRANSACT_ENCODING_ERROR",
            Self::Signing(e) => e.code(),
            Self::Mempool(e) => e.code(),
            Self::ExecutionException { .. } => "TRANSACT_EXECUTION_EXCEPTION",
            Self::Execution(e) => e.code(),
            Self::State(e) => e.code(),
        }
    }
}
