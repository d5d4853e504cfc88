// Path: crates/types/src/lib.rs
//! Core data model for the Arbor kernel: accounts, payloads, envelopes,
//! execution records, errors and the canonical codec.
//!
//! Everything that is written to consensus-critical state or hashed for
//! signing lives here, so that every other crate agrees on one binary
//! representation.

pub mod account;
pub mod codec;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod exec;
pub mod keys;
pub mod names;
pub mod payload;
pub mod permissions;
pub mod proposal;
pub mod validator;

pub use account::Account;
pub use crypto::{Address, CurveType, PrivateKey, PublicKey, Signature};
pub use envelope::{Envelope, Receipt, Signatory};
pub use error::{ErrorCode, ExecutionError, MempoolError, StateError, TransactError};
pub use exec::{Event, Exception, TxExecution, TxHeader};
pub use names::NameEntry;
pub use payload::{
    AccountUpdate, BondTx, CallTx, GovTx, NameTx, Payload, PayloadKind, PermAction, PermTx,
    ProposalTx, SendTx, TxInput, TxOutput, UnbondTx,
};
pub use permissions::{PermFlag, Permissions};
pub use proposal::{Ballot, BallotState, Vote};
pub use validator::ValidatorUpdate;
