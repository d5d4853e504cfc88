// Path: crates/types/src/payload.rs
//! The closed union of transaction payloads.
//!
//! Dispatch on `PayloadKind` is a fixed match everywhere, so adding a kind
//! is a compile-time-checked change across the executor and contexts.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::crypto::Address;
use crate::permissions::Permissions;
use crate::proposal::Ballot;

/// A spending input: which account pays, how much, and the sequence that
/// proves freshness.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct TxInput {
    /// The paying account.
    pub address: Address,
    /// Amount deducted from the account (transfer value, bond, or fee
    /// depending on the payload kind).
    pub amount: u64,
    /// Must equal `account.sequence + 1` at execution time.
    pub sequence: u64,
}

/// A receiving output of a SendTx.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct TxOutput {
    /// The credited account; created if absent and permitted.
    pub address: Address,
    /// Amount credited.
    pub amount: u64,
}

/// Invoke (or create) a contract.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct CallTx {
    /// The caller; `input.amount` is the value transferred to the callee.
    pub input: TxInput,
    /// The callee. `None` means create a contract from `data` as init code.
    pub address: Option<Address>,
    /// Gas budget; consumed gas is charged to the caller's balance.
    pub gas_limit: u64,
    /// Call data, or init code when creating.
    pub data: Vec<u8>,
}

/// Plain multi-input, multi-output value transfer.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct SendTx {
    /// Paying inputs.
    pub inputs: Vec<TxInput>,
    /// Credited outputs. Totals must conserve.
    pub outputs: Vec<TxOutput>,
}

/// Register, update or extend a name lease. `input.amount` is the fee.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct NameTx {
    /// The registrant paying the fee.
    pub input: TxInput,
    /// The name being claimed or renewed.
    pub name: String,
    /// Data to attach to the entry.
    pub data: String,
}

/// Move `input.amount` of balance into validator power.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct BondTx {
    /// The bonding account; its public key becomes the validator identity.
    pub input: TxInput,
}

/// Move `input.amount` of validator power back into balance.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct UnbondTx {
    /// The unbonding account.
    pub input: TxInput,
}

/// A single permission or role mutation.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum PermAction {
    /// Explicitly set or clear a permission bit.
    SetBase {
        /// Raw permission bit; must fall inside the known mask.
        permission: u64,
        /// Grant or deny.
        value: bool,
    },
    /// Remove the explicit setting, deferring to global defaults.
    UnsetBase {
        /// Raw permission bit; must fall inside the known mask.
        permission: u64,
    },
    /// Grant a string role.
    AddRole(String),
    /// Revoke a string role.
    RemoveRole(String),
}

/// Mutate another account's permissions.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct PermTx {
    /// The authorizing account; requires `setPermission`.
    pub input: TxInput,
    /// The account being mutated.
    pub target: Address,
    /// The mutation to apply.
    pub action: PermAction,
}

/// A template entry of a GovTx: upsert an account to match the described
/// shape. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct AccountUpdate {
    /// The account being shaped; created if absent.
    pub address: Address,
    /// Set the balance outright.
    pub balance: Option<u64>,
    /// Set validator power for the account's public key.
    pub power: Option<u64>,
    /// Install contract code (write-once rule still applies).
    pub code: Option<Vec<u8>>,
    /// Replace the permission bitmap.
    pub permissions: Option<Permissions>,
    /// Replace the role set.
    pub roles: Option<BTreeSet<String>>,
}

/// Template-driven account surgery; the network's root-permissioned escape
/// hatch.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct GovTx {
    /// Authorizing inputs; each requires root.
    pub inputs: Vec<TxInput>,
    /// The account templates to apply, in order.
    pub updates: Vec<AccountUpdate>,
}

/// Create or vote on a ballot. Carrying the full ballot creates it (keyed
/// by its content hash); carrying only the hash votes on an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ProposalTx {
    /// The proposing or voting account; requires `propose`.
    pub input: TxInput,
    /// Hash of the ballot being voted on, when not carried inline.
    pub proposal_hash: Option<[u8; 32]>,
    /// The full ballot, on creation.
    pub proposal: Option<Ballot>,
}

/// The discriminator of a payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize)]
pub enum PayloadKind {
    /// Contract call or creation.
    Call,
    /// Value transfer.
    Send,
    /// Name registry operation.
    Name,
    /// Bond balance into validator power.
    Bond,
    /// Unbond validator power back to balance.
    Unbond,
    /// Permission or role mutation.
    Permission,
    /// Template-driven account upsert.
    Governance,
    /// Ballot creation or vote.
    Proposal,
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PayloadKind::Call => "CallTx",
            PayloadKind::Send => "SendTx",
            PayloadKind::Name => "NameTx",
            PayloadKind::Bond => "BondTx",
            PayloadKind::Unbond => "UnbondTx",
            PayloadKind::Permission => "PermTx",
            PayloadKind::Governance => "GovTx",
            PayloadKind::Proposal => "ProposalTx",
        };
        f.write_str(name)
    }
}

/// The semantic transaction body.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum Payload {
    /// Contract call or creation.
    Call(CallTx),
    /// Value transfer.
    Send(SendTx),
    /// Name registry operation.
    Name(NameTx),
    /// Bond balance into validator power.
    Bond(BondTx),
    /// Unbond validator power back to balance.
    Unbond(UnbondTx),
    /// Permission or role mutation.
    Permission(PermTx),
    /// Template-driven account upsert.
    Governance(GovTx),
    /// Ballot creation or vote.
    Proposal(ProposalTx),
}

impl Payload {
    /// The kind discriminator.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Call(_) => PayloadKind::Call,
            Payload::Send(_) => PayloadKind::Send,
            Payload::Name(_) => PayloadKind::Name,
            Payload::Bond(_) => PayloadKind::Bond,
            Payload::Unbond(_) => PayloadKind::Unbond,
            Payload::Permission(_) => PayloadKind::Permission,
            Payload::Governance(_) => PayloadKind::Governance,
            Payload::Proposal(_) => PayloadKind::Proposal,
        }
    }

    /// All spending inputs, in payload order.
    pub fn inputs(&self) -> Vec<&TxInput> {
        match self {
            Payload::Call(tx) => vec![&tx.input],
            Payload::Send(tx) => tx.inputs.iter().collect(),
            Payload::Name(tx) => vec![&tx.input],
            Payload::Bond(tx) => vec![&tx.input],
            Payload::Unbond(tx) => vec![&tx.input],
            Payload::Permission(tx) => vec![&tx.input],
            Payload::Governance(tx) => tx.inputs.iter().collect(),
            Payload::Proposal(tx) => vec![&tx.input],
        }
    }

    /// Mutable access to the spending inputs, for sequence assignment.
    pub fn inputs_mut(&mut self) -> Vec<&mut TxInput> {
        match self {
            Payload::Call(tx) => vec![&mut tx.input],
            Payload::Send(tx) => tx.inputs.iter_mut().collect(),
            Payload::Name(tx) => vec![&mut tx.input],
            Payload::Bond(tx) => vec![&mut tx.input],
            Payload::Unbond(tx) => vec![&mut tx.input],
            Payload::Permission(tx) => vec![&mut tx.input],
            Payload::Governance(tx) => tx.inputs.iter_mut().collect(),
            Payload::Proposal(tx) => vec![&mut tx.input],
        }
    }
}
