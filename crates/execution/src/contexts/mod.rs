// Path: crates/execution/src/contexts/mod.rs
//! Per-payload execution rules.
//!
//! Dispatch is a fixed match on the closed payload union, so a new payload
//! kind cannot be added without the compiler pointing here. Every context
//! shares the same preconditions: the input account exists, holds the
//! required permission, and its sequence follows on from committed state.
//! Mutations land in the nested cache the executor hands in; the executor
//! merges or discards it based on the returned result.

mod bond;
mod call;
mod governance;
mod name;
mod permission;
mod proposal;
mod send;

pub use call::VmStateAdapter;
pub use name::{rent_per_block, MIN_NAME_LEASE_BLOCKS, NAME_COST_BASE, NAME_COST_PER_BLOCK};
pub use proposal::{PROPOSAL_PASS_DENOMINATOR, PROPOSAL_PASS_NUMERATOR};

use arbor_state::{AccountReader, BlockState};
use arbor_types::error::ExecutionError;
use arbor_types::{Account, Address, Payload, PermFlag, TxExecution, TxInput};
use arbor_vm::Vm;

/// Address of the account holding the chain's default (global) permission
/// bitmap.
pub const GLOBAL_PERMISSIONS_ADDRESS: Address = Address([0u8; 20]);

/// Everything a context needs besides the execution record itself.
pub struct ContextEnv<'a> {
    /// The nested cache this transaction writes into.
    pub state: &'a BlockState,
    /// Height of the block being executed.
    pub height: u64,
    /// The contract execution engine.
    pub vm: &'a dyn Vm,
    /// Recursion depth; ballot batches execute one level deep.
    pub depth: u32,
}

/// Dispatches a payload to its context.
pub fn execute_payload(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    payload: &Payload,
) -> Result<(), ExecutionError> {
    match payload {
        Payload::Call(tx) => call::execute(env, txe, tx),
        Payload::Send(tx) => send::execute(env, txe, tx),
        Payload::Name(tx) => name::execute(env, txe, tx),
        Payload::Bond(tx) => bond::execute(env, txe, tx),
        Payload::Unbond(tx) => bond::execute_unbond(env, txe, tx),
        Payload::Permission(tx) => permission::execute(env, txe, tx),
        Payload::Governance(tx) => governance::execute(env, txe, tx),
        Payload::Proposal(tx) => proposal::execute(env, txe, tx),
    }
}

/// Loads and validates a spending input: the account must exist and the
/// input sequence must be exactly `account.sequence + 1`. On success the
/// returned account already carries the bumped sequence and, if it was
/// empty, the public key taken from the envelope's signatories.
pub(crate) fn validate_input(
    env: &ContextEnv<'_>,
    txe: &TxExecution,
    input: &TxInput,
) -> Result<Account, ExecutionError> {
    let mut account = env
        .state
        .accounts
        .get_account(&input.address)?
        .ok_or(ExecutionError::UnknownAccount(input.address))?;
    let expected = account.sequence + 1;
    if input.sequence != expected {
        return Err(ExecutionError::BadSequence {
            expected,
            got: input.sequence,
        });
    }
    account.sequence = expected;
    if account.public_key.is_none() {
        account.public_key = txe.envelope.signatory_key(&input.address).cloned();
    }
    Ok(account)
}

/// Whether `account` holds `flag`, falling back to the global default
/// account for unset bits.
pub(crate) fn has_permission(
    env: &ContextEnv<'_>,
    account: &Account,
    flag: PermFlag,
) -> Result<bool, ExecutionError> {
    if let Some(value) = account.permissions.get(flag) {
        return Ok(value);
    }
    let global = env.state.accounts.get_account(&GLOBAL_PERMISSIONS_ADDRESS)?;
    Ok(global
        .and_then(|acc| acc.permissions.get(flag))
        .unwrap_or(false))
}

/// `has_permission` as a precondition.
pub(crate) fn require_permission(
    env: &ContextEnv<'_>,
    account: &Account,
    flag: PermFlag,
) -> Result<(), ExecutionError> {
    if has_permission(env, account, flag)? {
        Ok(())
    } else {
        Err(ExecutionError::PermissionDenied {
            address: account.address,
            perm: flag.name(),
        })
    }
}

/// Loads an account, creating a fresh one if absent. Creation requires the
/// `authorizer` to hold `createAccount`.
pub(crate) fn get_or_create_account(
    env: &ContextEnv<'_>,
    authorizer: &Account,
    address: &Address,
) -> Result<Account, ExecutionError> {
    if let Some(account) = env.state.accounts.get_account(address)? {
        return Ok(account);
    }
    require_permission(env, authorizer, PermFlag::CreateAccount)?;
    Ok(Account::new(*address))
}
