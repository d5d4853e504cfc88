// Path: crates/execution/src/simulate.rs
//! Read-only call simulation against committed state.
//!
//! Simulations execute against a throwaway cache bundle that is never
//! merged, so no mutation can escape. The RPC layer serializes them behind
//! a single simulation lock.

use std::sync::Arc;

use arbor_state::{AccountReader, AccountWriter, State};
use arbor_types::error::ExecutionError;
use arbor_types::{Account, Address, CallTx, Envelope, Payload, TxExecution, TxInput};
use arbor_vm::Vm;

use crate::contexts::{execute_payload, ContextEnv};

/// Simulates a call to `callee` from `caller` with `data`, against the
/// latest committed state. The returned record is never persisted.
pub fn call_sim(
    state: &Arc<State>,
    chain_id: &str,
    height: u64,
    caller: Address,
    callee: Address,
    data: Vec<u8>,
    gas_limit: u64,
    vm: &dyn Vm,
) -> Result<TxExecution, ExecutionError> {
    let sequence = state
        .get_account(&caller)?
        .map(|acc| acc.sequence + 1)
        .unwrap_or(1);
    let tx = CallTx {
        input: TxInput {
            address: caller,
            amount: 0,
            sequence,
        },
        address: Some(callee),
        gas_limit,
        data,
    };
    simulate(state, chain_id, height, Payload::Call(tx), vm, None)
}

/// Simulates `code` as if it were deployed at a scratch address, invoked
/// from `caller` with `data`.
pub fn call_code_sim(
    state: &Arc<State>,
    chain_id: &str,
    height: u64,
    caller: Address,
    code: Vec<u8>,
    data: Vec<u8>,
    gas_limit: u64,
    vm: &dyn Vm,
) -> Result<TxExecution, ExecutionError> {
    // Deterministic scratch address, far away from real accounts.
    let mut scratch = [0xffu8; 20];
    scratch[..4].copy_from_slice(b"sim/");
    let scratch = Address(scratch);
    let sequence = state
        .get_account(&caller)?
        .map(|acc| acc.sequence + 1)
        .unwrap_or(1);
    let tx = CallTx {
        input: TxInput {
            address: caller,
            amount: 0,
            sequence,
        },
        address: Some(scratch),
        gas_limit,
        data,
    };
    simulate(
        state,
        chain_id,
        height,
        Payload::Call(tx),
        vm,
        Some((scratch, code)),
    )
}

fn simulate(
    state: &Arc<State>,
    chain_id: &str,
    height: u64,
    payload: Payload,
    vm: &dyn Vm,
    scratch_contract: Option<(Address, Vec<u8>)>,
) -> Result<TxExecution, ExecutionError> {
    let block_state = state.block_state();

    // Simulations bypass signature checks: grant the caller a root-ish
    // scratch world inside the throwaway cache only.
    if let Some(input) = payload.inputs().first() {
        let address = input.address;
        let mut account = block_state
            .accounts
            .get_account(&address)?
            .unwrap_or_else(|| Account::new(address));
        let mut perms = account.permissions.clone();
        perms.set(arbor_types::PermFlag::Call, true);
        account.permissions = perms;
        block_state.accounts.update_account(account)?;
    }
    if let Some((address, code)) = scratch_contract {
        let mut account = Account::new(address);
        account.code = code;
        block_state.accounts.update_account(account)?;
    }

    let envelope = Envelope::enclose(chain_id, payload.clone());
    let mut txe = TxExecution::new(height, 0, envelope);
    let env = ContextEnv {
        state: &block_state,
        height,
        vm,
        depth: 0,
    };
    match execute_payload(&env, &mut txe, &payload) {
        Ok(()) => Ok(txe),
        Err(err) => {
            txe.set_exception(&err);
            Ok(txe)
        }
    }
    // block_state drops here; nothing was merged or committed.
}
