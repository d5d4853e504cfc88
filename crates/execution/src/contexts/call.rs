// Path: crates/execution/src/contexts/call.rs
//! Contract invocation and creation.
//!
//! VM effects run against a further nested cache so that a revert can
//! discard them while the sequence bump and the gas charge survive in the
//! transaction's own cache. A revert is recorded as an exception on the
//! execution record but returned as success to the executor; hard VM
//! faults propagate as errors and consume nothing.

use arbor_state::{AccountReader, AccountWriter, BlockState, StorageCache};
use arbor_types::crypto::contract_address;
use arbor_types::error::ExecutionError;
use arbor_types::exec::TxResult;
use arbor_types::{Address, CallTx, Event, PermFlag, TxExecution};
use arbor_vm::{CallParams, CallState, VmError};

use super::{require_permission, validate_input, ContextEnv};

/// Bridges the VM's storage interface onto a storage cache scoped to one
/// contract address.
pub struct VmStateAdapter<'a> {
    storage: &'a StorageCache,
    address: Address,
}

impl<'a> VmStateAdapter<'a> {
    /// An adapter for `address`'s cells.
    pub fn new(storage: &'a StorageCache, address: Address) -> Self {
        VmStateAdapter { storage, address }
    }
}

impl CallState for VmStateAdapter<'_> {
    fn get_storage(&self, key: &[u8]) -> Result<Vec<u8>, VmError> {
        self.storage
            .get_storage(&self.address, key)
            .map(Option::unwrap_or_default)
            .map_err(|e| VmError::Host(e.to_string()))
    }

    fn set_storage(&mut self, key: &[u8], value: &[u8]) -> Result<(), VmError> {
        self.storage.set_storage(&self.address, key, value);
        Ok(())
    }
}

pub fn execute(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    tx: &CallTx,
) -> Result<(), ExecutionError> {
    let mut caller = validate_input(env, txe, &tx.input)?;
    let value = tx.input.amount;

    let (callee_address, code, creating) = match tx.address {
        Some(address) => {
            require_permission(env, &caller, PermFlag::Call)?;
            let callee = env
                .state
                .accounts
                .get_account(&address)?
                .ok_or(ExecutionError::UnknownAccount(address))?;
            (address, callee.code, false)
        }
        None => {
            require_permission(env, &caller, PermFlag::CreateContract)?;
            if tx.data.is_empty() {
                return Err(ExecutionError::Invalid(
                    "contract creation without init code".to_string(),
                ));
            }
            let address = contract_address(&caller.address, tx.input.sequence);
            (address, tx.data.clone(), true)
        }
    };

    if caller.balance < value {
        return Err(ExecutionError::InsufficientFunds {
            address: caller.address,
            balance: caller.balance,
            amount: value,
        });
    }

    // VM effects land one cache deeper so a revert can drop them without
    // losing the sequence bump and gas charge recorded at this level.
    let vm_state = env.state.child();
    transfer_value(&vm_state, &caller, callee_address, value, creating)?;

    let params = CallParams {
        caller: caller.address.0,
        callee: callee_address.0,
        input: if creating { Vec::new() } else { tx.data.clone() },
        value,
        gas_limit: tx.gas_limit,
    };
    let mut adapter = VmStateAdapter::new(&vm_state.storage, callee_address);
    let outcome = env.vm.execute(&mut adapter, &code, &params);

    match outcome {
        Ok(output) => {
            if creating {
                let mut contract = vm_state
                    .accounts
                    .get_account(&callee_address)?
                    .ok_or(ExecutionError::UnknownAccount(callee_address))?;
                // The init code's return value is the runtime code.
                contract.set_code(output.return_data.clone())?;
                vm_state.accounts.update_account(contract)?;
                txe.push_event(Event::ContractCreated {
                    address: callee_address,
                });
            }
            env.state.absorb(&vm_state)?;

            let mut caller = env
                .state
                .accounts
                .get_account(&tx.input.address)?
                .ok_or(ExecutionError::UnknownAccount(tx.input.address))?;
            caller.balance = caller.balance.saturating_sub(output.gas_used);
            env.state.accounts.update_account(caller)?;

            txe.push_event(Event::Call {
                caller: tx.input.address,
                callee: callee_address,
                value,
                gas_used: output.gas_used,
            });
            txe.result = Some(TxResult {
                return_data: output.return_data,
                gas_used: output.gas_used,
            });
            Ok(())
        }
        Err(VmError::Reverted { data, gas_used }) => {
            // VM effects are dropped with vm_state; the gas charge and the
            // bumped sequence persist at this level.
            drop(vm_state);
            caller.balance = caller.balance.saturating_sub(gas_used);
            env.state.accounts.update_account(caller)?;
            txe.result = Some(TxResult {
                return_data: data,
                gas_used,
            });
            txe.set_exception(&ExecutionError::Reverted);
            txe.push_event(Event::Call {
                caller: tx.input.address,
                callee: callee_address,
                value,
                gas_used,
            });
            Ok(())
        }
        Err(fault) => Err(ExecutionError::VmFault(fault.to_string())),
    }
}

// Applies the pre-call balance transfer inside the VM-level cache, creating
// the contract account when this call deploys one.
fn transfer_value(
    vm_state: &BlockState,
    caller: &arbor_types::Account,
    callee_address: Address,
    value: u64,
    creating: bool,
) -> Result<(), ExecutionError> {
    let mut caller = caller.clone();
    caller.subtract_from_balance(value)?;
    vm_state.accounts.update_account(caller)?;

    let mut callee = match vm_state.accounts.get_account(&callee_address)? {
        Some(account) => account,
        None if creating => arbor_types::Account::new(callee_address),
        None => return Err(ExecutionError::UnknownAccount(callee_address)),
    };
    callee.add_to_balance(value)?;
    vm_state.accounts.update_account(callee)?;
    Ok(())
}
