// Path: crates/execution/src/contexts/send.rs
//! Multi-input, multi-output value transfer.

use arbor_state::{AccountReader, AccountWriter};
use arbor_types::error::ExecutionError;
use arbor_types::{Event, PermFlag, SendTx, TxExecution};

use super::{get_or_create_account, require_permission, validate_input, ContextEnv};

pub fn execute(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    tx: &SendTx,
) -> Result<(), ExecutionError> {
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(ExecutionError::Invalid(
            "send requires at least one input and one output".to_string(),
        ));
    }
    let total_in: u64 = tx
        .inputs
        .iter()
        .try_fold(0u64, |acc, input| acc.checked_add(input.amount))
        .ok_or(ExecutionError::Invalid("input total overflows".to_string()))?;
    let total_out: u64 = tx
        .outputs
        .iter()
        .try_fold(0u64, |acc, output| acc.checked_add(output.amount))
        .ok_or(ExecutionError::Invalid("output total overflows".to_string()))?;
    if total_in != total_out {
        return Err(ExecutionError::Invalid(format!(
            "send does not conserve value: inputs {total_in}, outputs {total_out}"
        )));
    }
    if total_in == 0 {
        return Err(ExecutionError::ZeroAmount);
    }

    // Debit every input before any credit, so a failing input rolls the
    // whole transfer back through the nested cache.
    let mut first_input = None;
    for input in &tx.inputs {
        let mut account = validate_input(env, txe, input)?;
        require_permission(env, &account, PermFlag::Send)?;
        account.subtract_from_balance(input.amount)?;
        env.state.accounts.update_account(account)?;
        if first_input.is_none() {
            first_input = Some(input.address);
        }
    }
    let authorizer = env
        .state
        .accounts
        .get_account(&first_input.ok_or(ExecutionError::ZeroAmount)?)?
        .ok_or(ExecutionError::ZeroAmount)?;

    for output in &tx.outputs {
        let mut account = get_or_create_account(env, &authorizer, &output.address)?;
        account.add_to_balance(output.amount)?;
        env.state.accounts.update_account(account)?;
        txe.push_event(Event::Transfer {
            from: authorizer.address,
            to: output.address,
            amount: output.amount,
        });
    }
    Ok(())
}
