// Path: crates/execution/src/contexts/governance.rs
//! Template-driven account surgery, gated on root.

use arbor_state::{AccountReader, AccountWriter};
use arbor_types::error::ExecutionError;
use arbor_types::{Account, AccountUpdate, Event, GovTx, PermFlag, TxExecution};

use super::{require_permission, validate_input, ContextEnv};

pub fn execute(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    tx: &GovTx,
) -> Result<(), ExecutionError> {
    if tx.inputs.is_empty() {
        return Err(ExecutionError::Invalid(
            "governance requires at least one input".to_string(),
        ));
    }
    for input in &tx.inputs {
        let account = validate_input(env, txe, input)?;
        require_permission(env, &account, PermFlag::Root)?;
        env.state.accounts.update_account(account)?;
    }

    for update in &tx.updates {
        apply_update(env, txe, update)?;
    }
    Ok(())
}

fn apply_update(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    update: &AccountUpdate,
) -> Result<(), ExecutionError> {
    let mut account = env
        .state
        .accounts
        .get_account(&update.address)?
        .unwrap_or_else(|| Account::new(update.address));

    if let Some(balance) = update.balance {
        account.balance = balance;
    }
    if let Some(code) = &update.code {
        account.set_code(code.clone())?;
    }
    if let Some(permissions) = &update.permissions {
        account.permissions = permissions.clone();
    }
    if let Some(roles) = &update.roles {
        account.permissions.roles = roles.clone();
    }
    if let Some(power) = update.power {
        let public_key = account.public_key.clone().ok_or_else(|| {
            ExecutionError::Invalid(format!(
                "cannot set power for {}: no public key on record",
                account.address
            ))
        })?;
        let current = env.state.validators.power(&public_key)? as i128;
        env.state
            .validators
            .alter_power(&public_key, power as i128 - current)?;
    }

    env.state.accounts.update_account(account)?;
    txe.push_event(Event::GovernanceApplied {
        address: update.address,
    });
    Ok(())
}
