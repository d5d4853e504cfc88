// Path: crates/execution/src/contexts/bond.rs
//! Bond and unbond: moving balance into and out of validator power.

use arbor_state::AccountWriter;
use arbor_types::error::ExecutionError;
use arbor_types::{BondTx, CurveType, Event, PermFlag, TxExecution, UnbondTx};

use super::{require_permission, validate_input, ContextEnv};

/// Deducts the bonded amount from the input balance and adds it to the
/// validator power of the account's public key, creating the validator
/// entry if new. Simultaneous bonds in one block accumulate through the
/// delta set.
pub fn execute(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    tx: &BondTx,
) -> Result<(), ExecutionError> {
    let mut account = validate_input(env, txe, &tx.input)?;

    // Validator keys must be ed25519 in this network.
    let public_key = account
        .public_key
        .clone()
        .ok_or(ExecutionError::UnknownAccount(account.address))?;
    if public_key.curve_type() == CurveType::Secp256k1 {
        return Err(ExecutionError::UnsupportedCurve("secp256k1"));
    }

    require_permission(env, &account, PermFlag::Bond)?;

    let amount = tx.input.amount;
    if amount == 0 {
        return Err(ExecutionError::ZeroAmount);
    }
    account.subtract_from_balance(amount)?;

    let power = env.state.validators.alter_power(&public_key, amount as i128)?;
    env.state.accounts.update_account(account)?;

    txe.push_event(Event::Bond {
        validator: public_key,
        amount,
        power,
    });
    Ok(())
}

/// The symmetric context: decrements validator power and returns the
/// amount to the account balance.
pub fn execute_unbond(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    tx: &UnbondTx,
) -> Result<(), ExecutionError> {
    let mut account = validate_input(env, txe, &tx.input)?;

    let public_key = account
        .public_key
        .clone()
        .ok_or(ExecutionError::UnknownAccount(account.address))?;

    require_permission(env, &account, PermFlag::Bond)?;

    let amount = tx.input.amount;
    if amount == 0 {
        return Err(ExecutionError::ZeroAmount);
    }
    let power = env
        .state
        .validators
        .alter_power(&public_key, -(amount as i128))?;
    account.add_to_balance(amount)?;
    env.state.accounts.update_account(account)?;

    txe.push_event(Event::Unbond {
        validator: public_key,
        amount,
        power,
    });
    Ok(())
}
