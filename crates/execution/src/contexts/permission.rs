// Path: crates/execution/src/contexts/permission.rs
//! Permission bit and role mutation.

use arbor_state::{AccountReader, AccountWriter};
use arbor_types::error::ExecutionError;
use arbor_types::permissions::ALL_PERM_FLAGS;
use arbor_types::{Event, PermAction, PermFlag, PermTx, TxExecution};

use super::{require_permission, validate_input, ContextEnv};

// The known flag for a raw permission bit, rejecting anything outside the
// protocol mask.
fn known_flag(raw: u64) -> Result<PermFlag, ExecutionError> {
    if raw & !ALL_PERM_FLAGS != 0 || raw.count_ones() != 1 {
        return Err(ExecutionError::Invalid(format!(
            "unknown permission bit {raw:#x}"
        )));
    }
    let flag = match raw {
        x if x == PermFlag::Root as u64 => PermFlag::Root,
        x if x == PermFlag::Send as u64 => PermFlag::Send,
        x if x == PermFlag::Call as u64 => PermFlag::Call,
        x if x == PermFlag::CreateContract as u64 => PermFlag::CreateContract,
        x if x == PermFlag::CreateAccount as u64 => PermFlag::CreateAccount,
        x if x == PermFlag::Bond as u64 => PermFlag::Bond,
        x if x == PermFlag::Name as u64 => PermFlag::Name,
        x if x == PermFlag::Propose as u64 => PermFlag::Propose,
        x if x == PermFlag::SetGlobal as u64 => PermFlag::SetGlobal,
        x if x == PermFlag::SetPermission as u64 => PermFlag::SetPermission,
        _ => {
            return Err(ExecutionError::Invalid(format!(
                "unknown permission bit {raw:#x}"
            )))
        }
    };
    Ok(flag)
}

pub fn execute(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    tx: &PermTx,
) -> Result<(), ExecutionError> {
    let account = validate_input(env, txe, &tx.input)?;
    require_permission(env, &account, PermFlag::SetPermission)?;

    let mut target = env
        .state
        .accounts
        .get_account(&tx.target)?
        .ok_or(ExecutionError::UnknownAccount(tx.target))?;

    match &tx.action {
        PermAction::SetBase { permission, value } => {
            target.permissions.set(known_flag(*permission)?, *value);
        }
        PermAction::UnsetBase { permission } => {
            target.permissions.unset(known_flag(*permission)?);
        }
        PermAction::AddRole(role) => {
            if !target.permissions.add_role(role) {
                return Err(ExecutionError::Invalid(format!(
                    "account {} already has role '{role}'",
                    target.address
                )));
            }
        }
        PermAction::RemoveRole(role) => {
            if !target.permissions.remove_role(role) {
                return Err(ExecutionError::Invalid(format!(
                    "account {} does not have role '{role}'",
                    target.address
                )));
            }
        }
    }

    env.state.accounts.update_account(account)?;
    env.state.accounts.update_account(target)?;
    txe.push_event(Event::PermissionsChanged { target: tx.target });
    Ok(())
}
