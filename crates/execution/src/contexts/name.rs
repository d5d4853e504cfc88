// Path: crates/execution/src/contexts/name.rs
//! The name registry: rent-priced leases on UTF-8 names.
//!
//! The fee is the input amount; the lease length it buys scales inversely
//! with the data size. A live entry is owned; an expired entry is treated
//! as absent for ownership and is overwritten in place by the next
//! registration.

use arbor_state::{AccountWriter, NameReader, NameWriter};
use arbor_types::error::ExecutionError;
use arbor_types::{Event, NameEntry, NameTx, PermFlag, TxExecution};

use super::{require_permission, validate_input, ContextEnv};

/// Flat per-block cost component of a name lease.
pub const NAME_COST_BASE: u64 = 1;
/// Per-data-byte, per-block cost component.
pub const NAME_COST_PER_BLOCK: u64 = 1;
/// Shortest lease a registration may buy.
pub const MIN_NAME_LEASE_BLOCKS: u64 = 5;

/// The per-block rent for an entry with `data_len` bytes of data.
pub fn rent_per_block(data_len: usize) -> u64 {
    NAME_COST_PER_BLOCK * (NAME_COST_BASE + data_len as u64)
}

pub fn execute(
    env: &ContextEnv<'_>,
    txe: &mut TxExecution,
    tx: &NameTx,
) -> Result<(), ExecutionError> {
    if tx.name.is_empty() {
        return Err(ExecutionError::Invalid("empty name".to_string()));
    }
    let mut account = validate_input(env, txe, &tx.input)?;
    require_permission(env, &account, PermFlag::Name)?;

    let fee = tx.input.amount;
    let rate = rent_per_block(tx.data.len());
    let blocks = fee / rate;
    if blocks < MIN_NAME_LEASE_BLOCKS {
        return Err(ExecutionError::InsufficientFee {
            fee,
            blocks: MIN_NAME_LEASE_BLOCKS,
        });
    }

    let existing = env.state.names.get_name(&tx.name)?;
    let entry = match existing {
        Some(entry) if entry.is_live_at(env.height) => {
            if entry.owner != account.address {
                return Err(ExecutionError::NameOwnership {
                    name: tx.name.clone(),
                    owner: entry.owner,
                });
            }
            // Owner renewal: the fee extends the lease; data is replaced.
            NameEntry {
                name: tx.name.clone(),
                owner: entry.owner,
                data: tx.data.clone(),
                expires: entry.expires + blocks,
            }
        }
        // Absent, or expired and therefore up for grabs.
        _ => NameEntry {
            name: tx.name.clone(),
            owner: account.address,
            data: tx.data.clone(),
            expires: env.height + blocks,
        },
    };

    account.subtract_from_balance(fee)?;
    env.state.accounts.update_account(account)?;

    txe.push_event(Event::NameUpdated {
        name: entry.name.clone(),
        owner: entry.owner,
        expires: entry.expires,
    });
    env.state.names.update_name(entry)?;
    Ok(())
}
