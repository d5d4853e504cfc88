// Path: crates/types/src/account.rs
//! The ledger account record.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::crypto::{Address, PublicKey};
use crate::error::ExecutionError;
use crate::permissions::Permissions;

/// A ledger account: balance, replay-protection sequence, optional contract
/// code and the permission bitmap.
///
/// The public key is absent until the first signed transaction from the
/// address is seen, at which point it is filled from the signatory set.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Account {
    /// The 20-byte account identifier.
    pub address: Address,
    /// Spendable balance.
    pub balance: u64,
    /// Monotonic counter; increases by exactly 1 per successful input.
    pub sequence: u64,
    /// Contract code; empty for plain accounts. Immutable once non-empty.
    pub code: Vec<u8>,
    /// Filled upon the first signed transaction from this address.
    pub public_key: Option<PublicKey>,
    /// Permission bitmap, set-bit mask and roles.
    pub permissions: Permissions,
    /// Hash of off-chain contract metadata, if registered.
    pub metadata_hash: Option<[u8; 32]>,
}

impl Account {
    /// A fresh zero-balance account with no permissions of its own.
    pub fn new(address: Address) -> Self {
        Account {
            address,
            balance: 0,
            sequence: 0,
            code: Vec::new(),
            public_key: None,
            permissions: Permissions::default(),
            metadata_hash: None,
        }
    }

    /// Whether this account carries contract code.
    pub fn is_contract(&self) -> bool {
        !self.code.is_empty()
    }

    /// Deducts `amount`, failing with `InsufficientFunds` on underflow.
    pub fn subtract_from_balance(&mut self, amount: u64) -> Result<(), ExecutionError> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(ExecutionError::InsufficientFunds {
                address: self.address,
                balance: self.balance,
                amount,
            })?;
        Ok(())
    }

    /// Adds `amount`, failing with `BalanceOverflow` on overflow.
    pub fn add_to_balance(&mut self, amount: u64) -> Result<(), ExecutionError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(ExecutionError::BalanceOverflow(self.address))?;
        Ok(())
    }

    /// Installs contract code. Code is write-once.
    pub fn set_code(&mut self, code: Vec<u8>) -> Result<(), ExecutionError> {
        if self.is_contract() {
            return Err(ExecutionError::CodeAlreadySet(self.address));
        }
        self.code = code;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;

    #[test]
    fn balance_never_underflows() {
        let mut acc = Account::new(PrivateKey::from_secret("a").address());
        acc.balance = 10;
        assert!(acc.subtract_from_balance(11).is_err());
        assert_eq!(acc.balance, 10);
        acc.subtract_from_balance(10).unwrap();
        assert_eq!(acc.balance, 0);
    }

    #[test]
    fn code_is_write_once() {
        let mut acc = Account::new(PrivateKey::from_secret("c").address());
        acc.set_code(vec![0x60]).unwrap();
        assert!(acc.set_code(vec![0x61]).is_err());
        assert_eq!(acc.code, vec![0x60]);
    }
}
