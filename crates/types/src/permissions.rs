// Path: crates/types/src/permissions.rs
//! Account permission bitmap with a set-bit mask and string roles.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single permission bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum PermFlag {
    /// Unrestricted; implies every other permission.
    Root = 1 << 0,
    /// May transfer value via SendTx.
    Send = 1 << 1,
    /// May invoke contract code via CallTx.
    Call = 1 << 2,
    /// May create contract accounts from CallTx init code.
    CreateContract = 1 << 3,
    /// May create plain accounts as SendTx outputs.
    CreateAccount = 1 << 4,
    /// May bond balance into validator power.
    Bond = 1 << 5,
    /// May register and update name entries.
    Name = 1 << 6,
    /// May create and vote on proposals.
    Propose = 1 << 7,
    /// May alter global (default) permissions.
    SetGlobal = 1 << 8,
    /// May alter other accounts' permissions and roles.
    SetPermission = 1 << 9,
}

impl PermFlag {
    /// Human-readable permission name, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PermFlag::Root => "root",
            PermFlag::Send => "send",
            PermFlag::Call => "call",
            PermFlag::CreateContract => "createContract",
            PermFlag::CreateAccount => "createAccount",
            PermFlag::Bond => "bond",
            PermFlag::Name => "name",
            PermFlag::Propose => "propose",
            PermFlag::SetGlobal => "setGlobal",
            PermFlag::SetPermission => "setPermission",
        }
    }
}

/// Every bit the protocol knows about. Mutations outside this mask are
/// rejected so that stale software cannot set bits a future version assigns
/// a meaning to.
pub const ALL_PERM_FLAGS: u64 = (1 << 10) - 1;

/// Permission bitmap plus the mask of bits that have been explicitly set.
///
/// An unset bit falls back to the chain's global default account, so the
/// bitmap alone cannot distinguish "denied" from "unspecified".
#[derive(Debug, Clone, PartialEq, Eq, Default, Encode, Decode, Serialize, Deserialize)]
pub struct Permissions {
    /// The permission bits.
    pub perms: u64,
    /// Which bits of `perms` are explicitly set.
    pub set_bit: u64,
    /// String roles granted to the account.
    pub roles: BTreeSet<String>,
}

impl Permissions {
    /// Permissions with the given flags explicitly granted.
    pub fn with_flags(flags: &[PermFlag]) -> Self {
        let mut p = Permissions::default();
        for flag in flags {
            p.set(*flag, true);
        }
        p
    }

    /// Whether `flag` is explicitly known (set or unset) on this bitmap.
    pub fn is_set(&self, flag: PermFlag) -> bool {
        self.set_bit & flag as u64 != 0
    }

    /// Whether `flag` is granted. Root implies everything. Returns `None`
    /// when the bit is not explicitly set and the caller should consult the
    /// global defaults.
    pub fn get(&self, flag: PermFlag) -> Option<bool> {
        if self.set_bit & PermFlag::Root as u64 != 0 && self.perms & PermFlag::Root as u64 != 0 {
            return Some(true);
        }
        if self.is_set(flag) {
            Some(self.perms & flag as u64 != 0)
        } else {
            None
        }
    }

    /// Explicitly sets or clears `flag`.
    pub fn set(&mut self, flag: PermFlag, value: bool) {
        let bit = flag as u64;
        self.set_bit |= bit;
        if value {
            self.perms |= bit;
        } else {
            self.perms &= !bit;
        }
    }

    /// Clears the explicit setting for `flag`, deferring to global defaults.
    pub fn unset(&mut self, flag: PermFlag) {
        let bit = flag as u64;
        self.set_bit &= !bit;
        self.perms &= !bit;
    }

    /// Grants a role; returns false if already present.
    pub fn add_role(&mut self, role: &str) -> bool {
        self.roles.insert(role.to_string())
    }

    /// Revokes a role; returns false if absent.
    pub fn remove_role(&mut self, role: &str) -> bool {
        self.roles.remove(role)
    }

    /// Whether the account holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_bits_defer() {
        let mut p = Permissions::default();
        assert_eq!(p.get(PermFlag::Send), None);
        p.set(PermFlag::Send, false);
        assert_eq!(p.get(PermFlag::Send), Some(false));
        p.set(PermFlag::Send, true);
        assert_eq!(p.get(PermFlag::Send), Some(true));
        p.unset(PermFlag::Send);
        assert_eq!(p.get(PermFlag::Send), None);
    }

    #[test]
    fn root_implies_everything() {
        let p = Permissions::with_flags(&[PermFlag::Root]);
        assert_eq!(p.get(PermFlag::Bond), Some(true));
        assert_eq!(p.get(PermFlag::SetPermission), Some(true));
    }

    #[test]
    fn roles_accumulate() {
        let mut p = Permissions::default();
        assert!(p.add_role("oracle"));
        assert!(!p.add_role("oracle"));
        assert!(p.has_role("oracle"));
        assert!(p.remove_role("oracle"));
        assert!(!p.has_role("oracle"));
    }
}
