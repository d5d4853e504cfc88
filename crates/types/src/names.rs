// Path: crates/types/src/names.rs
//! Name registry entries.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::crypto::Address;

/// A name registry entry leasing a UTF-8 name to an owner until an expiry
/// height.
///
/// An entry whose lease has lapsed (`height >= expires`) is treated as
/// absent for ownership checks but stays physically present until a later
/// registration overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct NameEntry {
    /// The registered name.
    pub name: String,
    /// The registrant; only the owner may update or extend a live entry.
    pub owner: Address,
    /// Arbitrary data attached to the name.
    pub data: String,
    /// First height at which the lease is no longer live.
    pub expires: u64,
}

impl NameEntry {
    /// Whether the lease is still live at `height`.
    pub fn is_live_at(&self, height: u64) -> bool {
        height < self.expires
    }
}
