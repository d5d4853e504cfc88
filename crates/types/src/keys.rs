// Path: crates/types/src/keys.rs
//! Well-known key prefixes of the persistent forest.
//!
//! Each prefix names one sub-tree. Sub-tree keys are the byte concatenation
//! of the prefix and the entity key; values are canonical encodings.

use crate::crypto::Address;

/// Sub-tree of account records, keyed by address bytes.
pub const ACCOUNT_PREFIX: &[u8] = b"acc/";
/// Sub-tree of name entries, keyed by UTF-8 name bytes.
pub const NAME_PREFIX: &[u8] = b"name/";
/// Sub-tree of contract storage, keyed by `<address>/<storage key>`.
pub const STORAGE_PREFIX: &[u8] = b"storage/";
/// Sub-tree of validator powers, keyed by canonical public key bytes.
pub const VALIDATOR_PREFIX: &[u8] = b"validator/";
/// Sub-tree of ballots, keyed by proposal hash.
pub const PROPOSAL_PREFIX: &[u8] = b"proposal/";
/// Sub-tree of committed `TxExecution`s, keyed by `(height, offset)`.
pub const TX_PREFIX: &[u8] = b"txs/";

/// Key of an account record inside the account sub-tree.
pub fn account_key(address: &Address) -> Vec<u8> {
    address.as_bytes().to_vec()
}

/// Key of a contract storage cell inside the storage sub-tree.
pub fn storage_key(address: &Address, key: &[u8]) -> Vec<u8> {
    let mut k = Vec::with_capacity(address.as_bytes().len() + 1 + key.len());
    k.extend_from_slice(address.as_bytes());
    k.push(b'/');
    k.extend_from_slice(key);
    k
}

/// Key of a committed `TxExecution` inside the tx sub-tree: big-endian
/// height then offset, so iteration is chain order.
pub fn tx_key(height: u64, index: u32) -> Vec<u8> {
    let mut k = Vec::with_capacity(12);
    k.extend_from_slice(&height.to_be_bytes());
    k.extend_from_slice(&index.to_be_bytes());
    k
}
