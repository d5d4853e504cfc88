// Path: crates/types/src/validator.rs
//! Validator identities and per-block power deltas.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;

/// A change to one validator's power, reported to consensus at EndBlock.
/// Power zero removes the validator from the active set.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    /// The validator identity.
    pub public_key: PublicKey,
    /// The new absolute power.
    pub power: u64,
}
