// Path: crates/types/src/codec.rs

//! The canonical, deterministic binary codec for all consensus-critical state.
//!
//! Thin wrappers around `parity-scale-codec` (SCALE). Centralizing the codec
//! here ensures every component serializes state, envelope hashes and wire
//! payloads identically; replicas that disagree on a single byte would
//! compute divergent roots.

use parity_scale_codec::{Decode, DecodeAll, Encode};

use crate::error::StateError;

/// Encodes a value into its canonical byte representation.
///
/// Use this for anything written to state or included in a hash preimage.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Vec<u8> {
    v.encode()
}

/// Decodes a value from its canonical byte representation.
///
/// Fails fast on trailing bytes or malformed input; partial decodes must
/// never be accepted in a consensus context.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, StateError> {
    T::decode_all(&mut &*b).map_err(|e| StateError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Encode, Decode, Debug, PartialEq, Eq)]
    struct Sample {
        id: u32,
        name: String,
        tags: Vec<u8>,
    }

    #[test]
    fn roundtrip() {
        let original = Sample {
            id: 42,
            name: "rent".to_string(),
            tags: vec![1, 2, 3],
        };
        let encoded = to_bytes_canonical(&original);
        assert!(!encoded.is_empty());
        assert_eq!(from_bytes_canonical::<Sample>(&encoded).unwrap(), original);
    }

    #[test]
    fn truncated_input_rejected() {
        let mut encoded = to_bytes_canonical(&Sample {
            id: 7,
            name: "x".to_string(),
            tags: vec![9; 5],
        });
        encoded.pop();
        assert!(from_bytes_canonical::<Sample>(&encoded).is_err());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut encoded = to_bytes_canonical(&1u64);
        encoded.push(0);
        assert!(from_bytes_canonical::<u64>(&encoded).is_err());
    }
}
