// Path: crates/types/src/crypto.rs
//! Addresses, key material and signatures.
//!
//! The network signs with ed25519; secp256k1 public keys are representable
//! so that externally-signed transactions can be carried and the validator
//! curve rule enforced, but this node never signs with them.

use ed25519_dalek::{Signer as _, Verifier as _};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Keccak256;

use crate::error::CryptoError;
use serde_big_array::BigArray;

/// Length in bytes of an account address.
pub const ADDRESS_LENGTH: usize = 20;

/// A 20-byte account identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize, Default,
)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// Builds an address from a byte slice, which must be exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; ADDRESS_LENGTH] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("address must be {ADDRESS_LENGTH} bytes, got {}", bytes.len())))?;
        Ok(Address(arr))
    }

    /// The raw address bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The elliptic curve a public key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum CurveType {
    /// Edwards 25519, the network signing curve.
    Ed25519,
    /// secp256k1, accepted on inputs for interop but never a validator key.
    Secp256k1,
}

impl CurveType {
    /// Human-readable curve name.
    pub fn name(&self) -> &'static str {
        match self {
            CurveType::Ed25519 => "ed25519",
            CurveType::Secp256k1 => "secp256k1",
        }
    }
}

/// A public key tagged with its curve.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize)]
pub enum PublicKey {
    /// An ed25519 verifying key.
    Ed25519([u8; 32]),
    /// A compressed secp256k1 point, carried opaquely.
    Secp256k1(#[serde(with = "BigArray")] [u8; 33]),
}

impl PublicKey {
    /// The curve this key belongs to.
    pub fn curve_type(&self) -> CurveType {
        match self {
            PublicKey::Ed25519(_) => CurveType::Ed25519,
            PublicKey::Secp256k1(_) => CurveType::Secp256k1,
        }
    }

    /// The raw key bytes without the curve tag.
    pub fn raw_bytes(&self) -> &[u8] {
        match self {
            PublicKey::Ed25519(b) => b,
            PublicKey::Secp256k1(b) => b,
        }
    }

    /// Derives the account address: the first 20 bytes of the sha256 digest
    /// of the curve-tagged canonical encoding.
    pub fn address(&self) -> Address {
        let digest = Sha256::digest(crate::codec::to_bytes_canonical(self));
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Address(bytes)
    }

    /// Verifies `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        match self {
            PublicKey::Ed25519(bytes) => {
                let key = ed25519_dalek::VerifyingKey::from_bytes(bytes)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
                let sig = ed25519_dalek::Signature::from_slice(&signature.0)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
                key.verify(message, &sig)
                    .map_err(|_| CryptoError::VerificationFailed)
            }
            PublicKey::Secp256k1(_) => Err(CryptoError::UnsupportedCurve("secp256k1")),
        }
    }
}

/// A detached signature.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

/// An ed25519 signing key held by this node.
#[derive(Clone)]
pub struct PrivateKey {
    signing: ed25519_dalek::SigningKey,
}

impl PrivateKey {
    /// Generates a fresh random key.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        PrivateKey {
            signing: ed25519_dalek::SigningKey::generate(&mut rng),
        }
    }

    /// Derives a key deterministically from a secret string. Test and
    /// genesis tooling only; real deployments load keys from the keystore.
    pub fn from_secret(secret: &str) -> Self {
        let seed: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        PrivateKey {
            signing: ed25519_dalek::SigningKey::from_bytes(&seed),
        }
    }

    /// The corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::Ed25519(self.signing.verifying_key().to_bytes())
    }

    /// The address of the corresponding public key.
    pub fn address(&self) -> Address {
        self.public_key().address()
    }

    /// Signs `message`.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message).to_bytes().to_vec())
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey({})", self.address())
    }
}

/// sha256 digest helper for content addressing (proposals, envelopes).
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Deterministic address for a contract created by `caller` at `sequence`:
/// the low 20 bytes of `keccak256(caller || sequence_be)`.
pub fn contract_address(caller: &Address, sequence: u64) -> Address {
    let mut hasher = Keccak256::default();
    hasher.update(caller.as_bytes());
    hasher.update(sequence.to_be_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; ADDRESS_LENGTH];
    bytes.copy_from_slice(&digest[12..32]);
    Address(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let key = PrivateKey::from_secret("frogs");
        let sig = key.sign(b"message");
        key.public_key().verify(b"message", &sig).unwrap();
        assert!(key.public_key().verify(b"other", &sig).is_err());
    }

    #[test]
    fn address_is_deterministic() {
        let a = PrivateKey::from_secret("frogs").address();
        let b = PrivateKey::from_secret("frogs").address();
        assert_eq!(a, b);
        assert_ne!(a, PrivateKey::from_secret("toads").address());
    }

    #[test]
    fn contract_addresses_differ_by_sequence() {
        let caller = PrivateKey::from_secret("deployer").address();
        assert_ne!(
            contract_address(&caller, 1),
            contract_address(&caller, 2)
        );
    }

    #[test]
    fn secp256k1_cannot_verify() {
        let key = PublicKey::Secp256k1([2u8; 33]);
        let err = key.verify(b"m", &Signature(vec![0; 64])).unwrap_err();
        assert!(matches!(err, CryptoError::UnsupportedCurve(_)));
    }
}
