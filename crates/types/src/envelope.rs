// Path: crates/types/src/envelope.rs
//! Signed transaction envelopes and mempool receipts.

use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::crypto::{contract_address, sha256, Address, PublicKey, Signature};
use crate::error::{CryptoError, ExecutionError};
use crate::payload::{Payload, PayloadKind};

/// One signer of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Signatory {
    /// The signing account.
    pub address: Address,
    /// The signer's public key, so verifiers need no state lookup.
    pub public_key: PublicKey,
    /// Signature over the envelope's signing bytes.
    pub signature: Signature,
}

/// A signed container for a payload.
///
/// The hash is deterministic over the chain id and the canonical payload
/// encoding. Because signing assigns input sequences, the cached hash must
/// be recomputed with [`Envelope::rehash`] after any mutation of the
/// signature set.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Envelope {
    /// The chain this envelope is bound to.
    pub chain_id: String,
    /// The semantic transaction body.
    pub payload: Payload,
    /// Signatures, one per distinct input address.
    pub signatories: Vec<Signatory>,
    /// Cached content hash; maintained by `rehash`.
    #[codec(skip)]
    #[serde(skip)]
    hash: [u8; 32],
}

impl Envelope {
    /// Wraps a payload for the given chain. The envelope is unsigned.
    pub fn enclose(chain_id: impl Into<String>, payload: Payload) -> Self {
        let mut env = Envelope {
            chain_id: chain_id.into(),
            payload,
            signatories: Vec::new(),
            hash: [0; 32],
        };
        env.rehash();
        env
    }

    /// Decodes an envelope from canonical bytes, restoring the cached hash
    /// (which is not part of the encoding).
    pub fn decode(bytes: &[u8]) -> Result<Self, crate::error::StateError> {
        let mut env: Envelope = crate::codec::from_bytes_canonical(bytes)?;
        env.rehash();
        Ok(env)
    }

    /// The bytes signatures commit to: chain id plus canonical payload.
    pub fn signing_bytes(&self) -> Vec<u8> {
        crate::codec::to_bytes_canonical(&(&self.chain_id, &self.payload))
    }

    /// Recomputes the cached content hash. Must be called after signing,
    /// since sequence assignment mutates the payload.
    pub fn rehash(&mut self) -> [u8; 32] {
        self.hash = sha256(&self.signing_bytes());
        self.hash
    }

    /// The cached content hash.
    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    /// Appends a signatory produced by `signer` over the current signing
    /// bytes. Does not rehash.
    pub fn sign(&mut self, signer: &crate::crypto::PrivateKey) {
        let message = self.signing_bytes();
        self.signatories.push(Signatory {
            address: signer.address(),
            public_key: signer.public_key(),
            signature: signer.sign(&message),
        });
    }

    /// Structural and cryptographic validation: the chain id must match,
    /// every input must be covered by a signatory, every signatory address
    /// must match its key, and every signature must verify.
    pub fn validate(&self, chain_id: &str) -> Result<(), ExecutionError> {
        if self.chain_id != chain_id {
            return Err(ExecutionError::InvalidSignature(format!(
                "envelope is for chain '{}', this chain is '{}'",
                self.chain_id, chain_id
            )));
        }
        if self.signatories.is_empty() {
            return Err(ExecutionError::InvalidSignature(
                "envelope carries no signatures".to_string(),
            ));
        }
        let message = self.signing_bytes();
        for signatory in &self.signatories {
            if signatory.public_key.address() != signatory.address {
                return Err(ExecutionError::InvalidSignature(format!(
                    "signatory address {} does not match its public key",
                    signatory.address
                )));
            }
            signatory
                .public_key
                .verify(&message, &signatory.signature)
                .map_err(|e: CryptoError| ExecutionError::InvalidSignature(e.to_string()))?;
        }
        for input in self.payload.inputs() {
            if !self.signatories.iter().any(|s| s.address == input.address) {
                return Err(ExecutionError::InvalidSignature(format!(
                    "input {} is not signed",
                    input.address
                )));
            }
        }
        Ok(())
    }

    /// The public key a signatory provided for `address`, if any.
    pub fn signatory_key(&self, address: &Address) -> Option<&PublicKey> {
        self.signatories
            .iter()
            .find(|s| &s.address == address)
            .map(|s| &s.public_key)
    }

    /// The receipt for this envelope, including the deterministic contract
    /// address when the payload creates one.
    pub fn receipt(&self) -> Receipt {
        let created = match &self.payload {
            Payload::Call(tx) if tx.address.is_none() => {
                Some(contract_address(&tx.input.address, tx.input.sequence))
            }
            _ => None,
        };
        Receipt {
            tx_hash: self.hash,
            tx_type: self.payload.kind(),
            creates_contract: created.is_some(),
            contract_address: created,
        }
    }
}

/// Acknowledgement that a transaction reached the consensus mempool.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Receipt {
    /// Hash of the accepted envelope.
    pub tx_hash: [u8; 32],
    /// Kind of the enclosed payload.
    pub tx_type: PayloadKind,
    /// Whether execution will create a contract account.
    pub creates_contract: bool,
    /// The deterministic address of that contract, when created.
    pub contract_address: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::payload::{CallTx, TxInput};

    fn call_payload(signer: &PrivateKey, sequence: u64) -> Payload {
        Payload::Call(CallTx {
            input: TxInput {
                address: signer.address(),
                amount: 5,
                sequence,
            },
            address: Some(Address([3; 20])),
            gas_limit: 100,
            data: vec![],
        })
    }

    #[test]
    fn hash_tracks_payload_mutation() {
        let signer = PrivateKey::from_secret("frogs");
        let mut env = Envelope::enclose("test-chain", call_payload(&signer, 0));
        let before = env.hash();
        for input in env.payload.inputs_mut() {
            input.sequence = 9;
        }
        assert_eq!(env.hash(), before, "hash is cached until rehash");
        assert_ne!(env.rehash(), before);
    }

    #[test]
    fn validate_accepts_good_envelope() {
        let signer = PrivateKey::from_secret("frogs");
        let mut env = Envelope::enclose("test-chain", call_payload(&signer, 1));
        env.sign(&signer);
        env.rehash();
        env.validate("test-chain").unwrap();
    }

    #[test]
    fn validate_rejects_wrong_chain_and_unsigned_input() {
        let signer = PrivateKey::from_secret("frogs");
        let mut env = Envelope::enclose("test-chain", call_payload(&signer, 1));
        env.sign(&signer);
        assert!(env.validate("other-chain").is_err());

        let unsigned = Envelope::enclose("test-chain", call_payload(&signer, 1));
        assert!(unsigned.validate("test-chain").is_err());
    }

    #[test]
    fn receipt_reports_contract_creation() {
        let signer = PrivateKey::from_secret("deployer");
        let mut payload = call_payload(&signer, 4);
        if let Payload::Call(tx) = &mut payload {
            tx.address = None;
        }
        let env = Envelope::enclose("test-chain", payload);
        let receipt = env.receipt();
        assert!(receipt.creates_contract);
        assert_eq!(
            receipt.contract_address,
            Some(contract_address(&signer.address(), 4))
        );
    }
}
