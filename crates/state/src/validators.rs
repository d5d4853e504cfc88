// Path: crates/state/src/validators.rs
//! The validator power ledger and per-block delta tracking.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use arbor_types::error::ExecutionError;
use arbor_types::{PublicKey, StateError, ValidatorUpdate};

/// Read access to validator powers.
pub trait ValidatorReader: Send + Sync {
    /// The current power of `key`; zero if not a validator.
    fn power(&self, key: &PublicKey) -> Result<u64, StateError>;
    /// Total bonded power: the sum of all positive powers.
    fn total_power(&self) -> Result<u64, StateError>;
}

/// Write access to validator powers.
pub trait ValidatorWriter: ValidatorReader {
    /// Sets the absolute power of `key`; zero removes the validator.
    fn set_power(&self, key: &PublicKey, power: u64) -> Result<(), StateError>;
}

/// Accumulated power changes for one block, layered over a reader.
///
/// Changes are recorded as signed deltas so that simultaneous bonds against
/// the same validator accumulate; the resolved absolute powers become the
/// EndBlock update set.
pub struct ValidatorDeltas {
    backend: Arc<dyn ValidatorReader>,
    deltas: RwLock<BTreeMap<PublicKey, i128>>,
}

impl ValidatorDeltas {
    /// An empty delta set over `backend`.
    pub fn new(backend: Arc<dyn ValidatorReader>) -> Self {
        ValidatorDeltas {
            backend,
            deltas: RwLock::new(BTreeMap::new()),
        }
    }

    /// Applies a signed power change to `key`, returning the resulting
    /// absolute power. Fails if the result would be negative or overflow.
    pub fn alter_power(&self, key: &PublicKey, delta: i128) -> Result<u64, ExecutionError> {
        let mut deltas = self.deltas.write();
        let base = self.backend.power(key)? as i128;
        let pending = deltas.get(key).copied().unwrap_or(0);
        let next = base + pending + delta;
        if next < 0 {
            return Err(ExecutionError::InsufficientPower {
                power: (base + pending).max(0) as u64,
                amount: delta.unsigned_abs() as u64,
            });
        }
        if next > u64::MAX as i128 {
            return Err(ExecutionError::VmFault("validator power overflow".into()));
        }
        deltas.insert(key.clone(), pending + delta);
        Ok(next as u64)
    }

    /// The current power of `key` as seen through the deltas.
    pub fn power(&self, key: &PublicKey) -> Result<u64, StateError> {
        let base = self.backend.power(key)? as i128;
        let pending = self.deltas.read().get(key).copied().unwrap_or(0);
        Ok((base + pending).max(0) as u64)
    }

    /// Total bonded power as seen through the deltas.
    pub fn total_power(&self) -> Result<u64, StateError> {
        let base = self.backend.total_power()? as i128;
        let pending: i128 = self.deltas.read().values().sum();
        Ok((base + pending).max(0) as u64)
    }

    /// The resolved update set, in ascending key order. Only keys whose
    /// power actually changed are reported.
    pub fn updates(&self) -> Result<Vec<ValidatorUpdate>, StateError> {
        let deltas = self.deltas.read();
        let mut updates = Vec::with_capacity(deltas.len());
        for (key, delta) in deltas.iter() {
            if *delta == 0 {
                continue;
            }
            let power = self.power(key)?;
            updates.push(ValidatorUpdate {
                public_key: key.clone(),
                power,
            });
        }
        Ok(updates)
    }

    /// Folds another delta set (a nested transaction cache) into this one.
    pub fn absorb(&self, child: &ValidatorDeltas) {
        let child_deltas = child.deltas.read();
        let mut deltas = self.deltas.write();
        for (key, delta) in child_deltas.iter() {
            *deltas.entry(key.clone()).or_insert(0) += delta;
        }
    }

    /// Writes resolved absolute powers to `writer` in ascending key order.
    pub fn sync(&self, writer: &dyn ValidatorWriter) -> Result<(), StateError> {
        for update in self.updates()? {
            writer.set_power(&update.public_key, update.power)?;
        }
        Ok(())
    }

    /// Discards all pending deltas.
    pub fn reset(&self) {
        self.deltas.write().clear();
    }
}

impl ValidatorReader for ValidatorDeltas {
    fn power(&self, key: &PublicKey) -> Result<u64, StateError> {
        ValidatorDeltas::power(self, key)
    }

    fn total_power(&self) -> Result<u64, StateError> {
        ValidatorDeltas::total_power(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::crypto::PrivateKey;

    struct FixedPowers(BTreeMap<PublicKey, u64>);

    impl ValidatorReader for FixedPowers {
        fn power(&self, key: &PublicKey) -> Result<u64, StateError> {
            Ok(self.0.get(key).copied().unwrap_or(0))
        }
        fn total_power(&self) -> Result<u64, StateError> {
            Ok(self.0.values().sum())
        }
    }

    #[test]
    fn bonds_accumulate() {
        let key = PrivateKey::from_secret("v1").public_key();
        let deltas = ValidatorDeltas::new(Arc::new(FixedPowers(BTreeMap::new())));
        assert_eq!(deltas.alter_power(&key, 100).unwrap(), 100);
        assert_eq!(deltas.alter_power(&key, 50).unwrap(), 150);
        assert_eq!(deltas.power(&key).unwrap(), 150);
        assert_eq!(deltas.total_power().unwrap(), 150);
    }

    #[test]
    fn power_never_goes_negative() {
        let key = PrivateKey::from_secret("v2").public_key();
        let mut base = BTreeMap::new();
        base.insert(key.clone(), 40u64);
        let deltas = ValidatorDeltas::new(Arc::new(FixedPowers(base)));
        assert!(deltas.alter_power(&key, -41).is_err());
        assert_eq!(deltas.alter_power(&key, -40).unwrap(), 0);
    }

    #[test]
    fn updates_report_changed_keys_only() {
        let touched = PrivateKey::from_secret("v3").public_key();
        let untouched = PrivateKey::from_secret("v4").public_key();
        let mut base = BTreeMap::new();
        base.insert(untouched, 10u64);
        let deltas = ValidatorDeltas::new(Arc::new(FixedPowers(base)));
        deltas.alter_power(&touched, 5).unwrap();
        let updates = deltas.updates().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].public_key, touched);
        assert_eq!(updates[0].power, 5);
    }

    #[test]
    fn nested_deltas_absorb() {
        let key = PrivateKey::from_secret("v5").public_key();
        let parent = Arc::new(ValidatorDeltas::new(Arc::new(FixedPowers(BTreeMap::new()))));
        parent.alter_power(&key, 10).unwrap();
        let child = ValidatorDeltas::new(parent.clone() as Arc<dyn ValidatorReader>);
        child.alter_power(&key, 7).unwrap();
        parent.absorb(&child);
        assert_eq!(parent.power(&key).unwrap(), 17);
    }
}
