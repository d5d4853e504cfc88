// Path: crates/state/src/state.rs
//! The committed state: reader/writer implementations over the forest,
//! and the per-block cache bundle layered on top of it.

use std::sync::Arc;

use arbor_types::codec::{from_bytes_canonical, to_bytes_canonical};
use arbor_types::keys::{
    account_key, tx_key, ACCOUNT_PREFIX, NAME_PREFIX, PROPOSAL_PREFIX, STORAGE_PREFIX, TX_PREFIX,
    VALIDATOR_PREFIX,
};
use arbor_types::{Account, Address, Ballot, NameEntry, PublicKey, StateError, TxExecution};

use crate::accounts::{AccountCache, AccountReader, AccountWriter};
use crate::forest::{Forest, ForestTreeWriter};
use crate::names::{NameCache, NameReader, NameWriter};
use crate::proposals::{ProposalCache, ProposalHash, ProposalReader, ProposalWriter};
use crate::storage::{StorageCache, StorageReader};
use crate::validators::{ValidatorDeltas, ValidatorReader, ValidatorWriter};

/// The committed chain state over the persistent forest.
///
/// All reads go straight to the forest; writes only happen on the commit
/// path when the block caches are flushed down.
pub struct State {
    forest: Arc<Forest>,
}

impl State {
    /// State over an empty forest.
    pub fn new() -> Self {
        State {
            forest: Arc::new(Forest::new()),
        }
    }

    /// The underlying forest.
    pub fn forest(&self) -> &Arc<Forest> {
        &self.forest
    }

    /// Flushes a block's caches into the forest in deterministic order and
    /// commits, returning the new root hash.
    pub fn commit_block(&self, block: &BlockState, height: u64) -> Result<[u8; 32], StateError> {
        block.accounts.sync(self)?;
        block.names.sync(self)?;
        block.proposals.sync(self)?;
        // The forest's sub-trees are key-commutative, so the unsorted
        // storage flush still lands deterministically.
        let mut storage_writer = ForestTreeWriter::new(&self.forest, STORAGE_PREFIX);
        block.storage.write_to(&mut storage_writer);
        block.validators.sync(self)?;
        self.forest.commit(height)
    }

    /// A fresh cache bundle over the committed state.
    pub fn block_state(self: &Arc<Self>) -> BlockState {
        let reader: Arc<State> = self.clone();
        BlockState {
            accounts: Arc::new(AccountCache::new(reader.clone())),
            names: Arc::new(NameCache::new(reader.clone())),
            proposals: Arc::new(ProposalCache::new(reader.clone())),
            storage: Arc::new(StorageCache::new(reader.clone())),
            validators: Arc::new(ValidatorDeltas::new(reader)),
        }
    }

    /// Persists a committed execution record under `(height, offset)`.
    pub fn store_tx_execution(&self, txe: &TxExecution) -> Result<(), StateError> {
        let key = tx_key(txe.header.height, txe.header.index);
        self.forest.set(TX_PREFIX, &key, &to_bytes_canonical(txe));
        Ok(())
    }

    /// Loads the execution record committed at `(height, offset)`.
    pub fn get_tx_execution(&self, height: u64, index: u32) -> Result<Option<TxExecution>, StateError> {
        match self.forest.get(TX_PREFIX, &tx_key(height, index)) {
            Some(bytes) => Ok(Some(from_bytes_canonical(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Scans committed execution records over the closed height range
    /// `[from, to]`, in chain order. This is how a caller whose broadcast
    /// timed out re-observes a transaction that may have landed anyway.
    pub fn list_tx_executions(&self, from: u64, to: u64) -> Result<Vec<TxExecution>, StateError> {
        let mut executions = Vec::new();
        let low = tx_key(from, 0);
        self.forest.iterate(TX_PREFIX, |key, value| {
            if key < low.as_slice() {
                return Ok(true);
            }
            if key.len() >= 8 {
                let mut height_bytes = [0u8; 8];
                height_bytes.copy_from_slice(&key[..8]);
                if u64::from_be_bytes(height_bytes) > to {
                    return Ok(false);
                }
            }
            executions.push(from_bytes_canonical(value)?);
            Ok(true)
        })?;
        Ok(executions)
    }
}

impl Default for State {
    fn default() -> Self {
        State::new()
    }
}

impl AccountReader for State {
    fn get_account(&self, address: &Address) -> Result<Option<Account>, StateError> {
        match self.forest.get(ACCOUNT_PREFIX, &account_key(address)) {
            Some(bytes) => Ok(Some(from_bytes_canonical(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl AccountWriter for State {
    fn update_account(&self, account: Account) -> Result<(), StateError> {
        let key = account_key(&account.address);
        self.forest
            .set(ACCOUNT_PREFIX, &key, &to_bytes_canonical(&account));
        Ok(())
    }

    fn remove_account(&self, address: &Address) -> Result<(), StateError> {
        self.forest.delete(ACCOUNT_PREFIX, &account_key(address));
        Ok(())
    }
}

impl NameReader for State {
    fn get_name(&self, name: &str) -> Result<Option<NameEntry>, StateError> {
        match self.forest.get(NAME_PREFIX, name.as_bytes()) {
            Some(bytes) => Ok(Some(from_bytes_canonical(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl NameWriter for State {
    fn update_name(&self, entry: NameEntry) -> Result<(), StateError> {
        self.forest
            .set(NAME_PREFIX, entry.name.as_bytes(), &to_bytes_canonical(&entry));
        Ok(())
    }

    fn remove_name(&self, name: &str) -> Result<(), StateError> {
        self.forest.delete(NAME_PREFIX, name.as_bytes());
        Ok(())
    }
}

impl ProposalReader for State {
    fn get_proposal(&self, hash: &ProposalHash) -> Result<Option<Ballot>, StateError> {
        match self.forest.get(PROPOSAL_PREFIX, hash) {
            Some(bytes) => Ok(Some(from_bytes_canonical(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl ProposalWriter for State {
    fn update_proposal(&self, hash: ProposalHash, ballot: Ballot) -> Result<(), StateError> {
        self.forest
            .set(PROPOSAL_PREFIX, &hash, &to_bytes_canonical(&ballot));
        Ok(())
    }

    fn remove_proposal(&self, hash: &ProposalHash) -> Result<(), StateError> {
        self.forest.delete(PROPOSAL_PREFIX, hash);
        Ok(())
    }
}

impl StorageReader for State {
    fn get_storage(&self, address: &Address, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self
            .forest
            .get(STORAGE_PREFIX, &arbor_types::keys::storage_key(address, key)))
    }
}

impl ValidatorReader for State {
    fn power(&self, key: &PublicKey) -> Result<u64, StateError> {
        match self.forest.get(VALIDATOR_PREFIX, &to_bytes_canonical(key)) {
            Some(bytes) => from_bytes_canonical(&bytes),
            None => Ok(0),
        }
    }

    fn total_power(&self) -> Result<u64, StateError> {
        let mut total: u64 = 0;
        self.forest.iterate(VALIDATOR_PREFIX, |_, value| {
            let power: u64 = from_bytes_canonical(value)?;
            total = total
                .checked_add(power)
                .ok_or_else(|| StateError::Corrupt("total bonded power overflow".into()))?;
            Ok(true)
        })?;
        Ok(total)
    }
}

impl ValidatorWriter for State {
    fn set_power(&self, key: &PublicKey, power: u64) -> Result<(), StateError> {
        let key_bytes = to_bytes_canonical(key);
        if power == 0 {
            self.forest.delete(VALIDATOR_PREFIX, &key_bytes);
        } else {
            self.forest
                .set(VALIDATOR_PREFIX, &key_bytes, &to_bytes_canonical(&power));
        }
        Ok(())
    }
}

/// The cache bundle the executor owns for one block (or one nested
/// transaction). Caches share-own their backends, so a child bundle reads
/// through its parent.
pub struct BlockState {
    /// Account records.
    pub accounts: Arc<AccountCache>,
    /// Name registry entries.
    pub names: Arc<NameCache>,
    /// Ballots.
    pub proposals: Arc<ProposalCache>,
    /// Contract storage cells.
    pub storage: Arc<StorageCache>,
    /// Validator power deltas.
    pub validators: Arc<ValidatorDeltas>,
}

impl BlockState {
    /// A nested bundle reading through this one. Used per transaction so a
    /// failed execution can be discarded wholesale.
    pub fn child(&self) -> BlockState {
        BlockState {
            accounts: Arc::new(AccountCache::new(self.accounts.clone())),
            names: Arc::new(NameCache::new(self.names.clone())),
            proposals: Arc::new(ProposalCache::new(self.proposals.clone())),
            storage: Arc::new(StorageCache::new(self.storage.clone())),
            validators: Arc::new(ValidatorDeltas::new(self.validators.clone())),
        }
    }

    /// Merges a successful child bundle into this one.
    pub fn absorb(&self, child: &BlockState) -> Result<(), StateError> {
        child.accounts.sync(&*self.accounts)?;
        child.names.sync(&*self.names)?;
        child.proposals.sync(&*self.proposals)?;
        let mut parent_storage = ParentStorageWriter(&self.storage);
        child.storage.write_to(&mut parent_storage);
        self.validators.absorb(&child.validators);
        Ok(())
    }
}

// Routes a child's raw storage flush into the parent overlay.
struct ParentStorageWriter<'a>(&'a StorageCache);

impl crate::kvcache::KVWriter for ParentStorageWriter<'_> {
    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.0.set_raw(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.0.delete_raw(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(seed: u8, balance: u64) -> Account {
        let mut acc = Account::new(Address([seed; 20]));
        acc.balance = balance;
        acc
    }

    #[test]
    fn block_commit_roundtrips_accounts() {
        let state = Arc::new(State::new());
        let block = state.block_state();
        block.accounts.update_account(account(1, 100)).unwrap();
        block.accounts.update_account(account(2, 200)).unwrap();
        let root = state.commit_block(&block, 1).unwrap();
        assert_eq!(state.forest().latest().unwrap().hash, root);

        let loaded = state.get_account(&Address([1; 20])).unwrap().unwrap();
        assert_eq!(loaded.balance, 100);
    }

    #[test]
    fn child_discard_leaves_parent_clean() {
        let state = Arc::new(State::new());
        let block = state.block_state();
        block.accounts.update_account(account(1, 100)).unwrap();

        let child = block.child();
        let mut acc = child
            .accounts
            .get_account(&Address([1; 20]))
            .unwrap()
            .unwrap();
        acc.balance = 1;
        child.accounts.update_account(acc).unwrap();
        drop(child); // Failed tx: the nested bundle is simply dropped.

        let acc = block
            .accounts
            .get_account(&Address([1; 20]))
            .unwrap()
            .unwrap();
        assert_eq!(acc.balance, 100);
    }

    #[test]
    fn child_absorb_propagates() {
        let state = Arc::new(State::new());
        let block = state.block_state();
        let child = block.child();
        child.accounts.update_account(account(3, 33)).unwrap();
        child
            .storage
            .set_storage(&Address([3; 20]), b"slot", b"v");
        block.absorb(&child).unwrap();

        assert_eq!(
            block
                .accounts
                .get_account(&Address([3; 20]))
                .unwrap()
                .unwrap()
                .balance,
            33
        );
        assert_eq!(
            block
                .storage
                .get_storage(&Address([3; 20]), b"slot")
                .unwrap(),
            Some(b"v".to_vec())
        );
    }

    #[test]
    fn identical_mutations_identical_roots() {
        // Property 3: sync determinism across replicas.
        let build = |order: &[u8]| {
            let state = Arc::new(State::new());
            let block = state.block_state();
            for seed in order {
                block.accounts.update_account(account(*seed, *seed as u64)).unwrap();
            }
            state.commit_block(&block, 1).unwrap()
        };
        assert_eq!(build(&[3, 1, 2]), build(&[2, 3, 1]));
    }
}
