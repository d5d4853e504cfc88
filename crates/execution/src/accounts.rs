// Path: crates/execution/src/accounts.rs
//! Mempool accounts: per-address sequence coordination for concurrent
//! signers.
//!
//! Each address maps to a [`SequentialSigningAccount`] whose gate is a
//! strictly fair (FIFO) suspension point. A holder sees the committed
//! sequence plus the pending-but-unconfirmed increments, assigns the next
//! sequence, and releases the gate as soon as the transaction is safely in
//! the consensus mempool. The counter itself sits behind a separate sync
//! lock so block commits can reconcile it without entering the async gate.

use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use arbor_state::AccountReader;
use arbor_types::error::CryptoError;
use arbor_types::{Address, PrivateKey, PublicKey, Signatory, StateError};

/// Server-side signing capability keyed by address.
pub trait KeyClient: Send + Sync {
    /// Signs `message` with the key held for `address`.
    fn sign(&self, address: &Address, message: &[u8]) -> Result<Signatory, CryptoError>;
    /// The public key held for `address`.
    fn public_key(&self, address: &Address) -> Result<PublicKey, CryptoError>;
}

/// An in-process key store.
#[derive(Default)]
pub struct MemoryKeyClient {
    keys: SyncMutex<HashMap<Address, PrivateKey>>,
}

impl MemoryKeyClient {
    /// An empty key store.
    pub fn new() -> Self {
        MemoryKeyClient::default()
    }

    /// Adds a key, returning its address.
    pub fn add_key(&self, key: PrivateKey) -> Address {
        let address = key.address();
        self.keys.lock().insert(address, key);
        address
    }
}

impl KeyClient for MemoryKeyClient {
    fn sign(&self, address: &Address, message: &[u8]) -> Result<Signatory, CryptoError> {
        let keys = self.keys.lock();
        let key = keys.get(address).ok_or(CryptoError::KeyNotFound(*address))?;
        Ok(Signatory {
            address: *address,
            public_key: key.public_key(),
            signature: key.sign(message),
        })
    }

    fn public_key(&self, address: &Address) -> Result<PublicKey, CryptoError> {
        let keys = self.keys.lock();
        let key = keys.get(address).ok_or(CryptoError::KeyNotFound(*address))?;
        Ok(key.public_key())
    }
}

#[derive(Debug, Default)]
struct SequenceState {
    // Last sequence known committed for the address.
    base: u64,
    // Sequences handed out on top of `base` for txs still in the mempool.
    pending: u64,
}

impl SequenceState {
    fn advance_base(&mut self, committed: u64) {
        if committed > self.base {
            let advanced = committed - self.base;
            self.pending = self.pending.saturating_sub(advanced);
            self.base = committed;
        }
    }
}

/// Serialized sequence assignment for one address.
pub struct SequentialSigningAccount {
    address: Address,
    // tokio's Mutex queues waiters FIFO, which is exactly the fairness the
    // lock contract requires.
    gate: Arc<Mutex<()>>,
    state: Arc<SyncMutex<SequenceState>>,
}

impl SequentialSigningAccount {
    fn new(address: Address) -> Self {
        SequentialSigningAccount {
            address,
            gate: Arc::new(Mutex::new(())),
            state: Arc::new(SyncMutex::new(SequenceState::default())),
        }
    }

    /// Acquires exclusive ownership of the address's sequence counter.
    /// Blocks (FIFO fair) behind other holders. `committed_sequence` is the
    /// authoritative sequence read from state; a base that fell behind it
    /// is advanced and consumed pending increments retired.
    pub async fn lock(&self, committed_sequence: u64) -> SigningLease {
        let guard = self.gate.clone().lock_owned().await;
        let sequence = {
            let mut state = self.state.lock();
            state.advance_base(committed_sequence);
            state.base + state.pending
        };
        SigningLease {
            address: self.address,
            sequence,
            state: self.state.clone(),
            guard: Some(guard),
        }
    }

    /// Reconciles the counter after a block commit: the committed sequence
    /// advances the base, and `all_confirmed = false` (a rejected tx from
    /// this address) resets the pending count so the next signer re-reads
    /// state.
    pub fn reconcile(&self, committed_sequence: u64, all_confirmed: bool) {
        let mut state = self.state.lock();
        state.advance_base(committed_sequence);
        if !all_confirmed {
            state.pending = 0;
        }
    }
}

/// Exclusive ownership of one address's sequence counter.
///
/// `release` is idempotent: the transactor both defers it and calls it
/// eagerly after the mempool hand-off, and the double call must be safe.
pub struct SigningLease {
    address: Address,
    sequence: u64,
    state: Arc<SyncMutex<SequenceState>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SigningLease {
    /// The address this lease covers.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Committed sequence plus pending increments. The holder signs the
    /// next transaction at `sequence() + 1`.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Records that one more sequence is pending in the mempool. Call only
    /// while the lease is held and after the transaction was accepted.
    pub fn advance(&mut self) {
        if self.guard.is_some() {
            let mut state = self.state.lock();
            state.pending += 1;
            self.sequence = state.base + state.pending;
        }
    }

    /// Releases the gate. Safe to call more than once.
    pub fn release(&mut self) {
        self.guard.take();
    }

    /// Whether the gate is still held.
    pub fn is_held(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for SigningLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// A set of leases acquired for one envelope, released as a unit.
#[derive(Default)]
pub struct SigningLeases(Vec<SigningLease>);

impl SigningLeases {
    /// No leases: the envelope came pre-signed.
    pub fn empty() -> Self {
        SigningLeases(Vec::new())
    }

    /// Adds a lease to the set.
    pub fn push(&mut self, lease: SigningLease) {
        self.0.push(lease);
    }

    /// Records acceptance on every lease.
    pub fn advance_all(&mut self) {
        for lease in &mut self.0 {
            lease.advance();
        }
    }

    /// Releases every lease. Idempotent.
    pub fn release_all(&mut self) {
        for lease in &mut self.0 {
            lease.release();
        }
    }
}

impl Drop for SigningLeases {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// The mempool account map: address to sequential signing account, plus the
/// signing capability and the committed-state reader used to seed and
/// reconcile sequence counters.
pub struct Accounts {
    reader: Arc<dyn AccountReader>,
    key_client: Arc<dyn KeyClient>,
    signing: SyncMutex<HashMap<Address, Arc<SequentialSigningAccount>>>,
}

impl Accounts {
    /// Mempool accounts over the committed state reader.
    pub fn new(reader: Arc<dyn AccountReader>, key_client: Arc<dyn KeyClient>) -> Self {
        Accounts {
            reader,
            key_client,
            signing: SyncMutex::new(HashMap::new()),
        }
    }

    /// The signing capability.
    pub fn key_client(&self) -> &Arc<dyn KeyClient> {
        &self.key_client
    }

    /// The committed sequence for `address` (zero for unknown accounts).
    pub fn committed_sequence(&self, address: &Address) -> Result<u64, StateError> {
        Ok(self
            .reader
            .get_account(address)?
            .map(|acc| acc.sequence)
            .unwrap_or(0))
    }

    /// The sequential signing account for `address`, created on first use.
    pub fn sequential_signing_account(&self, address: &Address) -> Arc<SequentialSigningAccount> {
        self.signing
            .lock()
            .entry(*address)
            .or_insert_with(|| Arc::new(SequentialSigningAccount::new(*address)))
            .clone()
    }

    /// Locks the sequence counter for `address`, seeding it from committed
    /// state.
    pub async fn lock(&self, address: &Address) -> Result<SigningLease, StateError> {
        let committed = self.committed_sequence(address)?;
        let ssa = self.sequential_signing_account(address);
        Ok(ssa.lock(committed).await)
    }

    /// Reconciles the counter for `address` after a block commit.
    /// `all_confirmed` is false when a pending transaction from the address
    /// was rejected during the block.
    pub fn reconcile(&self, address: &Address, all_confirmed: bool) -> Result<(), StateError> {
        let committed = self.committed_sequence(address)?;
        let ssa = self.sequential_signing_account(address);
        ssa.reconcile(committed, all_confirmed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::Account;

    struct FixedSequence(u64);

    impl AccountReader for FixedSequence {
        fn get_account(&self, address: &Address) -> Result<Option<Account>, StateError> {
            let mut acc = Account::new(*address);
            acc.sequence = self.0;
            Ok(Some(acc))
        }
    }

    fn accounts(committed: u64) -> Accounts {
        Accounts::new(
            Arc::new(FixedSequence(committed)),
            Arc::new(MemoryKeyClient::new()),
        )
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let accounts = accounts(7);
        let addr = Address([1; 20]);
        let mut lease = accounts.lock(&addr).await.unwrap();
        assert_eq!(lease.sequence(), 7);
        lease.release();
        lease.release();
        assert!(!lease.is_held());
        // A second lock acquires immediately; double release did not poison.
        let lease2 = accounts.lock(&addr).await.unwrap();
        assert_eq!(lease2.sequence(), 7);
    }

    #[tokio::test]
    async fn pending_increments_stack() {
        let accounts = accounts(7);
        let addr = Address([2; 20]);
        let mut lease = accounts.lock(&addr).await.unwrap();
        assert_eq!(lease.sequence(), 7);
        lease.advance();
        lease.release();

        let lease = accounts.lock(&addr).await.unwrap();
        assert_eq!(lease.sequence(), 8);
    }

    #[tokio::test]
    async fn advance_after_release_is_inert() {
        let accounts = accounts(0);
        let addr = Address([9; 20]);
        let mut lease = accounts.lock(&addr).await.unwrap();
        lease.release();
        lease.advance();
        let lease = accounts.lock(&addr).await.unwrap();
        assert_eq!(lease.sequence(), 0);
    }

    #[tokio::test]
    async fn reconcile_retires_confirmed_and_resets_rejected() {
        let accounts = accounts(10);
        let addr = Address([3; 20]);
        {
            let mut lease = accounts.lock(&addr).await.unwrap();
            lease.advance();
            lease.advance();
        }
        // Committed stays at 10; both pending remain stacked on top.
        accounts.reconcile(&addr, true).unwrap();
        let lease = accounts.lock(&addr).await.unwrap();
        assert_eq!(lease.sequence(), 12);
        drop(lease);

        accounts.reconcile(&addr, false).unwrap();
        let lease = accounts.lock(&addr).await.unwrap();
        assert_eq!(lease.sequence(), 10);
    }

    #[tokio::test]
    async fn lock_is_exclusive_and_fair() {
        let accounts = Arc::new(accounts(0));
        let addr = Address([4; 20]);
        let mut handles = Vec::new();
        let order = Arc::new(SyncMutex::new(Vec::new()));
        for i in 0..5u64 {
            let accounts = accounts.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let mut lease = accounts.lock(&addr).await.unwrap();
                order.lock().push((i, lease.sequence()));
                lease.advance();
                lease.release();
            }));
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let seen = order.lock().clone();
        let sequences: Vec<u64> = seen.iter().map(|(_, s)| *s).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    }
}
