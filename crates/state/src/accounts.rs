// Path: crates/state/src/accounts.rs
//! The account cache and its reader/writer seams.

use std::sync::Arc;

use arbor_types::{Account, Address, StateError};

use crate::cache::{CacheBackend, SyncOp, TypedCache};

/// Read access to account records.
pub trait AccountReader: Send + Sync {
    /// Loads the account at `address`, `None` if absent.
    fn get_account(&self, address: &Address) -> Result<Option<Account>, StateError>;
}

/// Write access to account records.
pub trait AccountWriter: AccountReader {
    /// Inserts or overwrites an account.
    fn update_account(&self, account: Account) -> Result<(), StateError>;
    /// Removes an account.
    fn remove_account(&self, address: &Address) -> Result<(), StateError>;
}

struct ReaderBackend(Arc<dyn AccountReader>);

impl CacheBackend<Address, Account> for ReaderBackend {
    fn load(&self, key: &Address) -> Result<Option<Account>, StateError> {
        self.0.get_account(key)
    }
}

/// Write-back cache of account records over any [`AccountReader`].
pub struct AccountCache {
    cache: TypedCache<Address, Account>,
}

impl AccountCache {
    /// A cache reading through to `backend`.
    pub fn new(backend: Arc<dyn AccountReader>) -> Self {
        AccountCache {
            cache: TypedCache::new(Arc::new(ReaderBackend(backend))),
        }
    }

    /// Flushes dirty entries to `writer` in ascending address order.
    pub fn sync(&self, writer: &dyn AccountWriter) -> Result<(), StateError> {
        self.cache.sync(|address, op| match op {
            SyncOp::Update(account) => writer.update_account(account.clone()),
            SyncOp::Remove => writer.remove_account(address),
        })
    }

    /// Starts a new generation, optionally over a new backend.
    pub fn reset(&self, backend: Option<Arc<dyn AccountReader>>) {
        self.cache
            .reset(backend.map(|b| Arc::new(ReaderBackend(b)) as _));
    }
}

impl AccountReader for AccountCache {
    fn get_account(&self, address: &Address) -> Result<Option<Account>, StateError> {
        self.cache.get(address)
    }
}

impl AccountWriter for AccountCache {
    fn update_account(&self, account: Account) -> Result<(), StateError> {
        self.cache.update(account.address, account)
    }

    fn remove_account(&self, address: &Address) -> Result<(), StateError> {
        self.cache.remove(address)
    }
}
