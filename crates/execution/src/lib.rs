// Path: crates/execution/src/lib.rs
//! The Arbor execution core: transaction contexts, the block executor,
//! mempool account coordination, the transactor and the event emitter.
//!
//! The cyclic shape of the pipeline (executor publishes what the
//! transactor waits for) is broken with two capabilities: the executor
//! holds an [`events::EventSink`], the transactor holds an
//! [`events::SubscriptionSource`], and one emitter object injected at
//! construction satisfies both.

pub mod accounts;
pub mod contexts;
pub mod events;
pub mod executor;
pub mod simulate;
pub mod transactor;

pub use accounts::{Accounts, KeyClient, MemoryKeyClient, SequentialSigningAccount, SigningLease};
pub use events::{Emitter, EventSink, Query, SubscriptionSource, TxEmitter};
pub use executor::{CommittedBlock, Executor, TxPhase};
pub use simulate::{call_code_sim, call_sim};
pub use transactor::{
    CheckTxCallback, CheckTxFn, CheckTxResult, Transactor, CHECK_TX_SUCCESS,
    MAX_BROADCAST_SYNC_TIMEOUT,
};
