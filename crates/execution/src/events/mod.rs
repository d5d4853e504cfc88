// Path: crates/execution/src/events/mod.rs
//! Event publication and query-matched subscription.

pub mod emitter;
pub mod query;

pub use emitter::{
    gen_sub_id, Emitter, EventSink, SubscriptionSource, Tagged, TxEmitter, SUBSCRIBE_BUFFER_SIZE,
};
pub use query::{Condition, Op, Query, QueryParseError};

/// The query the transactor waits on: `tx.hash = '<hex>'`.
pub fn query_for_tx_execution(tx_hash: [u8; 32]) -> Query {
    Query::equal("tx.hash", hex::encode(tx_hash))
}
