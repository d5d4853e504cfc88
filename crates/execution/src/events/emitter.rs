// Path: crates/execution/src/events/emitter.rs
//! The event emitter: query-matched, best-effort delivery to buffered
//! subscribers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use arbor_types::TxExecution;

use super::query::Query;

/// Buffer size the transactor subscribes with.
pub const SUBSCRIBE_BUFFER_SIZE: usize = 10;

static SUB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A process-unique subscription id.
pub fn gen_sub_id() -> String {
    format!("sub-{}", SUB_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Anything with a queryable tag set.
pub trait Tagged {
    /// The value of tag `key`, if present.
    fn get_tag(&self, key: &str) -> Option<String>;
}

impl Tagged for TxExecution {
    fn get_tag(&self, key: &str) -> Option<String> {
        TxExecution::get_tag(self, key)
    }
}

impl<T: Tagged> Tagged for Arc<T> {
    fn get_tag(&self, key: &str) -> Option<String> {
        (**self).get_tag(key)
    }
}

struct Subscription<T> {
    query: Query,
    sender: mpsc::Sender<T>,
}

/// Publishes tagged events to subscribers whose query matches.
///
/// Delivery is best-effort: a subscriber whose buffer is full is dropped
/// and its channel closed. Unsubscribing closes the channel after the
/// receiver drains what was already buffered.
pub struct Emitter<T> {
    subscriptions: Mutex<HashMap<String, Subscription<T>>>,
}

impl<T: Tagged + Clone> Emitter<T> {
    /// An emitter with no subscribers.
    pub fn new() -> Self {
        Emitter {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `query` under `sub_id` with a bounded buffer. An existing
    /// subscription under the same id is replaced (its channel closes).
    pub fn subscribe(&self, sub_id: &str, query: Query, buffer: usize) -> mpsc::Receiver<T> {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        self.subscriptions
            .lock()
            .insert(sub_id.to_string(), Subscription { query, sender });
        receiver
    }

    /// Drops the subscription; buffered events remain readable.
    pub fn unsubscribe(&self, sub_id: &str) {
        self.subscriptions.lock().remove(sub_id);
    }

    /// Delivers `event` to every matching subscriber. Slow subscribers are
    /// dropped rather than blocking the publisher.
    pub fn publish(&self, event: &T) {
        let mut dropped = Vec::new();
        {
            let subscriptions = self.subscriptions.lock();
            for (sub_id, sub) in subscriptions.iter() {
                if !sub.query.matches(&|key: &str| event.get_tag(key)) {
                    continue;
                }
                match sub.sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(
                            target: "events",
                            subscription = %sub_id,
                            "subscriber buffer full, closing subscription"
                        );
                        dropped.push(sub_id.clone());
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dropped.push(sub_id.clone());
                    }
                }
            }
        }
        if !dropped.is_empty() {
            let mut subscriptions = self.subscriptions.lock();
            for sub_id in dropped {
                subscriptions.remove(&sub_id);
            }
        }
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

impl<T: Tagged + Clone> Default for Emitter<T> {
    fn default() -> Self {
        Emitter::new()
    }
}

/// The emitter instantiation the kernel publishes committed executions to.
pub type TxEmitter = Emitter<Arc<TxExecution>>;

/// The capability the executor holds: publish committed executions.
pub trait EventSink: Send + Sync {
    /// Publishes one committed execution.
    fn publish_tx(&self, txe: &Arc<TxExecution>);
}

/// The capability the transactor holds: subscribe to committed executions.
pub trait SubscriptionSource: Send + Sync {
    /// Opens a buffered, query-matched subscription.
    fn subscribe_tx(
        &self,
        sub_id: &str,
        query: Query,
        buffer: usize,
    ) -> mpsc::Receiver<Arc<TxExecution>>;
    /// Closes a subscription.
    fn unsubscribe_tx(&self, sub_id: &str);
}

impl EventSink for TxEmitter {
    fn publish_tx(&self, txe: &Arc<TxExecution>) {
        self.publish(txe);
    }
}

impl SubscriptionSource for TxEmitter {
    fn subscribe_tx(
        &self,
        sub_id: &str,
        query: Query,
        buffer: usize,
    ) -> mpsc::Receiver<Arc<TxExecution>> {
        self.subscribe(sub_id, query, buffer)
    }

    fn unsubscribe_tx(&self, sub_id: &str) {
        self.unsubscribe(sub_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Labelled(&'static str);

    impl Tagged for Labelled {
        fn get_tag(&self, key: &str) -> Option<String> {
            (key == "label").then(|| self.0.to_string())
        }
    }

    #[tokio::test]
    async fn matching_events_are_delivered() {
        let emitter: Emitter<Labelled> = Emitter::new();
        let mut rx = emitter.subscribe("s1", Query::equal("label", "a"), 4);
        emitter.publish(&Labelled("a"));
        emitter.publish(&Labelled("b"));
        emitter.publish(&Labelled("a"));
        assert_eq!(rx.recv().await.unwrap().0, "a");
        assert_eq!(rx.recv().await.unwrap().0, "a");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped() {
        let emitter: Emitter<Labelled> = Emitter::new();
        let mut rx = emitter.subscribe("slow", Query::equal("label", "a"), 1);
        emitter.publish(&Labelled("a"));
        emitter.publish(&Labelled("a")); // buffer full: subscription closed
        assert_eq!(emitter.subscription_count(), 0);
        // The buffered event is still readable, then the channel ends.
        assert_eq!(rx.recv().await.unwrap().0, "a");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unsubscribe_drains_then_closes() {
        let emitter: Emitter<Labelled> = Emitter::new();
        let mut rx = emitter.subscribe("s", Query::equal("label", "a"), 4);
        emitter.publish(&Labelled("a"));
        emitter.unsubscribe("s");
        assert_eq!(rx.recv().await.unwrap().0, "a");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn sub_ids_are_unique() {
        assert_ne!(gen_sub_id(), gen_sub_id());
    }
}
