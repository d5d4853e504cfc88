// Path: crates/execution/src/transactor.rs
//! The transactor: sign, sequence, broadcast and await the commit of a
//! transaction.
//!
//! `broadcast_tx_sync` composes three suspension points in a load-bearing
//! order: (a) per-address signing locks, (b) the mempool CheckTx response,
//! (c) the commit subscription. The signing locks are released eagerly as
//! soon as CheckTx returns, because from that point the node owns the
//! retry; the deferred release on every other exit path is idempotent.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use arbor_state::Blockchain;
use arbor_types::codec::{from_bytes_canonical, to_bytes_canonical};
use arbor_types::error::{MempoolError, TransactError};
use arbor_types::{Envelope, Receipt, TxExecution};

use crate::accounts::{Accounts, SigningLeases};
use crate::events::{
    gen_sub_id, query_for_tx_execution, SubscriptionSource, SUBSCRIBE_BUFFER_SIZE,
};

/// The CheckTx code meaning the transaction entered the mempool.
pub const CHECK_TX_SUCCESS: u32 = 0;

/// Hard upper bound on how long a sync broadcast waits for its commit.
/// Callers passing no timeout inherit it; the submission itself is never
/// retracted when the wait ends.
pub const MAX_BROADCAST_SYNC_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// The mempool's answer to a CheckTx submission.
#[derive(Debug, Clone)]
pub struct CheckTxResult {
    /// Response code; `CHECK_TX_SUCCESS` means accepted.
    pub code: u32,
    /// Canonical receipt bytes on success.
    pub data: Vec<u8>,
    /// Log line explaining a rejection.
    pub log: String,
}

/// Callback invoked with the mempool's response.
pub type CheckTxCallback = Box<dyn FnOnce(CheckTxResult) + Send>;

/// Asynchronous hand-off of encoded transaction bytes to the consensus
/// mempool. The engine answers through the callback.
pub type CheckTxFn = Arc<dyn Fn(Vec<u8>, CheckTxCallback) -> Result<(), MempoolError> + Send + Sync>;

/// Coordinates signing, sequencing, broadcast and commit-watching for
/// client-submitted transactions.
pub struct Transactor {
    blockchain: Arc<Blockchain>,
    subscriptions: Arc<dyn SubscriptionSource>,
    mempool_accounts: Arc<Accounts>,
    check_tx_async: CheckTxFn,
}

impl Transactor {
    /// Wires the transactor to the chain tip, the subscription source and
    /// the consensus mempool.
    pub fn new(
        blockchain: Arc<Blockchain>,
        subscriptions: Arc<dyn SubscriptionSource>,
        mempool_accounts: Arc<Accounts>,
        check_tx_async: CheckTxFn,
    ) -> Self {
        Transactor {
            blockchain,
            subscriptions,
            mempool_accounts,
            check_tx_async,
        }
    }

    /// The mempool accounts this transactor sequences against.
    pub fn mempool_accounts(&self) -> &Arc<Accounts> {
        &self.mempool_accounts
    }

    /// Signs (if needed), submits, and waits for the committed execution.
    ///
    /// Reverts are returned as successful executions carrying their
    /// exception; any other execution exception surfaces as an error. A
    /// deadline expiry returns `Timeout` with the current sync snapshot and
    /// does not retract the submission.
    pub async fn broadcast_tx_sync(
        &self,
        timeout: Option<Duration>,
        envelope: Envelope,
    ) -> Result<TxExecution, TransactError> {
        let timeout = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(MAX_BROADCAST_SYNC_TIMEOUT)
            .min(MAX_BROADCAST_SYNC_TIMEOUT);

        // Sign before subscribing so the subscription sees the final hash.
        let (envelope, mut leases) = self.maybe_sign_tx_mempool(envelope).await?;
        let tx_hash = envelope.hash();

        let sub_id = gen_sub_id();
        let mut commits = self.subscriptions.subscribe_tx(
            &sub_id,
            query_for_tx_execution(tx_hash),
            SUBSCRIBE_BUFFER_SIZE,
        );

        let result = self
            .submit_and_await(&envelope, &mut leases, &mut commits, timeout)
            .await;

        // Unsubscribe and release on every exit path; both are idempotent.
        self.subscriptions.unsubscribe_tx(&sub_id);
        leases.release_all();
        result
    }

    async fn submit_and_await(
        &self,
        envelope: &Envelope,
        leases: &mut SigningLeases,
        commits: &mut mpsc::Receiver<Arc<TxExecution>>,
        timeout: Duration,
    ) -> Result<TxExecution, TransactError> {
        let receipt = self.check_tx(envelope).await?;
        // Safely in the mempool: the node owns the retry from here, so the
        // signing locks are released before the (potentially long) wait.
        leases.advance_all();
        leases.release_all();

        tracing::trace!(
            target: "transactor",
            tx_hash = %hex::encode(receipt.tx_hash),
            "transaction accepted by mempool, awaiting commit"
        );

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        tokio::select! {
            _ = &mut deadline => {
                let sync_info = serde_json::to_string(&self.blockchain.sync_info())
                    .unwrap_or_else(|e| format!("{{error could not marshal SyncInfo: {e}}}"));
                Err(TransactError::Timeout {
                    tx_hash: hex::encode(receipt.tx_hash),
                    sync_info,
                })
            }
            committed = commits.recv() => match committed {
                Some(txe) => {
                    if let Some(exception) = txe.call_error() {
                        if !exception.is_revert() {
                            return Err(TransactError::ExecutionException {
                                code: exception.code.clone(),
                                description: exception.description.clone(),
                            });
                        }
                    }
                    Ok((*txe).clone())
                }
                None => Err(TransactError::Cancelled),
            },
        }
    }

    /// Signs (if needed) and submits, returning the mempool receipt without
    /// awaiting the commit.
    pub async fn broadcast_tx_async(&self, envelope: Envelope) -> Result<Receipt, TransactError> {
        let (envelope, mut leases) = self.maybe_sign_tx_mempool(envelope).await?;
        let result = self.check_tx(&envelope).await;
        if result.is_ok() {
            leases.advance_all();
        }
        leases.release_all();
        result
    }

    /// Submits encoded bytes to the consensus mempool and awaits the
    /// CheckTx response.
    pub async fn check_tx(&self, envelope: &Envelope) -> Result<Receipt, TransactError> {
        let tx_bytes = to_bytes_canonical(envelope);
        let (response_tx, response_rx) = oneshot::channel();
        (self.check_tx_async)(
            tx_bytes,
            Box::new(move |result| {
                // The submitter may have stopped waiting; dropping the
                // response is fine.
                let _ = response_tx.send(result);
            }),
        )?;
        let response = response_rx.await.map_err(|_| TransactError::Cancelled)?;
        if response.code != CHECK_TX_SUCCESS {
            return Err(MempoolError::Rejected {
                code: response.code,
                log: response.log,
            }
            .into());
        }
        if response.data.is_empty() {
            return Ok(envelope.receipt());
        }
        from_bytes_canonical(&response.data).map_err(|e| TransactError::Encoding(e.to_string()))
    }

    /// Signs the envelope under mempool sequencing unless it already
    /// carries signatures. Returns the leases guarding the assigned
    /// sequences.
    pub async fn maybe_sign_tx_mempool(
        &self,
        envelope: Envelope,
    ) -> Result<(Envelope, SigningLeases), TransactError> {
        if envelope.signatories.is_empty() {
            self.sign_tx_mempool(envelope).await
        } else {
            Ok((envelope, SigningLeases::empty()))
        }
    }

    /// Locks every input address in payload order, assigns consecutive
    /// mempool sequences, signs, and returns the envelope (rehashed) with
    /// the held leases.
    pub async fn sign_tx_mempool(
        &self,
        mut envelope: Envelope,
    ) -> Result<(Envelope, SigningLeases), TransactError> {
        let mut leases = SigningLeases::empty();
        let mut addresses = Vec::new();
        for input in envelope.payload.inputs() {
            if !addresses.contains(&input.address) {
                addresses.push(input.address);
            }
        }
        let mut assigned = Vec::with_capacity(addresses.len());
        for address in &addresses {
            // Held until the tx is safely in the mempool.
            let lease = self.mempool_accounts.lock(address).await?;
            assigned.push((*address, lease.sequence() + 1));
            leases.push(lease);
        }
        for input in envelope.payload.inputs_mut() {
            if let Some((_, sequence)) = assigned.iter().find(|(a, _)| *a == input.address) {
                input.sequence = *sequence;
            }
        }
        let message = envelope.signing_bytes();
        let key_client = self.mempool_accounts.key_client();
        for address in &addresses {
            let signatory = key_client.sign(address, &message)?;
            envelope.signatories.push(signatory);
        }
        // The payload changed under signing; the cached hash is stale.
        envelope.rehash();
        Ok((envelope, leases))
    }

    /// Signs at the committed sequences without locking; used when the
    /// client manages sequencing itself.
    pub fn sign_tx(&self, mut envelope: Envelope) -> Result<Envelope, TransactError> {
        let mut addresses = Vec::new();
        for input in envelope.payload.inputs() {
            if !addresses.contains(&input.address) {
                addresses.push(input.address);
            }
        }
        let message = envelope.signing_bytes();
        let key_client = self.mempool_accounts.key_client();
        for address in &addresses {
            let signatory = key_client.sign(address, &message)?;
            envelope.signatories.push(signatory);
        }
        envelope.rehash();
        Ok(envelope)
    }
}
