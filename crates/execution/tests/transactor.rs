// Path: crates/execution/tests/transactor.rs
//! Transactor lifecycle tests against a stubbed consensus mempool.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use arbor_execution::{
    Accounts, CheckTxFn, CheckTxResult, MemoryKeyClient, Transactor, TxEmitter, CHECK_TX_SUCCESS,
};
use arbor_state::{AccountReader, Blockchain};
use arbor_types::codec::to_bytes_canonical;
use arbor_types::crypto::PrivateKey;
use arbor_types::error::TransactError;
use arbor_types::{
    Account, Address, CallTx, Envelope, Exception, Payload, StateError, TxExecution, TxInput,
};

const CHAIN_ID: &str = "test-chain";
const COMMIT_HEIGHT: u64 = 35;

struct MemoryState {
    accounts: Mutex<Vec<Account>>,
}

impl MemoryState {
    fn with_account(address: Address, sequence: u64) -> Arc<Self> {
        let mut account = Account::new(address);
        account.sequence = sequence;
        account.balance = 1_000_000;
        Arc::new(MemoryState {
            accounts: Mutex::new(vec![account]),
        })
    }
}

impl AccountReader for MemoryState {
    fn get_account(&self, address: &Address) -> Result<Option<Account>, StateError> {
        Ok(self
            .accounts
            .lock()
            .iter()
            .find(|acc| &acc.address == address)
            .cloned())
    }
}

fn call_payload(from: Address, gas_limit: u64) -> Payload {
    Payload::Call(CallTx {
        input: TxInput {
            address: from,
            amount: 0,
            sequence: 0,
        },
        address: Some(Address([1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])),
        gas_limit,
        data: vec![],
    })
}

// A checker that immediately "commits" the transaction: it publishes a
// TxExecution for the submitted envelope and answers CheckTx with success
// and the canonical receipt.
fn committing_checker(emitter: Arc<TxEmitter>) -> CheckTxFn {
    Arc::new(move |tx_bytes, callback| {
        let envelope = Envelope::decode(&tx_bytes).expect("test checker got undecodable bytes");
        let receipt = envelope.receipt();
        let txe = Arc::new(TxExecution::new(COMMIT_HEIGHT, 0, envelope));
        emitter.publish(&txe);
        callback(CheckTxResult {
            code: CHECK_TX_SUCCESS,
            data: to_bytes_canonical(&receipt),
            log: String::new(),
        });
        Ok(())
    })
}

fn transactor_over(emitter: Arc<TxEmitter>, accounts: Arc<Accounts>, checker: CheckTxFn) -> Transactor {
    Transactor::new(
        Arc::new(Blockchain::new(CHAIN_ID)),
        emitter,
        accounts,
        checker,
    )
}

#[tokio::test]
async fn broadcast_tx_sync_returns_committed_execution() {
    let signer = PrivateKey::from_secret("frogs");
    let keys = MemoryKeyClient::new();
    let from = keys.add_key(signer);
    let state = MemoryState::with_account(from, 0);
    let accounts = Arc::new(Accounts::new(state, Arc::new(keys)));
    let emitter = Arc::new(TxEmitter::new());
    let transactor = transactor_over(emitter.clone(), accounts, committing_checker(emitter.clone()));

    let envelope = Envelope::enclose(CHAIN_ID, call_payload(from, 100));
    let txe = transactor
        .broadcast_tx_sync(Some(Duration::from_secs(5)), envelope)
        .await
        .unwrap();
    assert_eq!(txe.header.height, COMMIT_HEIGHT);
    // Server-side signing assigned the first mempool sequence.
    assert_eq!(txe.envelope.payload.inputs()[0].sequence, 1);
    assert_eq!(txe.envelope.signatories.len(), 1);
    // All subscriptions were torn down on the way out.
    assert_eq!(emitter.subscription_count(), 0);
}

#[tokio::test]
async fn concurrent_broadcasts_get_gapless_sequences() {
    // Five concurrent submitters from one address: committed sequences
    // must be exactly base+1 ..= base+5, no gaps, no duplicates.
    let signer = PrivateKey::from_secret("frogs");
    let keys = MemoryKeyClient::new();
    let from = keys.add_key(signer);
    let state = MemoryState::with_account(from, 7);
    let accounts = Arc::new(Accounts::new(state, Arc::new(keys)));
    let emitter = Arc::new(TxEmitter::new());
    let transactor = Arc::new(transactor_over(
        emitter.clone(),
        accounts,
        committing_checker(emitter),
    ));

    let mut handles = Vec::new();
    for gas in 1..=5u64 {
        let transactor = transactor.clone();
        handles.push(tokio::spawn(async move {
            let envelope = Envelope::enclose(CHAIN_ID, call_payload(from, gas));
            let txe = transactor
                .broadcast_tx_sync(Some(Duration::from_secs(5)), envelope)
                .await
                .unwrap();
            txe.envelope.payload.inputs()[0].sequence
        }));
    }
    let mut sequences = Vec::new();
    for handle in handles {
        sequences.push(handle.await.unwrap());
    }
    sequences.sort_unstable();
    assert_eq!(sequences, vec![8, 9, 10, 11, 12]);
}

#[tokio::test]
async fn mempool_rejection_surfaces_code_and_log() {
    let signer = PrivateKey::from_secret("frogs");
    let keys = MemoryKeyClient::new();
    let from = keys.add_key(signer);
    let state = MemoryState::with_account(from, 0);
    let accounts = Arc::new(Accounts::new(state, Arc::new(keys)));
    let emitter = Arc::new(TxEmitter::new());

    let rejecting: CheckTxFn = Arc::new(move |_tx_bytes, callback| {
        callback(CheckTxResult {
            code: 7,
            data: Vec::new(),
            log: "nope".to_string(),
        });
        Ok(())
    });
    let transactor = transactor_over(emitter.clone(), accounts, rejecting);

    let envelope = Envelope::enclose(CHAIN_ID, call_payload(from, 10));
    let err = transactor
        .broadcast_tx_sync(Some(Duration::from_secs(5)), envelope)
        .await
        .unwrap_err();
    match err {
        TransactError::Mempool(arbor_types::error::MempoolError::Rejected { code, log }) => {
            assert_eq!(code, 7);
            assert_eq!(log, "nope");
        }
        other => panic!("expected mempool rejection, got {other:?}"),
    }
    assert_eq!(emitter.subscription_count(), 0);

    // The rejected submission must not burn a sequence.
    let envelope = Envelope::enclose(CHAIN_ID, call_payload(from, 10));
    let (signed, mut leases) = transactor.maybe_sign_tx_mempool(envelope).await.unwrap();
    assert_eq!(signed.payload.inputs()[0].sequence, 1);
    leases.release_all();
}

#[tokio::test]
async fn timeout_reports_sync_info_without_retracting() {
    let signer = PrivateKey::from_secret("frogs");
    let keys = MemoryKeyClient::new();
    let from = keys.add_key(signer);
    let state = MemoryState::with_account(from, 0);
    let accounts = Arc::new(Accounts::new(state, Arc::new(keys)));
    let emitter = Arc::new(TxEmitter::new());

    // Accepts the tx but never commits anything.
    let silent: CheckTxFn = Arc::new(move |tx_bytes, callback| {
        let envelope = Envelope::decode(&tx_bytes).expect("test checker got undecodable bytes");
        callback(CheckTxResult {
            code: CHECK_TX_SUCCESS,
            data: to_bytes_canonical(&envelope.receipt()),
            log: String::new(),
        });
        Ok(())
    });
    let transactor = transactor_over(emitter.clone(), accounts, silent);

    let envelope = Envelope::enclose(CHAIN_ID, call_payload(from, 10));
    let err = transactor
        .broadcast_tx_sync(Some(Duration::from_millis(50)), envelope)
        .await
        .unwrap_err();
    match err {
        TransactError::Timeout { tx_hash, sync_info } => {
            assert!(!tx_hash.is_empty());
            assert!(sync_info.contains(CHAIN_ID));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(emitter.subscription_count(), 0);

    // The accepted-but-unconfirmed sequence stays pending.
    let envelope = Envelope::enclose(CHAIN_ID, call_payload(from, 10));
    let (signed, mut leases) = transactor.maybe_sign_tx_mempool(envelope).await.unwrap();
    assert_eq!(signed.payload.inputs()[0].sequence, 2);
    leases.release_all();
}

#[tokio::test]
async fn non_revert_exception_surfaces_as_error() {
    let signer = PrivateKey::from_secret("frogs");
    let keys = MemoryKeyClient::new();
    let from = keys.add_key(signer);
    let state = MemoryState::with_account(from, 0);
    let accounts = Arc::new(Accounts::new(state, Arc::new(keys)));
    let emitter = Arc::new(TxEmitter::new());

    let failing_emitter = emitter.clone();
    let failing: CheckTxFn = Arc::new(move |tx_bytes, callback| {
        let envelope = Envelope::decode(&tx_bytes).expect("test checker got undecodable bytes");
        let receipt = envelope.receipt();
        let mut txe = TxExecution::new(COMMIT_HEIGHT, 0, envelope);
        txe.exception = Some(Exception {
            code: "EXEC_INSUFFICIENT_FUNDS".to_string(),
            description: "insufficient funds".to_string(),
        });
        failing_emitter.publish(&Arc::new(txe));
        callback(CheckTxResult {
            code: CHECK_TX_SUCCESS,
            data: to_bytes_canonical(&receipt),
            log: String::new(),
        });
        Ok(())
    });
    let transactor = transactor_over(emitter.clone(), accounts, failing);

    let envelope = Envelope::enclose(CHAIN_ID, call_payload(from, 10));
    let err = transactor
        .broadcast_tx_sync(Some(Duration::from_secs(5)), envelope)
        .await
        .unwrap_err();
    match err {
        TransactError::ExecutionException { code, .. } => {
            assert_eq!(code, "EXEC_INSUFFICIENT_FUNDS");
        }
        other => panic!("expected execution exception, got {other:?}"),
    }
}

#[tokio::test]
async fn reverts_are_returned_as_success() {
    let signer = PrivateKey::from_secret("frogs");
    let keys = MemoryKeyClient::new();
    let from = keys.add_key(signer);
    let state = MemoryState::with_account(from, 0);
    let accounts = Arc::new(Accounts::new(state, Arc::new(keys)));
    let emitter = Arc::new(TxEmitter::new());

    let reverting_emitter = emitter.clone();
    let reverting: CheckTxFn = Arc::new(move |tx_bytes, callback| {
        let envelope = Envelope::decode(&tx_bytes).expect("test checker got undecodable bytes");
        let receipt = envelope.receipt();
        let mut txe = TxExecution::new(COMMIT_HEIGHT, 0, envelope);
        txe.exception = Some(Exception {
            code: arbor_types::exec::REVERT_CODE.to_string(),
            description: "execution reverted".to_string(),
        });
        reverting_emitter.publish(&Arc::new(txe));
        callback(CheckTxResult {
            code: CHECK_TX_SUCCESS,
            data: to_bytes_canonical(&receipt),
            log: String::new(),
        });
        Ok(())
    });
    let transactor = transactor_over(emitter.clone(), accounts, reverting);

    let envelope = Envelope::enclose(CHAIN_ID, call_payload(from, 10));
    let txe = transactor
        .broadcast_tx_sync(Some(Duration::from_secs(5)), envelope)
        .await
        .unwrap();
    assert!(txe.is_reverted());
}

#[tokio::test]
async fn presigned_envelopes_skip_mempool_signing() {
    let signer = PrivateKey::from_secret("frogs");
    let from = signer.address();
    let keys = MemoryKeyClient::new();
    let state = MemoryState::with_account(from, 4);
    let accounts = Arc::new(Accounts::new(state, Arc::new(keys)));
    let emitter = Arc::new(TxEmitter::new());
    let transactor = transactor_over(
        emitter.clone(),
        accounts,
        committing_checker(emitter),
    );

    let mut envelope = Envelope::enclose(CHAIN_ID, call_payload(from, 10));
    for input in envelope.payload.inputs_mut() {
        input.sequence = 5;
    }
    envelope.sign(&signer);
    envelope.rehash();

    let txe = transactor
        .broadcast_tx_sync(Some(Duration::from_secs(5)), envelope)
        .await
        .unwrap();
    // The client-chosen sequence survived untouched.
    assert_eq!(txe.envelope.payload.inputs()[0].sequence, 5);
}
