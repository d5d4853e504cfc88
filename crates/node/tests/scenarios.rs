// Path: crates/node/tests/scenarios.rs
//! End-to-end scenarios: the kernel driven through the consensus hooks.

use std::sync::Arc;
use std::time::Duration;

use arbor_execution::MemoryKeyClient;
use arbor_node::{App, ArborConfig, BlockHeader, DevLoop, Kernel, LocalMempool};
use arbor_rpc::TxEnvelopeParam;
use arbor_state::{AccountReader, Blockchain, NameReader, StorageReader, ValidatorReader};
use arbor_types::crypto::PrivateKey;
use arbor_types::{
    Address, Ballot, BondTx, CallTx, NameTx, Payload, ProposalTx, SendTx, TxInput, TxOutput,
};

const CHAIN_ID: &str = "arbor-test";

struct Fixture {
    kernel: Kernel,
    dev: Arc<DevLoop>,
    keys: Arc<MemoryKeyClient>,
}

fn genesis_account(key: &PrivateKey, balance: u64, perms: &[&str]) -> arbor_node::GenesisAccount {
    arbor_node::GenesisAccount {
        address: hex::encode(key.address().as_bytes()),
        balance,
        permissions: perms.iter().map(|p| p.to_string()).collect(),
        roles: vec![],
        code: None,
    }
}

fn setup(accounts: Vec<arbor_node::GenesisAccount>) -> Fixture {
    let config = ArborConfig {
        chain: arbor_node::config::ChainConfig {
            chain_id: CHAIN_ID.to_string(),
        },
        broadcast: Default::default(),
        genesis: arbor_node::GenesisDoc {
            global_permissions: vec!["send".to_string(), "call".to_string()],
            accounts,
            validators: vec![],
        },
    };
    let keys = Arc::new(MemoryKeyClient::new());
    let dev = Arc::new(DevLoop::new());
    let kernel = Kernel::new(config, keys.clone(), dev.check_tx_fn()).unwrap();
    dev.bind(kernel.app.clone());
    Fixture { kernel, dev, keys }
}

fn produce_block(app: &App, blockchain: &Blockchain, mempool: &LocalMempool) -> [u8; 32] {
    let txs = mempool.drain();
    let height = blockchain.last_height() + 1;
    app.begin_block(BlockHeader {
        height,
        time_ms: height * 1000,
    })
    .unwrap();
    for tx in &txs {
        app.deliver_tx(tx).unwrap();
    }
    app.end_block(height).unwrap();
    app.commit().unwrap()
}

impl Fixture {
    fn produce(&self) -> [u8; 32] {
        produce_block(&self.kernel.app, &self.kernel.blockchain, self.dev.mempool())
    }

    async fn submit(&self, payload: Payload) {
        self.kernel
            .transact
            .broadcast_tx_async(TxEnvelopeParam::from_payload(payload))
            .await
            .unwrap();
    }
}

fn input(address: Address, amount: u64) -> TxInput {
    TxInput {
        address,
        amount,
        sequence: 0, // assigned by the transactor
    }
}

#[tokio::test]
async fn bond_happy_path() {
    let alice = PrivateKey::from_secret("alice");
    let fixture = setup(vec![genesis_account(&alice, 1000, &["bond"])]);
    fixture.keys.add_key(alice.clone());

    fixture
        .submit(Payload::Bond(BondTx {
            input: input(alice.address(), 400),
        }))
        .await;
    fixture.produce();

    let state = &fixture.kernel.state;
    let account = state.get_account(&alice.address()).unwrap().unwrap();
    assert_eq!(account.balance, 600);
    assert_eq!(account.sequence, 1);
    assert_eq!(state.power(&alice.public_key()).unwrap(), 400);

    let txe = state.get_tx_execution(1, 0).unwrap().unwrap();
    assert!(txe.exception.is_none());
}

#[tokio::test]
async fn bond_insufficient_funds_leaves_balance() {
    let alice = PrivateKey::from_secret("alice");
    let fixture = setup(vec![genesis_account(&alice, 100, &["bond"])]);
    fixture.keys.add_key(alice.clone());

    fixture
        .submit(Payload::Bond(BondTx {
            input: input(alice.address(), 500),
        }))
        .await;
    fixture.produce();

    let state = &fixture.kernel.state;
    let account = state.get_account(&alice.address()).unwrap().unwrap();
    assert_eq!(account.balance, 100);
    // Failed transactions do not consume a sequence.
    assert_eq!(account.sequence, 0);
    assert_eq!(state.power(&alice.public_key()).unwrap(), 0);

    let txe = state.get_tx_execution(1, 0).unwrap().unwrap();
    let exception = txe.exception.unwrap();
    assert_eq!(exception.code, "EXEC_INSUFFICIENT_FUNDS");
}

#[tokio::test]
async fn concurrent_sync_broadcasts_commit_gapless_sequences() {
    let alice = PrivateKey::from_secret("alice");
    let bob = PrivateKey::from_secret("bob");
    let fixture = setup(vec![
        genesis_account(&alice, 10_000, &[]),
        genesis_account(&bob, 0, &[]),
    ]);
    fixture.keys.add_key(alice.clone());

    let app = fixture.kernel.app.clone();
    let blockchain = fixture.kernel.blockchain.clone();
    let mempool = fixture.dev.mempool().clone();
    let producer = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !mempool.is_empty() {
                produce_block(&app, &blockchain, &mempool);
            }
        }
    });

    let mut handles = Vec::new();
    for gas in 1..=5u64 {
        let transact = fixture.kernel.transact.clone();
        let from = alice.address();
        let to = bob.address();
        handles.push(tokio::spawn(async move {
            let payload = Payload::Call(CallTx {
                input: TxInput {
                    address: from,
                    amount: 1,
                    sequence: 0,
                },
                address: Some(to),
                gas_limit: gas,
                data: vec![],
            });
            let txe = transact
                .broadcast_tx_sync(TxEnvelopeParam {
                    envelope: None,
                    payload: Some(payload),
                    timeout: Some(Duration::from_secs(10)),
                })
                .await
                .unwrap();
            assert!(txe.exception.is_none());
            txe.envelope.payload.inputs()[0].sequence
        }));
    }

    let mut sequences = Vec::new();
    for handle in handles {
        sequences.push(handle.await.unwrap());
    }
    producer.abort();
    sequences.sort_unstable();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);

    let account = fixture
        .kernel
        .state
        .get_account(&alice.address())
        .unwrap()
        .unwrap();
    assert_eq!(account.sequence, 5);
}

// PUSH2 0xdead, PUSH1 0, MSTORE, PUSH1 2, PUSH1 30, REVERT
const REVERT_DEAD: [u8; 11] = [0x61, 0xde, 0xad, 0x60, 0x00, 0x52, 0x60, 0x02, 0x60, 0x1e, 0xfd];

#[tokio::test]
async fn revert_returns_payload_and_charges_gas_only() {
    let alice = PrivateKey::from_secret("alice");
    let contract = Address([0xc0; 20]);
    let mut accounts = vec![genesis_account(&alice, 1000, &[])];
    accounts.push(arbor_node::GenesisAccount {
        address: hex::encode(contract.as_bytes()),
        balance: 0,
        permissions: vec![],
        roles: vec![],
        code: Some(hex::encode(REVERT_DEAD)),
    });
    let fixture = setup(accounts);
    fixture.keys.add_key(alice.clone());

    fixture
        .submit(Payload::Call(CallTx {
            input: input(alice.address(), 5),
            address: Some(contract),
            gas_limit: 40,
            data: vec![],
        }))
        .await;
    fixture.produce();

    let state = &fixture.kernel.state;
    let txe = state.get_tx_execution(1, 0).unwrap().unwrap();
    assert!(txe.is_reverted());
    let result = txe.result.unwrap();
    assert_eq!(result.return_data, vec![0xde, 0xad]);
    assert!(result.gas_used > 0);

    let account = state.get_account(&alice.address()).unwrap().unwrap();
    // The value transfer rolled back; only gas was charged.
    assert_eq!(account.balance, 1000 - result.gas_used);
    assert_eq!(account.sequence, 1);
    let contract_account = state.get_account(&contract).unwrap().unwrap();
    assert_eq!(contract_account.balance, 0);
}

// PUSH1 7, PUSH1 1, SSTORE, STOP
const STORE_SEVEN: [u8; 6] = [0x60, 0x07, 0x60, 0x01, 0x55, 0x00];

#[tokio::test]
async fn call_commits_contract_storage() {
    let alice = PrivateKey::from_secret("alice");
    let contract = Address([0xc1; 20]);
    let fixture = setup(vec![
        genesis_account(&alice, 1000, &[]),
        arbor_node::GenesisAccount {
            address: hex::encode(contract.as_bytes()),
            balance: 0,
            permissions: vec![],
            roles: vec![],
            code: Some(hex::encode(STORE_SEVEN)),
        },
    ]);
    fixture.keys.add_key(alice.clone());

    fixture
        .submit(Payload::Call(CallTx {
            input: input(alice.address(), 0),
            address: Some(contract),
            gas_limit: 1000,
            data: vec![],
        }))
        .await;
    fixture.produce();

    let mut slot = [0u8; 32];
    slot[31] = 1;
    let cell = fixture
        .kernel
        .state
        .get_storage(&contract, &slot)
        .unwrap()
        .unwrap();
    assert_eq!(cell[31], 7);
}

#[tokio::test]
async fn name_lifecycle_ownership_and_expiry() {
    let alice = PrivateKey::from_secret("alice");
    let bob = PrivateKey::from_secret("bob");
    let fixture = setup(vec![
        genesis_account(&alice, 1000, &["name", "send"]),
        genesis_account(&bob, 1000, &["name", "send"]),
    ]);
    fixture.keys.add_key(alice.clone());
    fixture.keys.add_key(bob.clone());

    // Fee 15 over data "v1" (rate 3/block) buys the minimum 5-block lease.
    fixture
        .submit(Payload::Name(NameTx {
            input: input(alice.address(), 15),
            name: "x".to_string(),
            data: "v1".to_string(),
        }))
        .await;
    fixture.produce(); // height 1, lease expires at 6

    let state = &fixture.kernel.state;
    let entry = state.get_name("x").unwrap().unwrap();
    assert_eq!(entry.owner, alice.address());
    assert_eq!(entry.data, "v1");
    assert_eq!(entry.expires, 6);

    // A different owner is rejected while the lease is live.
    fixture
        .submit(Payload::Name(NameTx {
            input: input(bob.address(), 15),
            name: "x".to_string(),
            data: "v2".to_string(),
        }))
        .await;
    fixture.produce(); // height 2

    let txe = state.get_tx_execution(2, 0).unwrap().unwrap();
    assert_eq!(txe.exception.unwrap().code, "EXEC_PERMISSION_DENIED");
    assert_eq!(state.get_name("x").unwrap().unwrap().data, "v1");

    // Pad the chain past the expiry height with unrelated transfers.
    while fixture.kernel.blockchain.last_height() < 6 {
        fixture
            .submit(Payload::Send(SendTx {
                inputs: vec![input(alice.address(), 1)],
                outputs: vec![TxOutput {
                    address: bob.address(),
                    amount: 1,
                }],
            }))
            .await;
        fixture.produce();
    }

    // The same claim now lands: the lease lapsed, ownership transfers.
    fixture
        .submit(Payload::Name(NameTx {
            input: input(bob.address(), 15),
            name: "x".to_string(),
            data: "v2".to_string(),
        }))
        .await;
    fixture.produce();

    let entry = state.get_name("x").unwrap().unwrap();
    assert_eq!(entry.owner, bob.address());
    assert_eq!(entry.data, "v2");
}

#[tokio::test]
async fn proposal_passes_threshold_and_executes_batch() {
    let alice = PrivateKey::from_secret("alice");
    let bob = PrivateKey::from_secret("bob");
    let fixture = setup(vec![
        genesis_account(&alice, 1000, &["bond", "propose", "send"]),
        genesis_account(&bob, 0, &[]),
    ]);
    fixture.keys.add_key(alice.clone());

    // Block 1: alice becomes the sole validator (power 100).
    fixture
        .submit(Payload::Bond(BondTx {
            input: input(alice.address(), 100),
        }))
        .await;
    fixture.produce();

    // Block 2: her single vote carries the full bonded power, so the
    // ballot passes immediately and its batch (a send) executes inline.
    let embedded_send = Payload::Send(SendTx {
        inputs: vec![TxInput {
            address: alice.address(),
            amount: 50,
            sequence: 3, // bond used 1, the proposal itself uses 2
        }],
        outputs: vec![TxOutput {
            address: bob.address(),
            amount: 50,
        }],
    });
    let ballot = Ballot::new(arbor_types::proposal::Proposal {
        name: "fund-bob".to_string(),
        description: "pay bob from the treasury".to_string(),
        batch: vec![arbor_types::Envelope::enclose(CHAIN_ID, embedded_send)],
    });
    fixture
        .submit(Payload::Proposal(ProposalTx {
            input: input(alice.address(), 0),
            proposal_hash: None,
            proposal: Some(ballot),
        }))
        .await;
    fixture.produce();

    let state = &fixture.kernel.state;
    let txe = state.get_tx_execution(2, 0).unwrap().unwrap();
    assert!(txe.exception.is_none(), "{:?}", txe.exception);
    assert_eq!(txe.children.len(), 1);
    assert!(txe.children[0].exception.is_none());

    assert_eq!(state.get_account(&bob.address()).unwrap().unwrap().balance, 50);
    let account = state.get_account(&alice.address()).unwrap().unwrap();
    // 1000 - 100 bond - 50 send
    assert_eq!(account.balance, 850);
    assert_eq!(account.sequence, 3);
}
