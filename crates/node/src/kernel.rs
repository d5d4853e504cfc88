// Path: crates/node/src/kernel.rs
//! The kernel: one explicit aggregate owning every core component.
//!
//! There is deliberately no module-scope mutable state anywhere in the
//! workspace; anything that needs the block store, the chain tip or the
//! transactor receives it from here by reference.

use std::sync::Arc;

use thiserror::Error;

use arbor_execution::contexts::GLOBAL_PERMISSIONS_ADDRESS;
use arbor_execution::{Accounts, CheckTxFn, Executor, KeyClient, Transactor, TxEmitter};
use arbor_rpc::TransactService;
use arbor_state::{AccountWriter, Blockchain, State, ValidatorWriter};
use arbor_types::{Account, Address, PublicKey, StateError};
use arbor_vm::machine::Machine;
use arbor_vm::Vm;

use crate::abci::App;
use crate::config::{perms_from_names, ArborConfig, ConfigError};

/// Kernel construction failures.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The configuration was unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Genesis state could not be written.
    #[error(transparent)]
    State(#[from] StateError),
}

/// The assembled node core.
pub struct Kernel {
    /// The loaded configuration.
    pub config: ArborConfig,
    /// Committed state over the forest.
    pub state: Arc<State>,
    /// Chain identity and tip.
    pub blockchain: Arc<Blockchain>,
    /// The event emitter satisfying both pipeline capabilities.
    pub emitter: Arc<TxEmitter>,
    /// Mempool accounts.
    pub accounts: Arc<Accounts>,
    /// The submission coordinator.
    pub transactor: Arc<Transactor>,
    /// The consensus hook surface.
    pub app: Arc<App>,
    /// The transact RPC service.
    pub transact: Arc<TransactService>,
}

impl Kernel {
    /// Builds the kernel: applies genesis, wires the emitter into both the
    /// executor (sink) and the transactor (source), and hands the mempool
    /// hand-off function to the transactor.
    pub fn new(
        config: ArborConfig,
        key_client: Arc<dyn KeyClient>,
        check_tx: CheckTxFn,
    ) -> Result<Kernel, KernelError> {
        let state = Arc::new(State::new());
        apply_genesis(&state, &config)?;
        let genesis_root = state.forest().commit(0)?;

        let blockchain = Arc::new(Blockchain::new(config.chain.chain_id.clone()));
        blockchain.advance(0, genesis_root, 0);

        let emitter: Arc<TxEmitter> = Arc::new(TxEmitter::new());
        let vm: Arc<dyn Vm> = Arc::new(Machine::new());

        let accounts = Arc::new(Accounts::new(state.clone(), key_client));
        let transactor = Arc::new(Transactor::new(
            blockchain.clone(),
            emitter.clone(),
            accounts.clone(),
            check_tx,
        ));

        let executor = Executor::new(
            state.clone(),
            blockchain.clone(),
            emitter.clone(),
            vm.clone(),
        );
        let app = Arc::new(App::new(
            executor,
            accounts.clone(),
            blockchain.clone(),
            state.clone(),
        ));

        let transact = Arc::new(TransactService::new(
            state.clone(),
            blockchain.clone(),
            transactor.clone(),
            vm,
        ));

        tracing::info!(
            target: "kernel",
            chain_id = %config.chain.chain_id,
            genesis_root = %hex::encode(genesis_root),
            accounts = config.genesis.accounts.len(),
            validators = config.genesis.validators.len(),
            "kernel assembled"
        );

        Ok(Kernel {
            config,
            state,
            blockchain,
            emitter,
            accounts,
            transactor,
            app,
            transact,
        })
    }
}

// Writes the genesis document straight into the forest: the global
// permission account, the funded accounts, and the validator powers.
fn apply_genesis(state: &Arc<State>, config: &ArborConfig) -> Result<(), KernelError> {
    let mut global = Account::new(GLOBAL_PERMISSIONS_ADDRESS);
    global.permissions = perms_from_names(&config.genesis.global_permissions)?;
    state.update_account(global)?;

    for genesis_account in &config.genesis.accounts {
        let bytes = hex::decode(&genesis_account.address)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let address = Address::from_slice(&bytes)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let mut account = Account::new(address);
        account.balance = genesis_account.balance;
        account.permissions = perms_from_names(&genesis_account.permissions)?;
        for role in &genesis_account.roles {
            account.permissions.add_role(role);
        }
        if let Some(code) = &genesis_account.code {
            account.code = hex::decode(code).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        state.update_account(account)?;
    }

    for genesis_validator in &config.genesis.validators {
        let bytes = hex::decode(&genesis_validator.public_key)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let key_bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ConfigError::Invalid("validator key must be 32 bytes".into()))?;
        state.set_power(&PublicKey::Ed25519(key_bytes), genesis_validator.power)?;
    }
    Ok(())
}
