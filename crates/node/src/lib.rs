// Path: crates/node/src/lib.rs
//! The Arbor node: kernel assembly, consensus hooks, configuration, and
//! the single-node development loop.

pub mod abci;
pub mod config;
pub mod dev;
pub mod kernel;

pub use abci::{codes, App, BlockHeader, DeliverTxResult};
pub use config::{ArborConfig, ConfigError, GenesisAccount, GenesisDoc, GenesisValidator};
pub use dev::{DevLoop, LocalMempool};
pub use kernel::{Kernel, KernelError};
