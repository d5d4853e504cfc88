// Path: crates/node/src/bin/arbor.rs
//! The Arbor dev node: kernel plus in-process block production.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use arbor_execution::MemoryKeyClient;
use arbor_node::{ArborConfig, DevLoop, Kernel};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("arbor.toml"));
    let config = ArborConfig::load(&config_path)?;
    let block_interval = Duration::from_millis(config.broadcast.block_interval_ms);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let key_client = Arc::new(MemoryKeyClient::new());
        let dev = DevLoop::new();
        let kernel = Kernel::new(config, key_client, dev.check_tx_fn())?;
        dev.bind(kernel.app.clone());

        let blockchain = kernel.blockchain.clone();
        let producer = tokio::spawn(async move { dev.run(blockchain, block_interval).await });

        tracing::info!(
            target: "node",
            chain_id = %kernel.blockchain.chain_id(),
            "arbor dev node running, ctrl-c to stop"
        );
        tokio::signal::ctrl_c().await?;
        tracing::info!(target: "node", "shutting down");
        producer.abort();
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}
