// Path: crates/node/src/config.rs
//! Node configuration and the genesis document.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arbor_types::{PermFlag, Permissions};

/// A configuration file could not be loaded or understood.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for this schema.
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field failed semantic validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArborConfig {
    /// The chain identity.
    pub chain: ChainConfig,
    /// Broadcast and subscription tuning.
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// The genesis document.
    pub genesis: GenesisDoc,
}

impl ArborConfig {
    /// Loads and validates a TOML config file.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: ArborConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.chain_id.is_empty() {
            return Err(ConfigError::Invalid("chain_id must not be empty".into()));
        }
        for account in &self.genesis.accounts {
            hex::decode(&account.address)
                .ok()
                .filter(|b| b.len() == 20)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "genesis account address '{}' is not 20 hex bytes",
                        account.address
                    ))
                })?;
        }
        for validator in &self.genesis.validators {
            hex::decode(&validator.public_key)
                .ok()
                .filter(|b| b.len() == 32)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "genesis validator key '{}' is not 32 hex bytes",
                        validator.public_key
                    ))
                })?;
        }
        Ok(())
    }
}

/// Chain identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// The chain id every envelope must carry.
    pub chain_id: String,
}

fn default_max_sync_timeout_secs() -> u64 {
    60 * 60
}

fn default_subscribe_buffer() -> usize {
    10
}

fn default_block_interval_ms() -> u64 {
    1000
}

/// Broadcast tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Hard cap on how long a sync broadcast waits for its commit.
    #[serde(default = "default_max_sync_timeout_secs")]
    pub max_sync_timeout_secs: u64,
    /// Buffer size of commit subscriptions.
    #[serde(default = "default_subscribe_buffer")]
    pub subscribe_buffer: usize,
    /// Dev-loop block production interval.
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        BroadcastConfig {
            max_sync_timeout_secs: default_max_sync_timeout_secs(),
            subscribe_buffer: default_subscribe_buffer(),
            block_interval_ms: default_block_interval_ms(),
        }
    }
}

/// The genesis document: initial accounts, permissions and validators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisDoc {
    /// Permission names granted by default to accounts with unset bits.
    #[serde(default)]
    pub global_permissions: Vec<String>,
    /// Initial accounts.
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    /// Initial validator set.
    #[serde(default)]
    pub validators: Vec<GenesisValidator>,
}

/// One pre-funded genesis account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Hex-encoded 20-byte address.
    pub address: String,
    /// Starting balance.
    pub balance: u64,
    /// Permission names explicitly granted.
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Roles granted.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Hex-encoded contract code to install.
    #[serde(default)]
    pub code: Option<String>,
}

/// One genesis validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisValidator {
    /// Hex-encoded 32-byte ed25519 public key.
    pub public_key: String,
    /// Starting power.
    pub power: u64,
}

/// Maps a permission name from the config to its flag.
pub fn parse_perm(name: &str) -> Result<PermFlag, ConfigError> {
    let flag = match name {
        "root" => PermFlag::Root,
        "send" => PermFlag::Send,
        "call" => PermFlag::Call,
        "createContract" => PermFlag::CreateContract,
        "createAccount" => PermFlag::CreateAccount,
        "bond" => PermFlag::Bond,
        "name" => PermFlag::Name,
        "propose" => PermFlag::Propose,
        "setGlobal" => PermFlag::SetGlobal,
        "setPermission" => PermFlag::SetPermission,
        other => {
            return Err(ConfigError::Invalid(format!(
                "unknown permission '{other}'"
            )))
        }
    };
    Ok(flag)
}

/// Builds a permission bitmap from a list of names.
pub fn perms_from_names(names: &[String]) -> Result<Permissions, ConfigError> {
    let mut perms = Permissions::default();
    for name in names {
        perms.set(parse_perm(name)?, true);
    }
    Ok(perms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: ArborConfig = toml::from_str(
            r#"
            [chain]
            chain_id = "arbor-dev"

            [genesis]
            global_permissions = ["send", "call", "name"]

            [[genesis.accounts]]
            address = "0101010101010101010101010101010101010101"
            balance = 1000
            permissions = ["bond"]
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.broadcast.max_sync_timeout_secs, 3600);
        assert_eq!(config.broadcast.subscribe_buffer, 10);
        assert_eq!(config.genesis.accounts.len(), 1);
    }

    #[test]
    fn bad_address_rejected() {
        let config: ArborConfig = toml::from_str(
            r#"
            [chain]
            chain_id = "arbor-dev"

            [genesis]
            [[genesis.accounts]]
            address = "nothex"
            balance = 1
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_permission_rejected() {
        assert!(parse_perm("fly").is_err());
        let perms = perms_from_names(&["send".to_string(), "bond".to_string()]).unwrap();
        assert_eq!(perms.get(PermFlag::Send), Some(true));
        assert_eq!(perms.get(PermFlag::Bond), Some(true));
    }
}
