//! Configuration Management Module
//!
//! Loads the validator node configuration from TOML, applies `BRIDGE__`
//! environment overrides and checks everything that can be checked without
//! touching a chain.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cosmos::MultisigKey;
use crate::crypto::{is_valid_bech32_address, is_valid_eth_address};
use crate::error::{BridgeError, BridgeResult};

pub const CONFIG_PATH_ENV: &str = "BRIDGE_VALIDATOR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/validator.toml";
pub const ENV_PREFIX: &str = "BRIDGE";

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all node settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mongodb: MongoConfig,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub mint_monitor: ServiceConfig,
    pub mint_signer: ServiceConfig,
    pub mint_executor: ServiceConfig,
    pub burn_monitor: ServiceConfig,
    pub burn_signer: ServiceConfig,
    pub burn_executor: ServiceConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub secret_manager: SecretManagerConfig,
}

/// Shared document store connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    #[serde(default)]
    pub uri: String,
    pub database: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Cosmos-style source chain and the vault multisig.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// REST gateway URL
    pub rpc_url: String,
    pub chain_id: String,
    #[serde(default = "default_timeout_ms")]
    pub rpc_timeout_ms: u64,
    pub bech32_prefix: String,
    pub coin_denom: String,
    /// Refund fee and the exclusive lower bound for deposits
    pub tx_fee: u64,
    pub confirmations: u64,
    #[serde(default)]
    pub start_height: u64,
    #[serde(default)]
    pub mnemonic: String,
    /// Full KMS key version resource name
    #[serde(default)]
    pub kms_key: String,
    pub multisig_address: String,
    /// Hex-encoded compressed secp256k1 keys of all members
    pub multisig_public_keys: Vec<String>,
    pub multisig_threshold: u32,
    #[serde(default)]
    pub mint_disabled: bool,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
}

/// EVM destination chain and its contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    #[serde(default = "default_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Overrides the mnemonic-derived destination key when set
    #[serde(default)]
    pub private_key: String,
    #[serde(default)]
    pub start_block: u64,
    pub confirmations: u64,
    pub wrapped_token_address: String,
    pub mint_controller_address: String,
    /// Destination addresses of every committee member
    pub validator_addresses: Vec<String>,
}

/// Enablement and tick interval of one worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthConfig {
    pub interval_ms: u64,
    /// Resume cursors from this host's last health record
    #[serde(default)]
    pub read_last_health: bool,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            read_last_health: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Google Secret Manager names for the sensitive fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretManagerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub mnemonic_secret_name: String,
    #[serde(default)]
    pub eth_private_key_secret_name: String,
    #[serde(default)]
    pub mongodb_uri_secret_name: String,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_gas_limit() -> u64 {
    200_000
}

// ============================================================================
// CONFIGURATION LOADING AND VALIDATION
// ============================================================================

impl Config {
    /// Loads configuration from `$BRIDGE_VALIDATOR_CONFIG_PATH` or `config/validator.toml`.
    ///
    /// # Returns
    ///
    /// - `Ok(Config)` - Successfully loaded configuration
    /// - `Err(anyhow::Error)` - Failed to load configuration or file doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    /// Loads a TOML file and layers `BRIDGE__SECTION__FIELD` environment overrides on top.
    pub fn load_from(config_path: &str) -> anyhow::Result<Self> {
        if !Path::new(config_path).exists() {
            return Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/validator.template.toml config/validator.toml\n\
                Then edit config/validator.toml with your actual values.",
                config_path
            ));
        }

        let settings = config::Config::builder()
            .add_source(config::File::new(config_path, config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to read configuration '{}': {}", config_path, e))?;

        settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Invalid configuration '{}': {}", config_path, e))
    }

    /// Parses configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Destination chain id in the decimal form used by deposit memos.
    pub fn destination_chain_id(&self) -> String {
        self.destination.chain_id.to_string()
    }

    /// Static checks. Chain-facing checks happen at startup in the runner.
    pub fn validate(&self) -> BridgeResult<()> {
        let fail = |msg: String| Err(BridgeError::Config(msg));

        if self.mongodb.uri.trim().is_empty() {
            return fail("mongodb.uri is empty".to_string());
        }
        if self.mongodb.database.trim().is_empty() {
            return fail("mongodb.database is empty".to_string());
        }

        let source = &self.source;
        check_url("source.rpc_url", &source.rpc_url)?;
        for (name, value) in [
            ("source.chain_id", &source.chain_id),
            ("source.bech32_prefix", &source.bech32_prefix),
            ("source.coin_denom", &source.coin_denom),
        ] {
            if value.trim().is_empty() {
                return fail(format!("{} is empty", name));
            }
        }
        if source.mnemonic.trim().is_empty() && source.kms_key.trim().is_empty() {
            return fail("either source.mnemonic or source.kms_key must be set".to_string());
        }
        if !is_valid_bech32_address(&source.bech32_prefix, &source.multisig_address) {
            return fail(format!("source.multisig_address is invalid: {}", source.multisig_address));
        }
        if source.gas_limit == 0 {
            return fail("source.gas_limit must be positive".to_string());
        }
        let multisig = MultisigKey::from_hex(source.multisig_threshold, &source.multisig_public_keys)?;
        let derived = multisig.address(&source.bech32_prefix)?;
        if !derived.eq_ignore_ascii_case(&source.multisig_address) {
            return Err(BridgeError::Invariant(format!(
                "multisig address mismatch: derived {}, configured {}",
                derived, source.multisig_address
            )));
        }

        let destination = &self.destination;
        check_url("destination.rpc_url", &destination.rpc_url)?;
        for (name, value) in [
            ("destination.wrapped_token_address", &destination.wrapped_token_address),
            ("destination.mint_controller_address", &destination.mint_controller_address),
        ] {
            if !is_valid_eth_address(value) {
                return fail(format!("{} is invalid: {}", name, value));
            }
        }
        if destination.validator_addresses.is_empty() {
            return fail("destination.validator_addresses is empty".to_string());
        }
        if let Some(bad) = destination
            .validator_addresses
            .iter()
            .find(|a| !is_valid_eth_address(a))
        {
            return fail(format!("destination.validator_addresses has invalid entry {}", bad));
        }

        for (name, service) in self.services() {
            if service.enabled && service.interval_ms == 0 {
                return fail(format!("{}.interval_ms must be positive", name));
            }
        }
        if self.health.interval_ms == 0 {
            return fail("health.interval_ms must be positive".to_string());
        }
        Ok(())
    }

    /// Worker settings keyed by their section name.
    pub fn services(&self) -> [(&'static str, ServiceConfig); 6] {
        [
            ("mint_monitor", self.mint_monitor),
            ("mint_signer", self.mint_signer),
            ("mint_executor", self.mint_executor),
            ("burn_monitor", self.burn_monitor),
            ("burn_signer", self.burn_signer),
            ("burn_executor", self.burn_executor),
        ]
    }
}

fn check_url(name: &str, value: &str) -> BridgeResult<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| BridgeError::Config(format!("{} is not a valid URL ({}): {}", name, value, e)))
}
