//! Bridge Validator Node
//!
//! Loads configuration (and secrets), validates the node against both chains,
//! then runs the workers until interrupted.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: The node refuses to start unless its key is a member of the
//! configured vault multisig and its destination address is a configured
//! validator.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bridge_validator::config::Config;
use bridge_validator::cosmos::{LcdCosmosClient, MultisigKey};
use bridge_validator::evm::{EvmClient, JsonRpcEvmClient, RpcMintController, RpcWrappedToken};
use bridge_validator::gcp::GcpAuth;
use bridge_validator::health::{hostname, read_last_health};
use bridge_validator::runner::{validate_startup, Node};
use bridge_validator::secrets::{read_secrets, SECRET_MANAGER_ENDPOINT};
use bridge_validator::signer::build_signer;
use bridge_validator::store::{Database, LockOptions, MongoStore};
use bridge_validator::workers::{BridgeSettings, WorkerContext};

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::load()?;
    init_logging(&config.logger.level);
    info!("Starting Bridge Validator");

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.source.rpc_timeout_ms))
        .build()
        .context("Failed to create HTTP client")?;
    let auth = Arc::new(GcpAuth::from_environment(http));

    read_secrets(&mut config, &auth, SECRET_MANAGER_ENDPOINT).await?;
    config.validate()?;
    info!("Configuration loaded successfully");

    let db: Arc<dyn Database> = Arc::new(
        MongoStore::connect(
            &config.mongodb.uri,
            &config.mongodb.database,
            Duration::from_millis(config.mongodb.timeout_ms),
            LockOptions::default(),
        )
        .await?,
    );

    let cosmos = Arc::new(LcdCosmosClient::new(
        &config.source.rpc_url,
        &config.source.bech32_prefix,
        Duration::from_millis(config.source.rpc_timeout_ms),
    )?);
    let evm: Arc<dyn EvmClient> = Arc::new(JsonRpcEvmClient::new(
        &config.destination.rpc_url,
        Duration::from_millis(config.destination.rpc_timeout_ms),
    )?);
    let wrapped_token = Arc::new(RpcWrappedToken::new(evm.clone(), &config.destination.wrapped_token_address));
    let mint_controller = Arc::new(RpcMintController::new(evm.clone(), &config.destination.mint_controller_address));

    let signer = build_signer(&config, auth.clone()).await?;
    let multisig = MultisigKey::from_hex(config.source.multisig_threshold, &config.source.multisig_public_keys)?;
    info!(
        "Validator {} ({}) in a {}-of-{} vault",
        signer.eth_address(),
        signer.cosmos_address_hex(),
        multisig.threshold(),
        multisig.public_keys().len()
    );

    let ctx = Arc::new(WorkerContext {
        db: db.clone(),
        cosmos,
        evm,
        wrapped_token,
        mint_controller,
        signer,
        multisig,
        settings: BridgeSettings::from_config(&config),
    });
    validate_startup(&ctx, &config).await?;

    let hostname = hostname();
    let last_health = if config.health.read_last_health {
        read_last_health(db.as_ref(), &hostname).await?
    } else {
        None
    };

    let node = Node::start(ctx, &config, &hostname, last_health.as_ref())?;
    info!("All workers started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    node.stop().await;
    info!("Bridge Validator stopped");
    Ok(())
}
