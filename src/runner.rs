//! Node Runner
//!
//! Startup checks against both chains, then one task per enabled worker plus
//! the health reporter. Each task ticks on its interval until the node is
//! stopped; a stop cancels the sleep but never interrupts an in-flight tick.

use alloy_primitives::U256;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::crypto::bech32_encode;
use crate::error::{BridgeError, BridgeResult};
use crate::health::{self, HealthReporter, StatusBoard, ValidatorIdentity};
use crate::models::HealthRecord;
use crate::workers::{
    burn_executor, burn_monitor, burn_signer, mint_executor, mint_monitor, mint_signer, BurnExecutor, BurnMonitor,
    BurnSigner, MintExecutor, MintMonitor, MintSigner, Worker, WorkerContext,
};

// ============================================================================
// STARTUP VALIDATION
// ============================================================================

/// Chain-facing checks. Any failure is fatal.
pub async fn validate_startup(ctx: &WorkerContext, config: &Config) -> BridgeResult<()> {
    ctx.cosmos.validate_network(&config.source.chain_id).await?;
    ctx.evm.validate_network(config.destination.chain_id).await?;
    info!(
        "[STARTUP] Networks validated: source {}, destination {}",
        config.source.chain_id, config.destination.chain_id
    );

    ctx.multisig.check_vault(
        &ctx.settings.bech32_prefix,
        &ctx.settings.vault_address,
        &ctx.signer.cosmos_public_key(),
    )?;

    let eth_address = ctx.signer.eth_address();
    if !config
        .destination
        .validator_addresses
        .iter()
        .any(|a| a.eq_ignore_ascii_case(&eth_address))
    {
        return Err(BridgeError::Invariant(format!(
            "validator address {} is not in destination.validator_addresses",
            eth_address
        )));
    }

    let validator_count = ctx.mint_controller.validator_count().await?;
    if validator_count.is_zero() {
        return Err(BridgeError::Invariant("mint controller reports no validators".to_string()));
    }
    if validator_count != U256::from(config.destination.validator_addresses.len()) {
        warn!(
            "[STARTUP] Mint controller reports {} validators, {} configured",
            validator_count,
            config.destination.validator_addresses.len()
        );
    }

    let max_mint_limit = ctx.mint_controller.max_mint_limit().await?;
    if max_mint_limit < U256::from(ctx.settings.tx_fee) {
        return Err(BridgeError::Invariant(format!(
            "max mint limit {} is below the minimum amount {}",
            max_mint_limit, ctx.settings.tx_fee
        )));
    }

    info!("[STARTUP] Validator {} passed startup validation", eth_address);
    Ok(())
}

/// Identity written into this host's health record.
pub fn validator_identity(ctx: &WorkerContext) -> BridgeResult<ValidatorIdentity> {
    let pokt_address = bech32_encode(&ctx.settings.bech32_prefix, &ctx.signer.cosmos_address_bytes())
        .map_err(|e| BridgeError::Config(format!("{:#}", e)))?;
    Ok(ValidatorIdentity {
        validator_id: ctx.signer.cosmos_address_hex(),
        eth_address: ctx.signer.eth_address(),
        pokt_address,
        pokt_vault_address: ctx.settings.vault_address.clone(),
    })
}

// ============================================================================
// WORKER TASKS
// ============================================================================

/// Runs `worker` every `interval` until `shutdown` flips to true.
///
/// When `board` is given, each tick's outcome is published to it.
pub fn spawn_worker(
    mut worker: Box<dyn Worker>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    board: Option<Arc<StatusBoard>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = worker.name();
        info!("[RUNNER] Starting {} every {:?}", name, interval);
        let step = chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero());

        while !*shutdown.borrow() {
            let started = Utc::now();
            let healthy = match worker.run().await {
                Ok(()) => true,
                Err(e) => {
                    error!("[RUNNER] {} tick failed: {}", name, e);
                    false
                }
            };
            if let Some(board) = &board {
                board
                    .record(name, healthy, worker.progress(), started, started + step)
                    .await;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("[RUNNER] Stopped {}", name);
    })
}

/// A running validator node.
pub struct Node {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    board: Arc<StatusBoard>,
}

impl Node {
    /// Spawns every enabled worker and the health reporter.
    ///
    /// `last_health` resumes the monitor and executor cursors when present.
    pub fn start(
        ctx: Arc<WorkerContext>,
        config: &Config,
        hostname: &str,
        last_health: Option<&HealthRecord>,
    ) -> BridgeResult<Self> {
        let (shutdown, receiver) = watch::channel(false);
        let board = Arc::new(StatusBoard::new());
        let mut handles = Vec::new();

        for (name, service) in config.services() {
            if !service.enabled {
                info!("[RUNNER] {} is disabled", name);
                continue;
            }
            let worker: Box<dyn Worker> = match name {
                mint_monitor::NAME => Box::new(MintMonitor::new(
                    ctx.clone(),
                    health::resume_pokt_height(last_health, name, config.source.start_height),
                )),
                mint_executor::NAME => Box::new(MintExecutor::new(
                    ctx.clone(),
                    health::resume_eth_block(last_health, name, config.destination.start_block),
                )),
                burn_monitor::NAME => Box::new(BurnMonitor::new(
                    ctx.clone(),
                    health::resume_eth_block(last_health, name, config.destination.start_block),
                )),
                mint_signer::NAME => Box::new(MintSigner::new(ctx.clone())),
                burn_signer::NAME => Box::new(BurnSigner::new(ctx.clone())),
                burn_executor::NAME => Box::new(BurnExecutor::new(ctx.clone())),
                other => return Err(BridgeError::Config(format!("unknown worker {}", other))),
            };
            handles.push(spawn_worker(
                worker,
                Duration::from_millis(service.interval_ms),
                receiver.clone(),
                Some(board.clone()),
            ));
        }

        let reporter = HealthReporter::new(ctx.db.clone(), hostname, validator_identity(&ctx)?, board.clone());
        handles.push(spawn_worker(
            Box::new(reporter),
            Duration::from_millis(config.health.interval_ms),
            receiver,
            None,
        ));

        info!("[RUNNER] Started {} tasks for host {}", handles.len(), hostname);
        Ok(Self {
            shutdown,
            handles,
            board,
        })
    }

    pub fn status_board(&self) -> Arc<StatusBoard> {
        self.board.clone()
    }

    /// Signals every task and waits for in-flight ticks to finish.
    pub async fn stop(self) {
        info!("[RUNNER] Stopping {} tasks", self.handles.len());
        let _ = self.shutdown.send(true);
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                error!("[RUNNER] Task ended abnormally: {}", e);
            }
        }
    }
}
