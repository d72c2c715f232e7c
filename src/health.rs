//! Health Reporting
//!
//! Workers publish a status snapshot after every tick. The reporter upserts
//! the snapshots of this host into `health_checks`, which is also where a
//! restarted node can resume its chain cursors from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::BridgeResult;
use crate::models::{now, timestamp_value, HealthRecord, ServiceHealth, COLLECTION_HEALTH_CHECKS};
use crate::store::{self, Database, Filter, Update};
use crate::workers::{Progress, Worker};

pub const NAME: &str = "health";

// ============================================================================
// STATUS BOARD
// ============================================================================

/// Latest snapshot per worker, shared between the runner and the reporter.
#[derive(Default)]
pub struct StatusBoard {
    services: RwLock<BTreeMap<String, ServiceHealth>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one tick.
    pub async fn record(
        &self,
        name: &str,
        healthy: bool,
        progress: Progress,
        last_sync_time: DateTime<Utc>,
        next_sync_time: DateTime<Utc>,
    ) {
        let snapshot = ServiceHealth {
            name: name.to_string(),
            healthy,
            eth_block_number: progress.eth_block_number.map(|n| n.to_string()).unwrap_or_default(),
            pokt_height: progress.pokt_height.map(|n| n.to_string()).unwrap_or_default(),
            last_sync_time,
            next_sync_time,
        };
        self.services.write().await.insert(name.to_string(), snapshot);
    }

    /// Snapshots ordered by worker name.
    pub async fn snapshot(&self) -> Vec<ServiceHealth> {
        self.services.read().await.values().cloned().collect()
    }
}

// ============================================================================
// REPORTER
// ============================================================================

/// Addresses that identify this validator in its health record.
#[derive(Debug, Clone)]
pub struct ValidatorIdentity {
    /// `0x` hex of the source address
    pub validator_id: String,
    pub eth_address: String,
    /// bech32 source address
    pub pokt_address: String,
    pub pokt_vault_address: String,
}

pub struct HealthReporter {
    db: Arc<dyn Database>,
    hostname: String,
    identity: ValidatorIdentity,
    board: Arc<StatusBoard>,
}

impl HealthReporter {
    pub fn new(db: Arc<dyn Database>, hostname: &str, identity: ValidatorIdentity, board: Arc<StatusBoard>) -> Self {
        Self {
            db,
            hostname: hostname.to_string(),
            identity,
            board,
        }
    }

    /// Upserts this host's record from the current snapshots.
    pub async fn report(&self) -> BridgeResult<()> {
        let services = self.board.snapshot().await;
        let healthy = services.iter().all(|s| s.healthy);
        let timestamp = timestamp_value(now());

        let update = Update::new()
            .set("validator_id", self.identity.validator_id.as_str())
            .set("eth_address", self.identity.eth_address.as_str())
            .set("pokt_address", self.identity.pokt_address.as_str())
            .set("pokt_vault_address", self.identity.pokt_vault_address.as_str())
            .set("healthy", healthy)
            .set_serialized("service_healths", &services)?
            .set("updated_at", timestamp.clone())
            .set_on_insert("created_at", timestamp);
        self.db
            .upsert_one(
                COLLECTION_HEALTH_CHECKS,
                &Filter::new().eq("hostname", self.hostname.as_str()),
                &update,
            )
            .await?;
        debug!(
            "[HEALTH] Reported {} services for {} (healthy: {})",
            services.len(),
            self.hostname,
            healthy
        );
        Ok(())
    }
}

#[async_trait]
impl Worker for HealthReporter {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&mut self) -> BridgeResult<()> {
        self.report().await
    }
}

// ============================================================================
// RESUME
// ============================================================================

/// Last health record written by `hostname`, if any.
pub async fn read_last_health(db: &dyn Database, hostname: &str) -> BridgeResult<Option<HealthRecord>> {
    let record: Option<HealthRecord> = store::find_one_as(
        db,
        COLLECTION_HEALTH_CHECKS,
        &Filter::new().eq("hostname", hostname),
    )
    .await?;
    if let Some(record) = &record {
        info!(
            "[HEALTH] Found last health record for {} with {} services",
            hostname,
            record.service_healths.len()
        );
    }
    Ok(record)
}

/// Source height recorded for `service`, or `default` when absent or lower.
pub fn resume_pokt_height(record: Option<&HealthRecord>, service: &str, default: u64) -> u64 {
    resume(record, service, default, |s| &s.pokt_height)
}

/// Destination block recorded for `service`, or `default` when absent or lower.
pub fn resume_eth_block(record: Option<&HealthRecord>, service: &str, default: u64) -> u64 {
    resume(record, service, default, |s| &s.eth_block_number)
}

fn resume(record: Option<&HealthRecord>, service: &str, default: u64, field: fn(&ServiceHealth) -> &String) -> u64 {
    record
        .and_then(|r| r.service(service))
        .and_then(|s| field(s).parse::<u64>().ok())
        .map(|recorded| recorded.max(default))
        .unwrap_or(default)
}

/// Host name used as the health record key.
pub fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    std::fs::read_to_string("/etc/hostname")
        .map(|name| name.trim().to_string())
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
