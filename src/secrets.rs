//! Google Secret Manager ingestion.
//!
//! When enabled, empty sensitive config fields are filled from the latest
//! version of their named secrets before validation runs.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::gcp::GcpAuth;

pub const SECRET_MANAGER_ENDPOINT: &str = "https://secretmanager.googleapis.com/v1";

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

/// Reader for `projects/<project>/secrets/<name>/versions/latest`.
pub struct SecretManager<'a> {
    auth: &'a GcpAuth,
    endpoint: String,
    project_id: String,
}

impl<'a> SecretManager<'a> {
    pub fn new(auth: &'a GcpAuth, endpoint: &str, project_id: &str) -> Self {
        Self {
            auth,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
        }
    }

    pub async fn access_latest(&self, name: &str) -> Result<String> {
        let url = format!(
            "{}/projects/{}/secrets/{}/versions/latest:access",
            self.endpoint, self.project_id, name
        );
        let token = self.auth.access_token().await?;
        let response: AccessSecretVersionResponse = self
            .auth
            .http()
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?
            .error_for_status()
            .with_context(|| format!("Secret {} could not be read", name))?
            .json()
            .await
            .with_context(|| format!("Failed to parse secret {}", name))?;

        let data = BASE64
            .decode(response.payload.data.as_bytes())
            .with_context(|| format!("Secret {} payload is not base64", name))?;
        let value = String::from_utf8(data).with_context(|| format!("Secret {} is not UTF-8", name))?;
        Ok(value.trim().to_string())
    }
}

async fn fill(target: &mut String, manager: &SecretManager<'_>, secret_name: &str, label: &str) -> Result<()> {
    if !target.trim().is_empty() || secret_name.trim().is_empty() {
        return Ok(());
    }
    debug!("[GSM] Reading {}", label);
    *target = manager
        .access_latest(secret_name)
        .await
        .with_context(|| format!("Failed to access {}", label))?;
    info!("[GSM] Successfully read {}", label);
    Ok(())
}

/// Fills empty secret-backed fields of `config`.
///
/// The mnemonic is only fetched when no KMS key is configured.
pub async fn read_secrets(config: &mut Config, auth: &GcpAuth, endpoint: &str) -> Result<()> {
    let settings = config.secret_manager.clone();
    if !settings.enabled {
        debug!("[GSM] Google Secret Manager is disabled");
        return Ok(());
    }
    if settings.project_id.trim().is_empty() {
        return Err(anyhow::anyhow!("[GSM] project_id is empty"));
    }

    let manager = SecretManager::new(auth, endpoint, &settings.project_id);

    if config.source.kms_key.trim().is_empty() {
        fill(&mut config.source.mnemonic, &manager, &settings.mnemonic_secret_name, "mnemonic").await?;
    }
    fill(
        &mut config.destination.private_key,
        &manager,
        &settings.eth_private_key_secret_name,
        "destination private key",
    )
    .await?;
    fill(&mut config.mongodb.uri, &manager, &settings.mongodb_uri_secret_name, "mongodb uri").await?;
    Ok(())
}
