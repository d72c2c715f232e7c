//! Google Cloud access tokens.
//!
//! Tokens come from `GOOGLE_OAUTH_ACCESS_TOKEN` when set, otherwise from the
//! instance metadata server. They are cached until shortly before expiry and
//! shared by the KMS signer and the secret manager reader.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Cached bearer token source for Google Cloud REST APIs.
pub struct GcpAuth {
    http: Client,
    token_url: String,
    static_token: Option<String>,
    cached: Mutex<Option<(String, Instant)>>,
}

impl GcpAuth {
    /// Token source backed by the metadata server (or the env override).
    pub fn from_environment(http: Client) -> Self {
        let static_token = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::with_token_url(http, METADATA_TOKEN_URL, static_token)
    }

    pub fn with_token_url(http: Client, token_url: &str, static_token: Option<String>) -> Self {
        Self {
            http,
            token_url: token_url.to_string(),
            static_token,
            cached: Mutex::new(None),
        }
    }

    /// Always returns `token`; no network access.
    pub fn fixed(http: Client, token: &str) -> Self {
        Self::with_token_url(http, METADATA_TOKEN_URL, Some(token.to_string()))
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = &self.static_token {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some((token, expires_at)) = cached.as_ref() {
            if Instant::now() + REFRESH_MARGIN < *expires_at {
                return Ok(token.clone());
            }
        }

        let response: TokenResponse = self
            .http
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .with_context(|| format!("Failed to request access token from {}", self.token_url))?
            .error_for_status()
            .context("Metadata server refused the token request")?
            .json()
            .await
            .context("Failed to parse access token response")?;

        let expires_at = Instant::now() + Duration::from_secs(response.expires_in);
        *cached = Some((response.access_token.clone(), expires_at));
        Ok(response.access_token)
    }
}
