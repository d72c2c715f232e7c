//! Google Cloud KMS backed signer.
//!
//! A single `EC_SIGN_SECP256K1_SHA256` key version signs for both chains.
//! KMS returns DER signatures without a recovery id, so signatures are
//! normalized to low-S and the recovery id is found locally.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use k256::ecdsa::{Signature, VerifyingKey};
use k256::pkcs8::DecodePublicKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::Signer;
use crate::crypto::{self, COSMOS_PUBLIC_KEY_LENGTH};
use crate::error::{BridgeError, BridgeResult};
use crate::gcp::GcpAuth;

pub const KMS_ENDPOINT: &str = "https://cloudkms.googleapis.com/v1";
pub const REQUIRED_ALGORITHM: &str = "EC_SIGN_SECP256K1_SHA256";

#[derive(Debug, Deserialize)]
struct CryptoKeyVersion {
    algorithm: String,
}

#[derive(Debug, Deserialize)]
struct PublicKeyResponse {
    pem: String,
}

#[derive(Debug, Serialize)]
struct AsymmetricSignRequest {
    digest: Digest,
}

#[derive(Debug, Serialize)]
struct Digest {
    sha256: String,
}

#[derive(Debug, Deserialize)]
struct AsymmetricSignResponse {
    signature: String,
}

/// Signer whose key never leaves Cloud KMS.
pub struct GcpKmsSigner {
    auth: Arc<GcpAuth>,
    endpoint: String,
    /// Full key version resource name
    key_name: String,
    verifying_key: VerifyingKey,
    cosmos_public_key: [u8; COSMOS_PUBLIC_KEY_LENGTH],
    eth_address: String,
}

impl GcpKmsSigner {
    pub async fn connect(auth: Arc<GcpAuth>, key_name: &str) -> BridgeResult<Self> {
        Self::connect_with_endpoint(auth, KMS_ENDPOINT, key_name).await
    }

    /// Checks the key algorithm and loads the public key.
    pub async fn connect_with_endpoint(auth: Arc<GcpAuth>, endpoint: &str, key_name: &str) -> BridgeResult<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();

        let version: CryptoKeyVersion = get_json(&auth, &format!("{}/{}", endpoint, key_name))
            .await
            .map_err(|e| BridgeError::Config(format!("{:#}", e)))?;
        if version.algorithm != REQUIRED_ALGORITHM {
            return Err(BridgeError::Config(format!(
                "KMS key algorithm is {}, expected {}",
                version.algorithm, REQUIRED_ALGORITHM
            )));
        }

        let public_key: PublicKeyResponse = get_json(&auth, &format!("{}/{}/publicKey", endpoint, key_name))
            .await
            .map_err(|e| BridgeError::Config(format!("{:#}", e)))?;
        let verifying_key = VerifyingKey::from_public_key_pem(&public_key.pem)
            .map_err(|e| BridgeError::Config(format!("invalid KMS public key PEM: {}", e)))?;

        let mut cosmos_public_key = [0u8; COSMOS_PUBLIC_KEY_LENGTH];
        cosmos_public_key.copy_from_slice(verifying_key.to_encoded_point(true).as_bytes());
        let eth_address = crypto::eth_address(&verifying_key);
        info!("[KMS SIGNER] Loaded key {} with address {}", key_name, eth_address);

        Ok(Self {
            auth,
            endpoint,
            key_name: key_name.to_string(),
            verifying_key,
            cosmos_public_key,
            eth_address,
        })
    }

    /// Signs a sha256-sized digest and returns the low-S signature.
    async fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature> {
        let token = self.auth.access_token().await?;
        let url = format!("{}/{}:asymmetricSign", self.endpoint, self.key_name);
        let request = AsymmetricSignRequest {
            digest: Digest {
                sha256: BASE64.encode(digest),
            },
        };
        let response: AsymmetricSignResponse = self
            .auth
            .http()
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send asymmetricSign request to {}", url))?
            .error_for_status()
            .context("KMS rejected asymmetricSign")?
            .json()
            .await
            .context("Failed to parse asymmetricSign response")?;

        let der = BASE64
            .decode(response.signature.as_bytes())
            .context("KMS signature is not base64")?;
        let signature = Signature::from_der(&der).context("KMS signature is not DER")?;
        Ok(signature.normalize_s().unwrap_or(signature))
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(auth: &GcpAuth, url: &str) -> Result<T> {
    let token = auth.access_token().await?;
    auth.http()
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .with_context(|| format!("Failed to send request to {}", url))?
        .error_for_status()
        .with_context(|| format!("Request to {} failed", url))?
        .json()
        .await
        .with_context(|| format!("Failed to parse response from {}", url))
}

#[async_trait]
impl Signer for GcpKmsSigner {
    fn cosmos_public_key(&self) -> [u8; COSMOS_PUBLIC_KEY_LENGTH] {
        self.cosmos_public_key
    }

    async fn cosmos_sign(&self, message: &[u8]) -> BridgeResult<[u8; 64]> {
        let digest = crypto::sha256(message);
        let signature = self
            .sign_digest(&digest)
            .await
            .map_err(|e| BridgeError::Signing(format!("{:#}", e)))?;
        let mut out = [0u8; 64];
        out.copy_from_slice(&signature.to_bytes());
        Ok(out)
    }

    fn eth_address(&self) -> String {
        self.eth_address.clone()
    }

    async fn eth_sign(&self, digest: &[u8; 32]) -> BridgeResult<[u8; 65]> {
        let signature = self
            .sign_digest(digest)
            .await
            .map_err(|e| BridgeError::Signing(format!("{:#}", e)))?;
        crypto::to_eth_signature(digest, &signature, &self.verifying_key)
            .map_err(|e| BridgeError::Signing(e.to_string()))
    }
}
