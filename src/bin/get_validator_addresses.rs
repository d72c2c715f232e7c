//! Get Validator Addresses from Config
//!
//! Prints the addresses derived from the configured signer: the destination
//! address to register with the mint controller, and the source address and
//! public key to include in the vault multisig.

use anyhow::Result;
use std::sync::Arc;

use bridge_validator::config::Config;
use bridge_validator::crypto::bech32_encode;
use bridge_validator::gcp::GcpAuth;
use bridge_validator::secrets::{read_secrets, SECRET_MANAGER_ENDPOINT};
use bridge_validator::signer::build_signer;

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::load()?;

    let auth = Arc::new(GcpAuth::from_environment(reqwest::Client::new()));
    read_secrets(&mut config, &auth, SECRET_MANAGER_ENDPOINT).await?;

    let signer = build_signer(&config, auth).await?;
    let cosmos_address = bech32_encode(&config.source.bech32_prefix, &signer.cosmos_address_bytes())?;

    println!("eth_address: {}", signer.eth_address());
    println!("cosmos_address: {}", cosmos_address);
    println!("cosmos_public_key: {}", hex::encode(signer.cosmos_public_key()));

    Ok(())
}
