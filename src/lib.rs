//! Bridge Validator Library
//!
//! A validator node of the committee that bridges a Cosmos-style source chain
//! vault and an EVM wrapped token. Nodes share a document store and advisory
//! locks; each runs six workers that ingest transfers, sign them and settle
//! them on the counterpart chain.

pub mod config;
pub mod cosmos;
pub mod crypto;
pub mod error;
pub mod evm;
pub mod gcp;
pub mod health;
pub mod models;
pub mod runner;
pub mod secrets;
pub mod signer;
pub mod store;
pub mod workers;

// Re-export commonly used types
pub use config::Config;
pub use error::{BridgeError, BridgeResult};
pub use models::{Burn, HealthRecord, InvalidMint, Mint, Status};
pub use runner::Node;
pub use signer::Signer;
pub use store::{Database, MemoryStore, MongoStore};
pub use workers::{Worker, WorkerContext};
