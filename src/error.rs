//! Error kinds shared by the workers.
//!
//! Each variant maps to one handling policy: a tick either skips a document,
//! retries next tick, marks the document failed, or (at startup) exits.

use thiserror::Error;

/// Errors surfaced by the store, the chain capabilities and the workers.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Missing or inconsistent configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// An RPC call to either chain failed or returned an unusable payload.
    #[error("chain rpc error: {0}")]
    ChainRpc(String),

    /// The shared store rejected or failed an operation.
    #[error("store error: {0}")]
    Store(String),

    /// Insert against a unique index hit an existing document.
    #[error("duplicate key in collection {collection}")]
    DuplicateKey { collection: String },

    /// Advisory lock could not be acquired before the timeout.
    #[error("lock contention on {0}")]
    LockContention(String),

    /// A document that was previously acceptable no longer validates.
    #[error("validation failure: {0}")]
    Validation(String),

    /// Signatures or bodies that do not verify during aggregation.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The signing backend failed to produce a signature.
    #[error("signing error: {0}")]
    Signing(String),

    /// Committee or multisig misconfiguration detected at startup.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl BridgeError {
    /// True for an insert that lost the race against another node.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, BridgeError::DuplicateKey { .. })
    }

    /// True when the document should simply be retried on a later tick.
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, BridgeError::LockContention(_))
    }

    /// Wraps an RPC failure, keeping the full context chain in the message.
    pub fn chain_rpc(err: impl std::fmt::Display) -> Self {
        BridgeError::ChainRpc(format!("{:#}", err))
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::ChainRpc(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Store(format!("serialization: {}", err))
    }
}

/// Convenience alias used across the crate.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
