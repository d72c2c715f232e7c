//! Shared Document Store Module
//!
//! The document store is the only coordination substrate between validator
//! nodes. Every node reads and writes the same collections and serializes
//! mutations through advisory locks hosted by the store itself.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: Every write to a transfer document must happen while holding the
//! exclusive lock on `<collection>/<id>`. Locks carry a server-side TTL so a
//! crashed holder cannot wedge a resource forever.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::{BridgeError, BridgeResult};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

// ============================================================================
// FILTERS AND UPDATES
// ============================================================================

/// A single predicate on a (possibly dotted) document path.
///
/// Array semantics follow MongoDB: a predicate on a path that crosses an
/// array matches when any element satisfies it.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    Exists(String, bool),
}

/// Conjunction of conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(path.to_string(), value.into()));
        self
    }

    pub fn ne(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Ne(path.to_string(), value.into()));
        self
    }

    pub fn is_in<V: Into<Value>>(mut self, path: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.push(Condition::In(path.to_string(), values));
        self
    }

    pub fn not_in<V: Into<Value>>(mut self, path: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.push(Condition::NotIn(path.to_string(), values));
        self
    }

    pub fn exists(mut self, path: &str, exists: bool) -> Self {
        self.conditions.push(Condition::Exists(path.to_string(), exists));
        self
    }

    /// Filter on the store-assigned document id.
    pub fn by_id(id: &str) -> Self {
        Self::new().eq("_id", id)
    }
}

/// Field assignments applied by `update_one` / `upsert_one`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Map<String, Value>,
    pub unset: Vec<String>,
    pub set_on_insert: Map<String, Value>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.set.insert(path.to_string(), value.into());
        self
    }

    /// Serializes `value` and assigns it to `path`.
    pub fn set_serialized<T: Serialize>(self, path: &str, value: &T) -> BridgeResult<Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.set(path, value))
    }

    pub fn unset(mut self, path: &str) -> Self {
        self.unset.push(path.to_string());
        self
    }

    pub fn set_on_insert(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.set_on_insert.insert(path.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.set_on_insert.is_empty()
    }
}

// ============================================================================
// ADVISORY LOCKS
// ============================================================================

/// Lock acquisition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Exclusive,
    Shared,
}

impl LockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Exclusive => "exclusive",
            LockMode::Shared => "shared",
        }
    }
}

/// Proof of a held lock. Must be passed back to `unlock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    pub resource: String,
    pub token: String,
    pub mode: LockMode,
}

impl LockHandle {
    pub(crate) fn new(resource: &str, mode: LockMode) -> Self {
        Self {
            resource: resource.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            mode,
        }
    }
}

/// Timing parameters for advisory locks.
#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// Lifetime of a lock record before it is considered abandoned
    pub ttl: Duration,
    /// How long an acquire keeps retrying before reporting contention
    pub acquire_timeout: Duration,
    /// Pause between acquisition attempts
    pub retry_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(100),
        }
    }
}

impl LockOptions {
    /// Pause before the next attempt, jittered so contending nodes spread out.
    pub fn retry_delay(&self) -> Duration {
        let base = self.retry_interval.as_millis() as u64;
        let jitter = if base > 1 {
            rand::Rng::gen_range(&mut rand::thread_rng(), 0..base / 2)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }
}

/// Resource name of the global source-account sequence ledger.
pub const SEQUENCE_LOCK_RESOURCE: &str = "cosmos_sequence";

/// Lock resource naming for a single document.
pub fn document_resource(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, id)
}

// ============================================================================
// DATABASE CAPABILITY
// ============================================================================

/// Document CRUD plus advisory locking, shared by every worker on every node.
#[async_trait]
pub trait Database: Send + Sync {
    /// Inserts a document and returns its id. Documents without `_id` get a
    /// fresh one. Unique-index conflicts surface as `BridgeError::DuplicateKey`.
    async fn insert_one(&self, collection: &str, doc: Value) -> BridgeResult<String>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> BridgeResult<Option<Value>>;

    async fn find_many(&self, collection: &str, filter: &Filter) -> BridgeResult<Vec<Value>>;

    /// Applies `update` to the first matching document. Returns the id of the
    /// matched document, or `None` when nothing matched.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> BridgeResult<Option<String>>;

    /// Like `update_one`, inserting a new document from the equality
    /// conditions of `filter` when nothing matched.
    async fn upsert_one(&self, collection: &str, filter: &Filter, update: &Update)
        -> BridgeResult<String>;

    /// `$match` + `$group { $max }` over a numeric field.
    async fn aggregate_max(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
    ) -> BridgeResult<Option<u64>>;

    /// Exclusive lock, retrying until the acquire timeout.
    async fn xlock(&self, resource: &str) -> BridgeResult<LockHandle>;

    /// Shared lock, compatible with other shared holders only.
    async fn slock(&self, resource: &str) -> BridgeResult<LockHandle>;

    async fn unlock(&self, handle: LockHandle) -> BridgeResult<()>;
}

// ============================================================================
// TYPED HELPERS
// ============================================================================

/// Serializes and inserts a model.
pub async fn insert<T: Serialize>(db: &dyn Database, collection: &str, doc: &T) -> BridgeResult<String> {
    let mut value = serde_json::to_value(doc)?;
    if let Some(obj) = value.as_object_mut() {
        if obj.get("_id").map(Value::is_null).unwrap_or(false) {
            obj.remove("_id");
        }
    }
    db.insert_one(collection, value).await
}

pub async fn find_one_as<T: DeserializeOwned>(
    db: &dyn Database,
    collection: &str,
    filter: &Filter,
) -> BridgeResult<Option<T>> {
    match db.find_one(collection, filter).await? {
        Some(value) => Ok(Some(decode(collection, value)?)),
        None => Ok(None),
    }
}

pub async fn find_many_as<T: DeserializeOwned>(
    db: &dyn Database,
    collection: &str,
    filter: &Filter,
) -> BridgeResult<Vec<T>> {
    db.find_many(collection, filter)
        .await?
        .into_iter()
        .map(|value| decode(collection, value))
        .collect()
}

fn decode<T: DeserializeOwned>(collection: &str, value: Value) -> BridgeResult<T> {
    serde_json::from_value(value)
        .map_err(|e| BridgeError::Store(format!("malformed document in {}: {}", collection, e)))
}

/// Id of a raw document, if it carries one.
pub fn document_id(doc: &Value) -> Option<String> {
    match doc.get("_id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(other) if !other.is_null() => Some(other.to_string()),
        _ => None,
    }
}
