//! In-process document store.
//!
//! Mirrors the semantics of the MongoDB store (unique indexes, dotted-path
//! filters with array matching, TTL advisory locks) over `RwLock<HashMap>`.
//! Several workers in one process can share it through an `Arc`, which is how
//! the multi-node scenarios in the test suite are driven.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

use super::{Condition, Database, Filter, LockHandle, LockMode, LockOptions, Update};
use crate::error::{BridgeError, BridgeResult};
use crate::models::UNIQUE_INDEXES;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug)]
struct LockEntry {
    mode: LockMode,
    holders: Vec<String>,
    expires_at: Instant,
}

/// In-memory implementation of [`Database`].
pub struct MemoryStore {
    /// Map of collection -> documents in insertion order
    collections: RwLock<HashMap<String, Vec<Value>>>,
    /// Map of collection -> unique field tuples
    unique_indexes: HashMap<String, Vec<Vec<String>>>,
    locks: Mutex<HashMap<String, LockEntry>>,
    options: LockOptions,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with the node's unique indexes and default lock timing.
    pub fn new() -> Self {
        Self::with_lock_options(LockOptions::default())
    }

    pub fn with_lock_options(options: LockOptions) -> Self {
        let unique_indexes = UNIQUE_INDEXES
            .iter()
            .map(|(collection, fields)| {
                (
                    collection.to_string(),
                    vec![fields.iter().map(|f| f.to_string()).collect()],
                )
            })
            .collect();

        Self {
            collections: RwLock::new(HashMap::new()),
            unique_indexes,
            locks: Mutex::new(HashMap::new()),
            options,
        }
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map(|docs| docs.len()).unwrap_or(0)
    }

    /// Whether anyone currently holds `resource` (expired records excluded).
    pub async fn is_locked(&self, resource: &str) -> bool {
        let locks = self.locks.lock().await;
        locks
            .get(resource)
            .map(|entry| entry.expires_at > Instant::now() && !entry.holders.is_empty())
            .unwrap_or(false)
    }

    fn violates_unique(&self, collection: &str, docs: &[Value], candidate: &Value, skip: Option<usize>) -> bool {
        let Some(indexes) = self.unique_indexes.get(collection) else {
            return false;
        };
        indexes.iter().any(|fields| {
            let key: Vec<Option<&Value>> = fields.iter().map(|f| lookup(candidate, f)).collect();
            docs.iter().enumerate().any(|(i, existing)| {
                if Some(i) == skip {
                    return false;
                }
                fields
                    .iter()
                    .zip(key.iter())
                    .all(|(f, v)| lookup(existing, f) == *v)
            })
        })
    }

    async fn acquire(&self, resource: &str, mode: LockMode) -> BridgeResult<LockHandle> {
        let handle = LockHandle::new(resource, mode);
        let deadline = Instant::now() + self.options.acquire_timeout;

        loop {
            {
                let mut locks = self.locks.lock().await;
                let now = Instant::now();
                if locks
                    .get(resource)
                    .map(|entry| entry.expires_at <= now || entry.holders.is_empty())
                    .unwrap_or(false)
                {
                    locks.remove(resource);
                }

                match locks.get_mut(resource) {
                    None => {
                        locks.insert(
                            resource.to_string(),
                            LockEntry {
                                mode,
                                holders: vec![handle.token.clone()],
                                expires_at: now + self.options.ttl,
                            },
                        );
                        return Ok(handle);
                    }
                    Some(entry) if mode == LockMode::Shared && entry.mode == LockMode::Shared => {
                        entry.holders.push(handle.token.clone());
                        entry.expires_at = now + self.options.ttl;
                        return Ok(handle);
                    }
                    Some(_) => {}
                }
            }

            if Instant::now() >= deadline {
                return Err(BridgeError::LockContention(resource.to_string()));
            }
            tokio::time::sleep(self.options.retry_delay()).await;
        }
    }
}

// ============================================================================
// FILTER EVALUATION
// ============================================================================

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// All values reachable at `path`, descending into arrays like MongoDB does.
fn resolve<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current: Vec<&Value> = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(obj) => {
                    if let Some(v) = obj.get(segment) {
                        next.push(v);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(v) = item.as_object().and_then(|o| o.get(segment)) {
                            next.push(v);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }

    let mut out = Vec::new();
    for value in current {
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
        out.push(value);
    }
    out
}

fn matches_value(doc: &Value, path: &str, expected: &Value) -> bool {
    let values = resolve(doc, path);
    if expected.is_null() {
        return values.is_empty() || values.iter().any(|v| v.is_null());
    }
    values.iter().any(|v| *v == expected)
}

fn matches(doc: &Value, filter: &Filter) -> bool {
    filter.conditions.iter().all(|condition| match condition {
        Condition::Eq(path, value) => matches_value(doc, path, value),
        Condition::Ne(path, value) => !matches_value(doc, path, value),
        Condition::In(path, values) => values.iter().any(|v| matches_value(doc, path, v)),
        Condition::NotIn(path, values) => !values.iter().any(|v| matches_value(doc, path, v)),
        Condition::Exists(path, exists) => lookup(doc, path).is_some() == *exists,
    })
}

fn assign(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(obj) = current.as_object_mut() else {
            return;
        };
        if i == segments.len() - 1 {
            obj.insert(segment.to_string(), value);
            return;
        }
        current = obj
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

fn remove(doc: &mut Value, path: &str) {
    let (parent, leaf) = match path.rsplit_once('.') {
        Some((parent, leaf)) => (lookup_mut(doc, parent), leaf),
        None => (Some(doc), path),
    };
    if let Some(Value::Object(obj)) = parent {
        obj.remove(leaf);
    }
}

fn lookup_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

fn apply(doc: &mut Value, update: &Update, inserting: bool) {
    for (path, value) in &update.set {
        assign(doc, path, value.clone());
    }
    for path in &update.unset {
        remove(doc, path);
    }
    if inserting {
        for (path, value) in &update.set_on_insert {
            assign(doc, path, value.clone());
        }
    }
}

fn numeric(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// ============================================================================
// DATABASE IMPLEMENTATION
// ============================================================================

#[async_trait]
impl Database for MemoryStore {
    async fn insert_one(&self, collection: &str, mut doc: Value) -> BridgeResult<String> {
        let obj = doc
            .as_object_mut()
            .ok_or_else(|| BridgeError::Store("document must be an object".to_string()))?;
        let id = match obj.get("_id") {
            Some(Value::String(id)) => id.clone(),
            _ => {
                let id = uuid::Uuid::new_v4().to_string();
                obj.insert("_id".to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let id_taken = docs
            .iter()
            .any(|d| d.get("_id").and_then(Value::as_str) == Some(id.as_str()));
        if id_taken || self.violates_unique(collection, docs, &doc, None) {
            return Err(BridgeError::DuplicateKey {
                collection: collection.to_string(),
            });
        }
        docs.push(doc);
        Ok(id)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> BridgeResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, filter)).cloned()))
    }

    async fn find_many(&self, collection: &str, filter: &Filter) -> BridgeResult<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, filter)).cloned().collect())
            .unwrap_or_default())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> BridgeResult<Option<String>> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = docs.iter().position(|d| matches(d, filter)) else {
            return Ok(None);
        };

        let mut updated = docs[index].clone();
        apply(&mut updated, update, false);
        if self.violates_unique(collection, docs, &updated, Some(index)) {
            return Err(BridgeError::DuplicateKey {
                collection: collection.to_string(),
            });
        }
        let id = super::document_id(&updated);
        docs[index] = updated;
        Ok(id)
    }

    async fn upsert_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> BridgeResult<String> {
        if let Some(id) = self.update_one(collection, filter, update).await? {
            return Ok(id);
        }

        let mut doc = Value::Object(Map::new());
        for condition in &filter.conditions {
            if let Condition::Eq(path, value) = condition {
                assign(&mut doc, path, value.clone());
            }
        }
        apply(&mut doc, update, true);
        self.insert_one(collection, doc).await
    }

    async fn aggregate_max(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
    ) -> BridgeResult<Option<u64>> {
        let docs = self.find_many(collection, filter).await?;
        Ok(docs
            .iter()
            .filter_map(|d| lookup(d, field).and_then(numeric))
            .max())
    }

    async fn xlock(&self, resource: &str) -> BridgeResult<LockHandle> {
        self.acquire(resource, LockMode::Exclusive).await
    }

    async fn slock(&self, resource: &str) -> BridgeResult<LockHandle> {
        self.acquire(resource, LockMode::Shared).await
    }

    async fn unlock(&self, handle: LockHandle) -> BridgeResult<()> {
        let mut locks = self.locks.lock().await;
        if let Some(entry) = locks.get_mut(&handle.resource) {
            entry.holders.retain(|token| token != &handle.token);
            if entry.holders.is_empty() {
                locks.remove(&handle.resource);
            }
        }
        Ok(())
    }
}
