//! MongoDB-backed document store.
//!
//! Documents travel as `serde_json::Value` and are converted to BSON at the
//! boundary. Advisory locks live in the `locks` collection: one record per
//! resource, guarded by the `_id` uniqueness of that record and expired by a
//! TTL index on `expires_at`.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, UpdateOptions};
use mongodb::{Client, Collection, IndexModel};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{Condition, Database, Filter, LockHandle, LockMode, LockOptions, Update};
use crate::error::{BridgeError, BridgeResult};
use crate::models::{COLLECTION_LOCKS, UNIQUE_INDEXES};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB implementation of [`Database`].
pub struct MongoStore {
    db: mongodb::Database,
    options: LockOptions,
}

impl MongoStore {
    /// Connects to the database and ensures indexes exist.
    ///
    /// # Arguments
    ///
    /// * `uri` - MongoDB connection string
    /// * `database` - Database name
    /// * `timeout` - Connect and server-selection timeout
    /// * `options` - Advisory lock timing
    pub async fn connect(
        uri: &str,
        database: &str,
        timeout: Duration,
        options: LockOptions,
    ) -> BridgeResult<Self> {
        let mut client_options = ClientOptions::parse(uri).await.map_err(store_err)?;
        client_options.connect_timeout = Some(timeout);
        client_options.server_selection_timeout = Some(timeout);
        client_options.app_name = Some("bridge-validator".to_string());

        let client = Client::with_options(client_options).map_err(store_err)?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(store_err)?;

        let store = Self { db, options };
        store.ensure_indexes().await?;
        info!("Connected to MongoDB database {}", database);
        Ok(store)
    }

    async fn ensure_indexes(&self) -> BridgeResult<()> {
        for (collection, fields) in UNIQUE_INDEXES {
            let mut keys = Document::new();
            for field in fields.iter() {
                keys.insert(field.to_string(), 1);
            }
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.collection(collection)
                .create_index(model, None)
                .await
                .map_err(store_err)?;
        }

        let ttl = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Duration::from_secs(0))
                    .build(),
            )
            .build();
        self.collection(COLLECTION_LOCKS)
            .create_index(ttl, None)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    async fn clear_expired(&self, resource: &str) -> BridgeResult<()> {
        let now = bson::DateTime::now();
        self.collection(COLLECTION_LOCKS)
            .delete_one(doc! { "_id": resource, "expires_at": { "$lt": now } }, None)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    fn expiry(&self) -> bson::DateTime {
        let millis = chrono::Utc::now().timestamp_millis() + self.options.ttl.as_millis() as i64;
        bson::DateTime::from_millis(millis)
    }

    async fn try_acquire(&self, handle: &LockHandle) -> BridgeResult<bool> {
        let locks = self.collection(COLLECTION_LOCKS);
        let outcome = match handle.mode {
            LockMode::Exclusive => locks
                .insert_one(
                    doc! {
                        "_id": handle.resource.as_str(),
                        "mode": handle.mode.as_str(),
                        "holders": [handle.token.as_str()],
                        "expires_at": self.expiry(),
                    },
                    None,
                )
                .await
                .map(|_| ()),
            LockMode::Shared => locks
                .update_one(
                    doc! { "_id": handle.resource.as_str(), "mode": handle.mode.as_str() },
                    doc! {
                        "$push": { "holders": handle.token.as_str() },
                        "$set": { "expires_at": self.expiry() },
                    },
                    UpdateOptions::builder().upsert(true).build(),
                )
                .await
                .map(|_| ()),
        };

        match outcome {
            Ok(()) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(store_err(e)),
        }
    }

    async fn acquire(&self, resource: &str, mode: LockMode) -> BridgeResult<LockHandle> {
        let handle = LockHandle::new(resource, mode);
        let deadline = Instant::now() + self.options.acquire_timeout;
        loop {
            self.clear_expired(resource).await?;
            if self.try_acquire(&handle).await? {
                debug!("Acquired {} lock on {}", mode.as_str(), resource);
                return Ok(handle);
            }
            if Instant::now() >= deadline {
                return Err(BridgeError::LockContention(resource.to_string()));
            }
            tokio::time::sleep(self.options.retry_delay()).await;
        }
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

fn store_err(err: mongodb::error::Error) -> BridgeError {
    BridgeError::Store(err.to_string())
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn to_bson(value: &Value) -> BridgeResult<Bson> {
    Bson::try_from(value.clone())
        .map_err(|e| BridgeError::Store(format!("cannot convert value to bson: {}", e)))
}

fn to_document(value: &Value) -> BridgeResult<Document> {
    match to_bson(value)? {
        Bson::Document(doc) => Ok(doc),
        other => Err(BridgeError::Store(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
    }
}

fn from_document(doc: Document) -> Value {
    Bson::Document(doc).into_relaxed_extjson()
}

fn condition_to_bson(condition: &Condition) -> BridgeResult<Document> {
    let values = |items: &[Value]| -> BridgeResult<Vec<Bson>> { items.iter().map(to_bson).collect() };
    Ok(match condition {
        Condition::Eq(path, value) => doc! { path: to_bson(value)? },
        Condition::Ne(path, value) => doc! { path: { "$ne": to_bson(value)? } },
        Condition::In(path, items) => doc! { path: { "$in": values(items)? } },
        Condition::NotIn(path, items) => doc! { path: { "$nin": values(items)? } },
        Condition::Exists(path, exists) => doc! { path: { "$exists": *exists } },
    })
}

fn filter_to_bson(filter: &Filter) -> BridgeResult<Document> {
    let mut clauses = filter
        .conditions
        .iter()
        .map(condition_to_bson)
        .collect::<BridgeResult<Vec<_>>>()?;
    Ok(match clauses.len() {
        0 => Document::new(),
        1 => clauses.remove(0),
        _ => doc! { "$and": clauses },
    })
}

fn update_to_bson(update: &Update) -> BridgeResult<Document> {
    let mut out = Document::new();
    if !update.set.is_empty() {
        out.insert("$set", to_document(&Value::Object(update.set.clone()))?);
    }
    if !update.unset.is_empty() {
        let mut unset = Document::new();
        for path in &update.unset {
            unset.insert(path.clone(), "");
        }
        out.insert("$unset", unset);
    }
    if !update.set_on_insert.is_empty() {
        out.insert(
            "$setOnInsert",
            to_document(&Value::Object(update.set_on_insert.clone()))?,
        );
    }
    Ok(out)
}

fn id_to_string(id: &Bson) -> String {
    match id {
        Bson::String(s) => s.clone(),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

// ============================================================================
// DATABASE IMPLEMENTATION
// ============================================================================

#[async_trait]
impl Database for MongoStore {
    async fn insert_one(&self, collection: &str, doc: Value) -> BridgeResult<String> {
        let mut document = to_document(&doc)?;
        if !document.contains_key("_id") {
            document.insert("_id", uuid::Uuid::new_v4().to_string());
        }
        match self.collection(collection).insert_one(document, None).await {
            Ok(result) => Ok(id_to_string(&result.inserted_id)),
            Err(e) if is_duplicate_key(&e) => Err(BridgeError::DuplicateKey {
                collection: collection.to_string(),
            }),
            Err(e) => Err(store_err(e)),
        }
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> BridgeResult<Option<Value>> {
        let found = self
            .collection(collection)
            .find_one(filter_to_bson(filter)?, None)
            .await
            .map_err(store_err)?;
        Ok(found.map(from_document))
    }

    async fn find_many(&self, collection: &str, filter: &Filter) -> BridgeResult<Vec<Value>> {
        let cursor = self
            .collection(collection)
            .find(filter_to_bson(filter)?, None)
            .await
            .map_err(store_err)?;
        let docs: Vec<Document> = cursor.try_collect().await.map_err(store_err)?;
        Ok(docs.into_iter().map(from_document).collect())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> BridgeResult<Option<String>> {
        let coll = self.collection(collection);
        let filter_doc = filter_to_bson(filter)?;
        // Capture the id first so callers learn which document was touched.
        let Some(existing) = coll
            .find_one(filter_doc.clone(), None)
            .await
            .map_err(store_err)?
        else {
            return Ok(None);
        };
        let Some(id) = existing.get("_id").cloned() else {
            return Ok(None);
        };

        let mut targeted = filter_doc;
        targeted.insert("_id", id.clone());
        match coll.update_one(targeted, update_to_bson(update)?, None).await {
            Ok(result) if result.matched_count == 0 => Ok(None),
            Ok(_) => Ok(Some(id_to_string(&id))),
            Err(e) if is_duplicate_key(&e) => Err(BridgeError::DuplicateKey {
                collection: collection.to_string(),
            }),
            Err(e) => Err(store_err(e)),
        }
    }

    async fn upsert_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> BridgeResult<String> {
        let coll = self.collection(collection);
        let filter_doc = filter_to_bson(filter)?;
        let mut update_doc = update_to_bson(update)?;

        let mut on_insert = update_doc
            .get_document("$setOnInsert")
            .cloned()
            .unwrap_or_default();
        on_insert.insert("_id", uuid::Uuid::new_v4().to_string());
        update_doc.insert("$setOnInsert", on_insert);

        let result = coll
            .update_one(
                filter_doc.clone(),
                update_doc,
                UpdateOptions::builder().upsert(true).build(),
            )
            .await
            .map_err(store_err)?;

        if let Some(id) = result.upserted_id {
            return Ok(id_to_string(&id));
        }
        let existing = coll
            .find_one(filter_doc, None)
            .await
            .map_err(store_err)?
            .and_then(|d| d.get("_id").map(id_to_string));
        existing.ok_or_else(|| BridgeError::Store(format!("upsert into {} lost its document", collection)))
    }

    async fn aggregate_max(
        &self,
        collection: &str,
        filter: &Filter,
        field: &str,
    ) -> BridgeResult<Option<u64>> {
        let pipeline = vec![
            doc! { "$match": filter_to_bson(filter)? },
            doc! { "$group": { "_id": Bson::Null, "max_value": { "$max": format!("${}", field) } } },
        ];
        let cursor = self
            .collection(collection)
            .aggregate(pipeline, None)
            .await
            .map_err(store_err)?;
        let results: Vec<Document> = cursor.try_collect().await.map_err(store_err)?;

        Ok(results.first().and_then(|d| match d.get("max_value") {
            Some(Bson::Int32(v)) => u64::try_from(*v).ok(),
            Some(Bson::Int64(v)) => u64::try_from(*v).ok(),
            Some(Bson::Double(v)) => Some(*v as u64),
            _ => None,
        }))
    }

    async fn xlock(&self, resource: &str) -> BridgeResult<LockHandle> {
        self.acquire(resource, LockMode::Exclusive).await
    }

    async fn slock(&self, resource: &str) -> BridgeResult<LockHandle> {
        self.acquire(resource, LockMode::Shared).await
    }

    async fn unlock(&self, handle: LockHandle) -> BridgeResult<()> {
        let locks = self.collection(COLLECTION_LOCKS);
        match handle.mode {
            LockMode::Exclusive => {
                locks
                    .delete_one(doc! { "_id": handle.resource.as_str(), "holders": handle.token.as_str() }, None)
                    .await
                    .map_err(store_err)?;
            }
            LockMode::Shared => {
                locks
                    .update_one(
                        doc! { "_id": handle.resource.as_str() },
                        doc! { "$pull": { "holders": handle.token.as_str() } },
                        None,
                    )
                    .await
                    .map_err(store_err)?;
                locks
                    .delete_one(
                        doc! { "_id": handle.resource.as_str(), "mode": "shared", "holders": { "$size": 0 } },
                        None,
                    )
                    .await
                    .map_err(store_err)?;
            }
        }
        debug!("Released {} lock on {}", handle.mode.as_str(), handle.resource);
        Ok(())
    }
}
