//! Embedded document store.
//!
//! Collections of JSON documents addressed by `(collection, id)`, with
//! equality/order-by queries, atomic write batches, and change events
//! broadcast after every commit. Subcollections are path-shaped
//! collection names (`posts/<id>/comments`), so clearing a document's
//! subtree is a prefix delete.

pub mod batch;
pub mod query;

pub use batch::{ChangeEvent, ChangeKind, WriteBatch};
pub use query::{Direction, Query};

use batch::WriteOp;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub(crate) const SCHEMA: &str = r#"
    PRAGMA journal_mode = WAL;

    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body TEXT NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (collection, id)
    );

    CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
"#;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Epoch milliseconds, the one timestamp representation documents carry.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("document {collection}/{id} is not a JSON object")]
    NotAnObject { collection: String, id: String },
    #[error("update patch for {collection}/{id} is not a JSON object")]
    PatchNotAnObject { collection: String, id: String },
    #[error("store mutex poisoned")]
    Poisoned,
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub body: Value,
    /// Server-stamped at commit time, epoch milliseconds.
    pub updated_at: i64,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            events,
        })
    }

    /// Real-time listen surface. Slow receivers lag and skip missed
    /// events; nothing here blocks writers.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&guard)
    }

    /// Missing documents are `None`, never an error.
    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT body, updated_at FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
                )
                .optional()?;
            match row {
                Some((raw, updated_at)) => Ok(Some(Document {
                    id: id.to_string(),
                    body: serde_json::from_str(&raw)?,
                    updated_at,
                })),
                None => Ok(None),
            }
        })
    }

    pub fn query(&self, query: Query) -> Result<Vec<Document>, StoreError> {
        let (sql, sql_params) = query.to_sql();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(sql_params), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?;
            let mut documents = Vec::new();
            for row in rows {
                let (id, raw, updated_at) = row?;
                documents.push(Document {
                    id,
                    body: serde_json::from_str(&raw)?,
                    updated_at,
                });
            }
            Ok(documents)
        })
    }

    /// Create-or-replace a single document.
    pub fn set(&self, collection: &str, id: &str, body: Value) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.set(collection, id, body);
        self.commit(batch)?;
        Ok(())
    }

    /// Shallow-merge a patch into an existing document. `NotFound` when
    /// the target is missing.
    pub fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.update(collection, id, patch);
        self.commit(batch)?;
        Ok(())
    }

    /// Returns whether a document was actually removed.
    pub fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut batch = WriteBatch::new();
        batch.delete(collection, id);
        let events = self.commit(batch)?;
        Ok(!events.is_empty())
    }

    /// Removes every document in exactly this collection.
    pub fn delete_collection(&self, collection: &str) -> Result<usize, StoreError> {
        let events = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let events = delete_where(&tx, "collection = ?1", params![collection])?;
            tx.commit()?;
            Ok(events)
        })?;
        Ok(self.broadcast(events))
    }

    /// Removes a document's whole subtree: the collection named `prefix`
    /// and every collection under `prefix/`.
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let pattern = format!("{}/%", escape_like(prefix));
        let events = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let events = delete_where(
                &tx,
                "collection = ?1 OR collection LIKE ?2 ESCAPE '\\'",
                params![prefix, pattern],
            )?;
            tx.commit()?;
            Ok(events)
        })?;
        Ok(self.broadcast(events))
    }

    /// Applies the batch in one transaction and broadcasts one change
    /// event per affected document after the commit. A failing op aborts
    /// the whole batch.
    pub fn commit(&self, batch: WriteBatch) -> Result<Vec<ChangeEvent>, StoreError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let events = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let now = now_millis();
            let mut events = Vec::with_capacity(batch.ops.len());
            for op in &batch.ops {
                apply_op(&tx, op, now, &mut events)?;
            }
            tx.commit()?;
            Ok(events)
        })?;
        self.broadcast(events.clone());
        Ok(events)
    }

    fn broadcast(&self, events: Vec<ChangeEvent>) -> usize {
        let count = events.len();
        for event in events {
            let _ = self.events.send(event);
        }
        count
    }
}

fn apply_op(
    tx: &Transaction<'_>,
    op: &WriteOp,
    now: i64,
    events: &mut Vec<ChangeEvent>,
) -> Result<(), StoreError> {
    match op {
        WriteOp::Set { collection, id, body } => {
            let existed = document_exists(tx, collection, id)?;
            let raw = serde_json::to_string(body)?;
            tx.execute(
                "INSERT INTO documents (collection, id, body, updated_at) VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                params![collection, id, raw, now],
            )?;
            events.push(ChangeEvent {
                collection: collection.clone(),
                id: id.clone(),
                kind: if existed { ChangeKind::Updated } else { ChangeKind::Created },
            });
        }
        WriteOp::Update { collection, id, patch } => {
            let mut body = load_object(tx, collection, id)?;
            let Value::Object(entries) = patch else {
                return Err(StoreError::PatchNotAnObject {
                    collection: collection.clone(),
                    id: id.clone(),
                });
            };
            for (key, value) in entries {
                body.insert(key.clone(), value.clone());
            }
            write_object(tx, collection, id, &body, now)?;
            events.push(ChangeEvent {
                collection: collection.clone(),
                id: id.clone(),
                kind: ChangeKind::Updated,
            });
        }
        WriteOp::Delete { collection, id } => {
            let affected = tx.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            if affected > 0 {
                events.push(ChangeEvent {
                    collection: collection.clone(),
                    id: id.clone(),
                    kind: ChangeKind::Deleted,
                });
            }
        }
        WriteOp::Increment { collection, id, field, delta } => {
            let mut body = load_object(tx, collection, id)?;
            let current = body.get(field).and_then(Value::as_i64).unwrap_or(0);
            body.insert(field.clone(), Value::from(current + delta));
            write_object(tx, collection, id, &body, now)?;
            events.push(ChangeEvent {
                collection: collection.clone(),
                id: id.clone(),
                kind: ChangeKind::Updated,
            });
        }
        WriteOp::ArrayUnion { collection, id, field, value, len_field } => {
            let mut body = load_object(tx, collection, id)?;
            let mut array = body
                .get(field)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if !array.contains(value) {
                array.push(value.clone());
            }
            if let Some(len_field) = len_field {
                body.insert(len_field.clone(), Value::from(array.len() as i64));
            }
            body.insert(field.clone(), Value::Array(array));
            write_object(tx, collection, id, &body, now)?;
            events.push(ChangeEvent {
                collection: collection.clone(),
                id: id.clone(),
                kind: ChangeKind::Updated,
            });
        }
        WriteOp::ArrayRemove { collection, id, field, value, len_field } => {
            let mut body = load_object(tx, collection, id)?;
            let mut array = body
                .get(field)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            array.retain(|entry| entry != value);
            if let Some(len_field) = len_field {
                body.insert(len_field.clone(), Value::from(array.len() as i64));
            }
            body.insert(field.clone(), Value::Array(array));
            write_object(tx, collection, id, &body, now)?;
            events.push(ChangeEvent {
                collection: collection.clone(),
                id: id.clone(),
                kind: ChangeKind::Updated,
            });
        }
    }
    Ok(())
}

fn document_exists(tx: &Transaction<'_>, collection: &str, id: &str) -> Result<bool, StoreError> {
    let found = tx
        .query_row(
            "SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn load_object(
    tx: &Transaction<'_>,
    collection: &str,
    id: &str,
) -> Result<Map<String, Value>, StoreError> {
    let raw: Option<String> = tx
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;
    let raw = raw.ok_or_else(|| StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    })?;
    match serde_json::from_str(&raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject {
            collection: collection.to_string(),
            id: id.to_string(),
        }),
    }
}

fn write_object(
    tx: &Transaction<'_>,
    collection: &str,
    id: &str,
    body: &Map<String, Value>,
    now: i64,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(body)?;
    tx.execute(
        "UPDATE documents SET body = ?3, updated_at = ?4 WHERE collection = ?1 AND id = ?2",
        params![collection, id, raw, now],
    )?;
    Ok(())
}

fn delete_where(
    tx: &Transaction<'_>,
    predicate: &str,
    filter_params: impl rusqlite::Params,
) -> Result<Vec<ChangeEvent>, StoreError> {
    let select = format!("SELECT collection, id FROM documents WHERE {predicate}");
    let mut events = Vec::new();
    {
        let mut stmt = tx.prepare(&select)?;
        let rows = stmt.query_map(filter_params, |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (collection, id) = row?;
            events.push(ChangeEvent {
                collection,
                id,
                kind: ChangeKind::Deleted,
            });
        }
    }
    for event in &events {
        tx.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![event.collection, event.id],
        )?;
    }
    Ok(events)
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
