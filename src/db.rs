use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::utils;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("invalid field name: {0}")]
    InvalidField(String),
    #[error("store has been disposed")]
    Disposed,
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store task did not complete: {0}")]
    Task(String),
}

/// A stored document: the id lives beside the payload, never inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Collection-oriented document store. Collection names are paths such as
/// `events` or `users/{uid}/user-bookmarks`; every single-document write is
/// atomic, `create_many` is all-or-nothing.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;
    /// Insert with a store-assigned id.
    fn create(&self, collection: &str, data: &Value) -> Result<String, StoreError>;
    fn create_many(&self, collection: &str, docs: &[Value]) -> Result<Vec<String>, StoreError>;
    /// Insert or replace under a caller-chosen id.
    fn set(&self, collection: &str, id: &str, data: &Value) -> Result<(), StoreError>;
    /// Several `set`s as one unit: either every `(collection, id, data)` is
    /// written or none is.
    fn set_all(&self, writes: &[(&str, &str, &Value)]) -> Result<(), StoreError>;
    /// Read-modify-write of one document. Returns the new payload, or `None`
    /// when the document does not exist.
    fn update(
        &self,
        collection: &str,
        id: &str,
        apply: &mut dyn FnMut(&mut Value),
    ) -> Result<Option<Value>, StoreError>;
    fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
    fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;
    /// Documents whose top-level string `field` equals `value` exactly.
    fn query_eq(&self, collection: &str, field: &str, value: &str)
        -> Result<Vec<Document>, StoreError>;
    fn dispose(&self) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    pub fn connect(path: &Path) -> Result<Self, StoreError> {
        utils::ensure_parent(path)?;
        Self::init(Connection::open(path)?)
    }

    pub fn connect_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents(
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at_utc TEXT NOT NULL,
                updated_at_utc TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE INDEX IF NOT EXISTS documents_by_collection
                ON documents(collection, created_at_utc);",
        )?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = guard.as_mut().ok_or(StoreError::Disposed)?;
        op(conn)
    }
}

fn encode(data: &Value) -> Result<String, StoreError> {
    let mut payload = data.clone();
    if let Value::Object(map) = &mut payload {
        map.remove("id");
    }
    Ok(serde_json::to_string(&payload)?)
}

fn decode_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let payload: String = row.get(1)?;
    let data: Value = serde_json::from_str(&payload).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            payload.len(),
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })?;
    Ok(Document { id, data })
}

fn insert(conn: &Connection, collection: &str, id: &str, payload: &str) -> rusqlite::Result<()> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO documents (collection, id, payload, created_at_utc, updated_at_utc)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![collection, id, payload, now],
    )?;
    Ok(())
}

fn upsert(conn: &Connection, collection: &str, id: &str, payload: &str) -> rusqlite::Result<()> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO documents (collection, id, payload, created_at_utc, updated_at_utc)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(collection, id) DO UPDATE SET
           payload = excluded.payload,
           updated_at_utc = excluded.updated_at_utc",
        params![collection, id, payload, now],
    )?;
    Ok(())
}

fn field_path(field: &str) -> Result<String, StoreError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid {
        return Err(StoreError::InvalidField(field.to_string()));
    }
    Ok(format!("$.{field}"))
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.with_conn(|conn| {
            let doc = conn
                .query_row(
                    "SELECT id, payload FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    decode_row,
                )
                .optional()?;
            Ok(doc)
        })
    }

    fn create(&self, collection: &str, data: &Value) -> Result<String, StoreError> {
        let payload = encode(data)?;
        let id = Uuid::new_v4().to_string();
        self.with_conn(|conn| {
            insert(conn, collection, &id, &payload)?;
            Ok(id)
        })
    }

    fn create_many(&self, collection: &str, docs: &[Value]) -> Result<Vec<String>, StoreError> {
        let payloads = docs.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(payloads.len());
            for payload in &payloads {
                let id = Uuid::new_v4().to_string();
                insert(&tx, collection, &id, payload)?;
                ids.push(id);
            }
            tx.commit()?;
            Ok(ids)
        })
    }

    fn set(&self, collection: &str, id: &str, data: &Value) -> Result<(), StoreError> {
        let payload = encode(data)?;
        self.with_conn(|conn| {
            upsert(conn, collection, id, &payload)?;
            Ok(())
        })
    }

    fn set_all(&self, writes: &[(&str, &str, &Value)]) -> Result<(), StoreError> {
        let encoded = writes
            .iter()
            .map(|(collection, id, data)| Ok::<_, StoreError>((*collection, *id, encode(data)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for (collection, id, payload) in &encoded {
                upsert(&tx, collection, id, payload)?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        apply: &mut dyn FnMut(&mut Value),
    ) -> Result<Option<Value>, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let current = tx
                .query_row(
                    "SELECT id, payload FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    decode_row,
                )
                .optional()?;
            let Some(mut doc) = current else {
                return Ok(None);
            };
            apply(&mut doc.data);
            upsert(&tx, collection, id, &encode(&doc.data)?)?;
            tx.commit()?;
            Ok(Some(doc.data))
        })
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            Ok(removed > 0)
        })
    }

    fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, payload FROM documents WHERE collection = ?1
                 ORDER BY created_at_utc, id",
            )?;
            let rows = stmt.query_map(params![collection], decode_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let path = field_path(field)?;
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, payload FROM documents
                 WHERE collection = ?1 AND json_extract(payload, ?2) = ?3
                 ORDER BY created_at_utc, id",
            )?;
            let rows = stmt.query_map(params![collection, path, value], decode_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    fn dispose(&self) -> Result<(), StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, err)| StoreError::Sqlite(err))?;
        }
        Ok(())
    }
}
