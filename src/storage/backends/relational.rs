//! Relational backend.
//!
//! Stores first-class columns in a `memories` table and metadata as
//! key/value rows in a side table, each value carrying a type tag so the
//! round trip through SQLite's dynamic typing is exact rather than a
//! string-guessing scheme: `"string"`, `"number"`, `"bool"`, `"null"`, or
//! `"json"` (pre-serialized, for nested objects and arrays). Not
//! vector-capable. Every write goes through a transaction so the metadata
//! rows for a record never outlive the record itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::context::EngramContext;
use crate::models::{AccessLevel, MemoryRecord};
use crate::query::{self, LtmQuery};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::traits::{LtmStore, StoreCapabilities};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    entity_id TEXT NOT NULL,
    user_id TEXT,
    access_level INTEGER NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memories_entity ON memories(entity_id);

CREATE TABLE IF NOT EXISTS memory_metadata (
    record_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    value_type TEXT NOT NULL,
    PRIMARY KEY (record_id, key),
    FOREIGN KEY (record_id) REFERENCES memories(id) ON DELETE CASCADE
);
";

fn tag_value(v: &Value) -> (String, String) {
    match v {
        Value::String(s) => (s.clone(), "string".to_string()),
        Value::Number(n) => (n.to_string(), "number".to_string()),
        Value::Bool(b) => (b.to_string(), "bool".to_string()),
        Value::Null => (String::new(), "null".to_string()),
        Value::Object(_) | Value::Array(_) => (v.to_string(), "json".to_string()),
    }
}

fn untag_value(raw: &str, tag: &str) -> Value {
    match tag {
        "string" => Value::String(raw.to_string()),
        "number" => serde_json::from_str(raw).unwrap_or(Value::Null),
        "bool" => Value::Bool(raw == "true"),
        "null" => Value::Null,
        "json" => serde_json::from_str(raw).unwrap_or(Value::Null),
        _ => Value::String(raw.to_string()),
    }
}

/// SQLite-backed store, metadata held in a typed side table.
#[derive(Debug)]
pub struct RelationalBackend {
    conn: Mutex<Connection>,
}

impl RelationalBackend {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn fetch_metadata(conn: &Connection, record_id: &str) -> StorageResult<Map<String, Value>> {
        let mut stmt = conn.prepare(
            "SELECT key, value, value_type FROM memory_metadata WHERE record_id = ?1",
        )?;
        let rows = stmt.query_map(params![record_id], |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            let tag: String = row.get(2)?;
            Ok((key, value, tag))
        })?;
        let mut map = Map::new();
        for row in rows {
            let (key, raw, tag) = row?;
            map.insert(key, untag_value(&raw, &tag));
        }
        Ok(map)
    }

    fn row_to_record(conn: &Connection, row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
        let id: String = row.get(0)?;
        let entity_id: String = row.get(1)?;
        let user_id: Option<String> = row.get(2)?;
        let access_level: i64 = row.get(3)?;
        let content: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        Ok(MemoryRecord {
            id: id.clone(),
            entity_id,
            user_id,
            access_level: AccessLevel::from_i64(access_level).unwrap_or(AccessLevel::SharedWithinEntity),
            content,
            metadata: Self::fetch_metadata(conn, &id).unwrap_or_default(),
            embedding: None,
            created_at: parse_time(&created_at),
            updated_at: parse_time(&updated_at),
        })
    }

    fn scan_entity(conn: &Connection, entity_id: &str) -> StorageResult<Vec<MemoryRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, entity_id, user_id, access_level, content, created_at, updated_at
             FROM memories WHERE entity_id = ?1",
        )?;
        let mut rows = stmt.query(params![entity_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Self::row_to_record(conn, row)?);
        }
        Ok(out)
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl LtmStore for RelationalBackend {
    async fn store(
        &self,
        ctx: &EngramContext,
        mut record: MemoryRecord,
    ) -> StorageResult<String> {
        if !ctx.is_valid() {
            return Err(StorageError::MissingContext);
        }
        if record.entity_id.is_empty() {
            record.entity_id = ctx.entity_id.clone();
        } else if record.entity_id != ctx.entity_id {
            return Err(StorageError::ContextMismatch(format!(
                "record entity {} does not match ambient entity {}",
                record.entity_id, ctx.entity_id
            )));
        }
        if record.user_id.is_none() {
            record.user_id = ctx.user_id.clone();
        }
        if record.id.is_empty() {
            record.id = uuid::Uuid::new_v4().to_string();
        }
        record.updated_at = Utc::now();

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO memories (id, entity_id, user_id, access_level, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 content = excluded.content,
                 updated_at = excluded.updated_at",
            params![
                record.id,
                record.entity_id,
                record.user_id,
                record.access_level.as_i64(),
                record.content,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        tx.execute(
            "DELETE FROM memory_metadata WHERE record_id = ?1",
            params![record.id],
        )?;
        for (key, value) in record.metadata.iter() {
            let (raw, tag) = tag_value(value);
            tx.execute(
                "INSERT INTO memory_metadata (record_id, key, value, value_type) VALUES (?1, ?2, ?3, ?4)",
                params![record.id, key, raw, tag],
            )?;
        }
        tx.commit()?;
        debug!(entity_id = %record.entity_id, id = %record.id, "relational store succeeded");
        Ok(record.id)
    }

    async fn retrieve(
        &self,
        ctx: &EngramContext,
        query: &LtmQuery,
    ) -> StorageResult<Vec<MemoryRecord>> {
        if !ctx.is_valid() {
            return Err(StorageError::MissingContext);
        }
        if query.is_semantic() {
            return Err(StorageError::InvalidArgument(
                "this store is not vector-capable".into(),
            ));
        }

        let conn = self.conn.lock().unwrap();

        if let Some(id) = query.exact_id() {
            let found: Option<MemoryRecord> = conn
                .query_row(
                    "SELECT id, entity_id, user_id, access_level, content, created_at, updated_at
                     FROM memories WHERE id = ?1 AND entity_id = ?2",
                    params![id, ctx.entity_id],
                    |row| Self::row_to_record(&conn, row),
                )
                .optional()?;
            return Ok(found
                .into_iter()
                .filter(|r| query::matches_access(ctx, r))
                .filter(|r| query::matches_filters(query, r))
                .filter(|r| query::matches_text(query, r))
                .collect());
        }

        let mut results: Vec<MemoryRecord> = Self::scan_entity(&conn, &ctx.entity_id)?
            .into_iter()
            .filter(|r| query::matches_all(ctx, query, r))
            .collect();

        query::sort_non_semantic(&mut results);
        let limit = query.effective_limit().max(0) as usize;
        results.truncate(limit);
        debug!(entity_id = %ctx.entity_id, count = results.len(), "relational retrieve succeeded");
        Ok(results)
    }

    async fn update(
        &self,
        ctx: &EngramContext,
        record: MemoryRecord,
    ) -> StorageResult<MemoryRecord> {
        if !ctx.is_valid() {
            return Err(StorageError::MissingContext);
        }
        if record.id.is_empty() {
            return Err(StorageError::InvalidArgument("update requires a non-empty id".into()));
        }

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let owner: Option<String> = tx
            .query_row(
                "SELECT entity_id FROM memories WHERE id = ?1",
                params![record.id],
                |row| row.get(0),
            )
            .optional()?;
        let owner = owner.ok_or_else(|| {
            warn!(id = %record.id, "relational update target not found");
            StorageError::NotFound(record.id.clone())
        })?;
        if owner != ctx.entity_id {
            return Err(StorageError::ContextMismatch(owner));
        }

        let updated_at = Utc::now();
        tx.execute(
            "UPDATE memories SET content = ?1, updated_at = ?2 WHERE id = ?3",
            params![record.content, updated_at.to_rfc3339(), record.id],
        )?;
        tx.execute(
            "DELETE FROM memory_metadata WHERE record_id = ?1",
            params![record.id],
        )?;
        for (key, value) in record.metadata.iter() {
            let (raw, tag) = tag_value(value);
            tx.execute(
                "INSERT INTO memory_metadata (record_id, key, value, value_type) VALUES (?1, ?2, ?3, ?4)",
                params![record.id, key, raw, tag],
            )?;
        }
        tx.commit()?;

        let merged = conn.query_row(
            "SELECT id, entity_id, user_id, access_level, content, created_at, updated_at
             FROM memories WHERE id = ?1",
            params![record.id],
            |row| Self::row_to_record(&conn, row),
        )?;
        debug!(id = %merged.id, "relational update succeeded");
        Ok(merged)
    }

    async fn delete(&self, ctx: &EngramContext, id: &str) -> StorageResult<()> {
        if !ctx.is_valid() {
            return Err(StorageError::MissingContext);
        }
        let conn = self.conn.lock().unwrap();
        let owner: Option<String> = conn
            .query_row(
                "SELECT entity_id FROM memories WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match owner {
            Some(ref e) if e == &ctx.entity_id => {
                conn.execute("DELETE FROM memory_metadata WHERE record_id = ?1", params![id])?;
                conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
                debug!(id = %id, "relational delete succeeded");
                Ok(())
            }
            Some(_) | None => {
                warn!(id = %id, "relational delete target not found");
                Err(StorageError::NotFound(id.to_string()))
            }
        }
    }

    async fn health_check(&self) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(true)
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            supports_vector_search: false,
            dimension: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryRecord;
    use serde_json::json;

    fn ctx(entity: &str) -> EngramContext {
        EngramContext::for_entity(entity)
    }

    #[tokio::test]
    async fn metadata_round_trips_typed() {
        let store = RelationalBackend::open_in_memory().unwrap();
        let c = ctx("E");
        let id = store
            .store(
                &c,
                MemoryRecord::builder("x")
                    .property("count", json!(3))
                    .property("flag", json!(true))
                    .property("nested", json!({"a": 1}))
                    .build(),
            )
            .await
            .unwrap();

        let found = store.retrieve(&c, &LtmQuery::new().with_id(id)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.get("count"), Some(&json!(3)));
        assert_eq!(found[0].metadata.get("flag"), Some(&json!(true)));
        assert_eq!(found[0].metadata.get("nested"), Some(&json!({"a": 1})));
    }

    #[tokio::test]
    async fn restoring_existing_id_upserts_instead_of_erroring() {
        let store = RelationalBackend::open_in_memory().unwrap();
        let c = ctx("E");
        let id = store
            .store(&c, MemoryRecord::builder("v0").property("k", json!("v0")).build())
            .await
            .unwrap();

        store
            .store(&c, MemoryRecord::builder("v1").id(id.clone()).property("k", json!("v1")).build())
            .await
            .unwrap();

        let found = store.retrieve(&c, &LtmQuery::new().with_id(id)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "v1");
        assert_eq!(found[0].metadata.get("k"), Some(&json!("v1")));
    }

    #[tokio::test]
    async fn conformance_isolation() {
        let store = RelationalBackend::open_in_memory().unwrap();
        crate::storage::conformance::isolation(&store).await;
    }

    #[tokio::test]
    async fn cross_entity_update_rejected() {
        let store = RelationalBackend::open_in_memory().unwrap();
        let id = store
            .store(&ctx("A"), MemoryRecord::builder("a").build())
            .await
            .unwrap();

        let mut other = MemoryRecord::builder("hack").id(id).build();
        other.entity_id = "B".to_string();
        let err = store.update(&ctx("B"), other).await.unwrap_err();
        assert!(matches!(err, StorageError::ContextMismatch(_)));
    }

    #[tokio::test]
    async fn conformance_repeat_delete_is_not_found() {
        let store = RelationalBackend::open_in_memory().unwrap();
        crate::storage::conformance::repeat_delete_is_not_found(&store).await;
    }

    #[tokio::test]
    async fn conformance_privacy() {
        let store = RelationalBackend::open_in_memory().unwrap();
        crate::storage::conformance::privacy(&store).await;
    }

    #[tokio::test]
    async fn conformance_update_preserves_created_at() {
        let store = RelationalBackend::open_in_memory().unwrap();
        crate::storage::conformance::update_preserves_created_at(&store).await;
    }

    #[tokio::test]
    async fn conformance_text_search() {
        let store = RelationalBackend::open_in_memory().unwrap();
        crate::storage::conformance::text_search(&store).await;
    }
}
