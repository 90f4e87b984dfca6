//! Embedded key-value backend.
//!
//! Each entity gets its own key namespace (`{entity_id}\0{id}`) inside a
//! single rocksdb column family. There is no secondary index, so every
//! non-id query is a prefix scan over the entity's namespace followed by
//! in-memory filtering through the shared query predicates. Not
//! vector-capable: rocksdb has no ANN index and this backend does not
//! attempt to fake one with a full scan over embeddings.

use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{IteratorMode, Options, DB};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::context::EngramContext;
use crate::models::MemoryRecord;
use crate::query::{self, LtmQuery};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::traits::{LtmStore, StoreCapabilities};

const KEY_SEP: u8 = 0;

fn make_key(entity_id: &str, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(entity_id.len() + id.len() + 1);
    key.extend_from_slice(entity_id.as_bytes());
    key.push(KEY_SEP);
    key.extend_from_slice(id.as_bytes());
    key
}

fn entity_prefix(entity_id: &str) -> Vec<u8> {
    let mut prefix = entity_id.as_bytes().to_vec();
    prefix.push(KEY_SEP);
    prefix
}

/// rocksdb-backed store, bucketed per entity by key prefix.
#[derive(Debug)]
pub struct KvBackend {
    db: Mutex<DB>,
}

impl KvBackend {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn scan_entity(&self, entity_id: &str) -> StorageResult<Vec<MemoryRecord>> {
        let db = self.db.lock().unwrap();
        let prefix = entity_prefix(entity_id);
        let mut out = Vec::new();
        for item in db.iterator(IteratorMode::From(&prefix, rocksdb::Direction::Forward)) {
            let (key, value) = item.map_err(|e| StorageError::Backend(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            let record: MemoryRecord = serde_json::from_slice(&value)?;
            out.push(record);
        }
        Ok(out)
    }
}

#[async_trait]
impl LtmStore for KvBackend {
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

        let key = make_key(&record.entity_id, &record.id);
        let bytes = serde_json::to_vec(&record)?;

        let db = self.db.lock().unwrap();
        db.put(&key, &bytes).map_err(|e| {
            warn!(entity_id = %record.entity_id, error = %e, "kv store failed");
            StorageError::Backend(e.to_string())
        })?;
        debug!(entity_id = %record.entity_id, id = %record.id, "kv store succeeded");
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

        if let Some(id) = query.exact_id() {
            let key = make_key(&ctx.entity_id, id);
            let found = {
                let db = self.db.lock().unwrap();
                db.get(&key).map_err(|e| StorageError::Backend(e.to_string()))?
            };
            let record: Option<MemoryRecord> = match found {
                Some(bytes) => Some(serde_json::from_slice(&bytes)?),
                None => None,
            };
            return Ok(record
                .into_iter()
                .filter(|r| query::matches_access(ctx, r))
                .filter(|r| query::matches_filters(query, r))
                .filter(|r| query::matches_text(query, r))
                .collect());
        }

        let mut results: Vec<MemoryRecord> = self
            .scan_entity(&ctx.entity_id)?
            .into_iter()
            .filter(|r| query::matches_all(ctx, query, r))
            .collect();

        query::sort_non_semantic(&mut results);
        let limit = query.effective_limit().max(0) as usize;
        results.truncate(limit);
        debug!(entity_id = %ctx.entity_id, count = results.len(), "kv retrieve succeeded");
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

        let key = make_key(&ctx.entity_id, &record.id);
        let db = self.db.lock().unwrap();
        let existing_bytes = db
            .get(&key)
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .ok_or_else(|| {
                warn!(id = %record.id, "kv update target not found");
                StorageError::NotFound(record.id.clone())
            })?;
        let existing: MemoryRecord = serde_json::from_slice(&existing_bytes)?;

        if existing.entity_id != ctx.entity_id {
            return Err(StorageError::ContextMismatch(existing.entity_id.clone()));
        }

        let mut merged = existing;
        merged.content = record.content;
        merged.metadata = record.metadata;
        merged.updated_at = Utc::now();

        let bytes = serde_json::to_vec(&merged)?;
        db.put(&key, &bytes).map_err(|e| StorageError::Backend(e.to_string()))?;
        debug!(id = %merged.id, "kv update succeeded");
        Ok(merged)
    }

    async fn delete(&self, ctx: &EngramContext, id: &str) -> StorageResult<()> {
        if !ctx.is_valid() {
            return Err(StorageError::MissingContext);
        }
        let key = make_key(&ctx.entity_id, id);
        let db = self.db.lock().unwrap();
        match db.get(&key).map_err(|e| StorageError::Backend(e.to_string()))? {
            Some(_) => {
                db.delete(&key).map_err(|e| StorageError::Backend(e.to_string()))?;
                debug!(id = %id, "kv delete succeeded");
                Ok(())
            }
            None => {
                warn!(id = %id, "kv delete target not found");
                Err(StorageError::NotFound(id.to_string()))
            }
        }
    }

    async fn health_check(&self) -> StorageResult<bool> {
        let _ = self.db.lock().unwrap();
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
    use tempfile::tempdir;

    fn ctx(entity: &str) -> EngramContext {
        EngramContext::for_entity(entity)
    }

    #[tokio::test]
    async fn store_then_retrieve_by_id() {
        let dir = tempdir().unwrap();
        let store = KvBackend::open(dir.path()).unwrap();
        let c = ctx("E");
        let id = store
            .store(&c, MemoryRecord::builder("hello").build())
            .await
            .unwrap();

        let found = store.retrieve(&c, &LtmQuery::new().with_id(id.clone())).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
    }

    #[tokio::test]
    async fn conformance_isolation() {
        let dir = tempdir().unwrap();
        let store = KvBackend::open(dir.path()).unwrap();
        crate::storage::conformance::isolation(&store).await;
    }

    #[tokio::test]
    async fn semantic_query_rejected() {
        let dir = tempdir().unwrap();
        let store = KvBackend::open(dir.path()).unwrap();
        let err = store
            .retrieve(&ctx("E"), &LtmQuery::new().with_embedding(vec![0.1, 0.2]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn conformance_repeat_delete_is_not_found() {
        let dir = tempdir().unwrap();
        let store = KvBackend::open(dir.path()).unwrap();
        crate::storage::conformance::repeat_delete_is_not_found(&store).await;
    }

    #[tokio::test]
    async fn conformance_privacy() {
        let dir = tempdir().unwrap();
        let store = KvBackend::open(dir.path()).unwrap();
        crate::storage::conformance::privacy(&store).await;
    }

    #[tokio::test]
    async fn conformance_update_preserves_created_at() {
        let dir = tempdir().unwrap();
        let store = KvBackend::open(dir.path()).unwrap();
        crate::storage::conformance::update_preserves_created_at(&store).await;
    }

    #[tokio::test]
    async fn conformance_text_search() {
        let dir = tempdir().unwrap();
        let store = KvBackend::open(dir.path()).unwrap();
        crate::storage::conformance::text_search(&store).await;
    }
}
