//! In-memory reference backend.
//!
//! Keeps a two-level mapping `EntityID -> (ID -> Record)` behind a
//! readers-writer lock. Every predicate in the query algebra runs in memory
//! against this map; this is the behavioral reference the testable
//! properties are written against, so it is also the only non-SurrealDB
//! backend that implements semantic retrieval.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::context::EngramContext;
use crate::models::MemoryRecord;
use crate::query::{self, DistanceMetric, LtmQuery};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::traits::{LtmStore, StoreCapabilities};

/// In-process store keyed by entity, then by record id.
#[derive(Debug)]
pub struct MemoryBackend {
    entities: RwLock<HashMap<String, HashMap<String, MemoryRecord>>>,
    dimension: Option<usize>,
    distance: DistanceMetric,
}

impl MemoryBackend {
    /// A plain reference backend with no vector capability.
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            dimension: None,
            distance: DistanceMetric::Cosine,
        }
    }

    /// A vector-capable reference backend fixed at `dimension`.
    pub fn with_vector_support(dimension: usize, distance: DistanceMetric) -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            dimension: Some(dimension),
            distance,
        }
    }

    fn lookup(&self, entity_id: &str, id: &str) -> Option<MemoryRecord> {
        self.entities
            .read()
            .unwrap()
            .get(entity_id)
            .and_then(|records| records.get(id))
            .cloned()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LtmStore for MemoryBackend {
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

        if let Some(dim) = self.dimension {
            match &record.embedding {
                Some(e) if e.len() == dim => {}
                Some(e) => {
                    return Err(StorageError::DimensionError {
                        expected: dim,
                        actual: e.len(),
                    });
                }
                None => {
                    return Err(StorageError::DimensionError {
                        expected: dim,
                        actual: 0,
                    });
                }
            }
        }

        record.updated_at = Utc::now();

        let mut entities = self.entities.write().unwrap();
        entities
            .entry(record.entity_id.clone())
            .or_default()
            .insert(record.id.clone(), record.clone());

        debug!(entity_id = %record.entity_id, id = %record.id, "memory store succeeded");
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

        if let Some(id) = query.exact_id() {
            return Ok(self
                .lookup(&ctx.entity_id, id)
                .into_iter()
                .filter(|r| query::matches_access(ctx, r))
                .filter(|r| query::matches_filters(query, r))
                .filter(|r| query::matches_text(query, r))
                .collect());
        }

        let entities = self.entities.read().unwrap();
        let candidates: Vec<MemoryRecord> = entities
            .get(&ctx.entity_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        drop(entities);

        let filtered: Vec<MemoryRecord> = candidates
            .into_iter()
            .filter(|r| query::matches_all(ctx, query, r))
            .collect();

        let limit = query.effective_limit().max(0) as usize;

        if query.is_semantic() {
            let qv = query.embedding.as_ref().unwrap();
            let mut scored: Vec<(MemoryRecord, f32)> = filtered
                .into_iter()
                .filter(|r| r.embedding.is_some())
                .map(|r| {
                    let dist = self.distance.distance(qv, r.embedding.as_ref().unwrap());
                    (r, dist)
                })
                .collect();
            query::sort_semantic(&mut scored);
            scored.truncate(limit);
            let results: Vec<MemoryRecord> = scored.into_iter().map(|(r, _)| r).collect();
            debug!(entity_id = %ctx.entity_id, count = results.len(), "memory semantic retrieve succeeded");
            Ok(results)
        } else {
            let mut results = filtered;
            query::sort_non_semantic(&mut results);
            results.truncate(limit);
            debug!(entity_id = %ctx.entity_id, count = results.len(), "memory retrieve succeeded");
            Ok(results)
        }
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

        let mut entities = self.entities.write().unwrap();
        let bucket = entities.get_mut(&ctx.entity_id).ok_or_else(|| {
            warn!(id = %record.id, "memory update target not found");
            StorageError::NotFound(record.id.clone())
        })?;
        let existing = bucket.get(&record.id).ok_or_else(|| {
            warn!(id = %record.id, "memory update target not found");
            StorageError::NotFound(record.id.clone())
        })?;

        if existing.entity_id != ctx.entity_id {
            return Err(StorageError::ContextMismatch(existing.entity_id.clone()));
        }

        if let Some(dim) = self.dimension
            && let Some(e) = &record.embedding
            && e.len() != dim
        {
            return Err(StorageError::DimensionError {
                expected: dim,
                actual: e.len(),
            });
        }

        let mut merged = existing.clone();
        merged.content = record.content;
        merged.metadata = record.metadata;
        if self.dimension.is_some() {
            merged.embedding = record.embedding.or(merged.embedding);
        }
        merged.updated_at = Utc::now();

        bucket.insert(merged.id.clone(), merged.clone());
        debug!(id = %merged.id, "memory update succeeded");
        Ok(merged)
    }

    async fn delete(&self, ctx: &EngramContext, id: &str) -> StorageResult<()> {
        if !ctx.is_valid() {
            return Err(StorageError::MissingContext);
        }
        let mut entities = self.entities.write().unwrap();
        let bucket = entities.get_mut(&ctx.entity_id).ok_or_else(|| {
            warn!(id = %id, "memory delete target not found");
            StorageError::NotFound(id.to_string())
        })?;
        match bucket.remove(id) {
            Some(_) => {
                debug!(id = %id, "memory delete succeeded");
                Ok(())
            }
            None => {
                warn!(id = %id, "memory delete target not found");
                Err(StorageError::NotFound(id.to_string()))
            }
        }
    }

    async fn health_check(&self) -> StorageResult<bool> {
        Ok(true)
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            supports_vector_search: self.dimension.is_some(),
            dimension: self.dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryRecord;

    fn ctx(entity: &str) -> EngramContext {
        EngramContext::for_entity(entity)
    }

    #[tokio::test]
    async fn conformance_isolation() {
        let store = MemoryBackend::new();
        crate::storage::conformance::isolation(&store).await;
    }

    #[tokio::test]
    async fn conformance_privacy() {
        let store = MemoryBackend::new();
        crate::storage::conformance::privacy(&store).await;
    }

    #[tokio::test]
    async fn conformance_update_preserves_created_at() {
        let store = MemoryBackend::new();
        crate::storage::conformance::update_preserves_created_at(&store).await;
    }

    #[tokio::test]
    async fn conformance_text_search() {
        let store = MemoryBackend::new();
        crate::storage::conformance::text_search(&store).await;
    }

    #[tokio::test]
    async fn semantic_top_k() {
        let store = MemoryBackend::with_vector_support(5, DistanceMetric::Cosine);
        let c = ctx("E");
        let mut ids = Vec::new();
        for i in 1..=5 {
            let f = i as f32;
            let e = vec![0.1 * f, 0.2 * f, 0.3 * f, 0.4 * f, 0.5 + 0.1 * f];
            let id = store
                .store(&c, MemoryRecord::builder("x").embedding(e).build())
                .await
                .unwrap();
            ids.push(id);
        }

        let results = store
            .retrieve(
                &c,
                &LtmQuery::new()
                    .with_embedding(vec![0.3, 0.4, 0.5, 0.6, 0.7])
                    .with_limit(1),
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, ids[2]);
    }

    #[tokio::test]
    async fn vector_store_rejects_missing_embedding() {
        let store = MemoryBackend::with_vector_support(3, DistanceMetric::Cosine);
        let c = ctx("E");
        let err = store
            .store(&c, MemoryRecord::builder("no-embedding").build())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DimensionError { .. }));
    }

    #[tokio::test]
    async fn conformance_repeat_delete_is_not_found() {
        let store = MemoryBackend::new();
        crate::storage::conformance::repeat_delete_is_not_found(&store).await;
    }
}
