//! Vector-indexed backend.
//!
//! Backed by an embedded SurrealDB RocksDB engine, using the KNN operator
//! (`<|limit,metric|>`) for semantic retrieval and plain field predicates
//! for everything else. Vector-capable; this is the only backend besides
//! the in-memory reference that is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use surrealdb::engine::local::{Db, RocksDb};
use surrealdb::{RecordId, Surreal};
use tracing::{debug, warn};

use crate::context::EngramContext;
use crate::models::{AccessLevel, MemoryRecord};
use crate::query::{self, DistanceMetric, LtmQuery};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::traits::{LtmStore, StoreCapabilities};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct SurrealRecord {
    id: RecordId,
    entity_id: String,
    user_id: Option<String>,
    access_level: i64,
    content: String,
    metadata: Value,
    embedding: Vec<f32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
struct CreateRecord {
    entity_id: String,
    user_id: Option<String>,
    access_level: i64,
    content: String,
    metadata: Value,
    embedding: Vec<f32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn from_surreal(s: SurrealRecord) -> MemoryRecord {
    MemoryRecord {
        id: s.id.key().to_string(),
        entity_id: s.entity_id,
        user_id: s.user_id,
        access_level: AccessLevel::from_i64(s.access_level).unwrap_or(AccessLevel::SharedWithinEntity),
        content: s.content,
        metadata: match s.metadata {
            Value::Object(m) => m,
            _ => Map::new(),
        },
        embedding: Some(s.embedding),
        created_at: s.created_at,
        updated_at: s.updated_at,
    }
}

/// SurrealDB-backed store fixed at a configured dimension and table.
#[derive(Debug)]
pub struct VectorBackend {
    client: Surreal<Db>,
    table: String,
    dimension: usize,
    distance: DistanceMetric,
}

impl VectorBackend {
    pub async fn open(
        path: impl AsRef<std::path::Path>,
        dimension: usize,
        distance: DistanceMetric,
        table: impl Into<String>,
    ) -> StorageResult<Self> {
        let client = Surreal::new::<RocksDb>(path.as_ref())
            .await
            .map_err(|e| StorageError::Backend(format!("failed to open embedded vector store: {e}")))?;
        client
            .use_ns("engram")
            .use_db("ltm")
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            table: table.into(),
            dimension,
            distance,
        })
    }

    fn distance_keyword(&self) -> &'static str {
        match self.distance {
            DistanceMetric::Cosine => "COSINE",
            DistanceMetric::Euclidean => "EUCLIDEAN",
            DistanceMetric::Dot => "DOT",
        }
    }
}

#[async_trait]
impl LtmStore for VectorBackend {
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

        let embedding = record
            .embedding
            .clone()
            .ok_or(StorageError::DimensionError { expected: self.dimension, actual: 0 })?;
        if embedding.len() != self.dimension {
            return Err(StorageError::DimensionError {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let now = Utc::now();
        let content = CreateRecord {
            entity_id: record.entity_id.clone(),
            user_id: record.user_id.clone(),
            access_level: record.access_level.as_i64(),
            content: record.content.clone(),
            metadata: Value::Object(record.metadata.clone()),
            embedding,
            created_at: now,
            updated_at: now,
        };

        let created: Option<SurrealRecord> = if record.id.is_empty() {
            self.client
                .create(self.table.as_str())
                .content(content)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?
        } else {
            self.client
                .create((self.table.as_str(), record.id.as_str()))
                .content(content)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?
        };

        let created = created.ok_or_else(|| StorageError::Backend("no record created".into()))?;
        let id = created.id.key().to_string();
        debug!(entity_id = %created.entity_id, id = %id, "vector store succeeded");
        Ok(id)
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
            let found: Option<SurrealRecord> = self
                .client
                .select((self.table.as_str(), id))
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            return Ok(found
                .map(from_surreal)
                .filter(|r| r.entity_id == ctx.entity_id)
                .into_iter()
                .filter(|r| query::matches_access(ctx, r))
                .filter(|r| query::matches_filters(query, r))
                .filter(|r| query::matches_text(query, r))
                .collect());
        }

        let limit = query.effective_limit().max(1);

        if query.is_semantic() {
            let qv = query
                .embedding
                .clone()
                .filter(|e| !e.is_empty())
                .ok_or(StorageError::MissingQueryVector)?;
            if qv.len() != self.dimension {
                return Err(StorageError::DimensionError {
                    expected: self.dimension,
                    actual: qv.len(),
                });
            }

            let sql = format!(
                "SELECT *, vector::distance::knn() AS distance FROM type::table($table) \
                 WHERE embedding <|{},{}|> $query_vector AND entity_id = $entity_id \
                 ORDER BY distance ASC LIMIT {}",
                limit,
                self.distance_keyword(),
                limit,
            );

            let mut response = self
                .client
                .query(sql)
                .bind(("table", self.table.clone()))
                .bind(("query_vector", qv))
                .bind(("entity_id", ctx.entity_id.clone()))
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            #[derive(serde::Deserialize)]
            struct Hit {
                #[serde(flatten)]
                record: SurrealRecord,
            }

            let hits: Vec<Hit> = response
                .take(0)
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            let results: Vec<MemoryRecord> = hits
                .into_iter()
                .map(|h| from_surreal(h.record))
                .filter(|r| query::matches_access(ctx, r))
                .filter(|r| query::matches_exact(query, r))
                .filter(|r| query::matches_filters(query, r))
                .filter(|r| query::matches_text(query, r))
                .collect();
            debug!(entity_id = %ctx.entity_id, count = results.len(), "vector semantic retrieve succeeded");
            Ok(results)
        } else {
            let all: Vec<SurrealRecord> = self
                .client
                .query("SELECT * FROM type::table($table) WHERE entity_id = $entity_id")
                .bind(("table", self.table.clone()))
                .bind(("entity_id", ctx.entity_id.clone()))
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?
                .take(0)
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            let mut results: Vec<MemoryRecord> = all
                .into_iter()
                .map(from_surreal)
                .filter(|r| query::matches_all(ctx, query, r))
                .collect();

            query::sort_non_semantic(&mut results);
            results.truncate(limit as usize);
            debug!(entity_id = %ctx.entity_id, count = results.len(), "vector retrieve succeeded");
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

        let existing: Option<SurrealRecord> = self
            .client
            .select((self.table.as_str(), record.id.as_str()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let existing = existing.ok_or_else(|| {
            warn!(id = %record.id, "vector update target not found");
            StorageError::NotFound(record.id.clone())
        })?;
        if existing.entity_id != ctx.entity_id {
            return Err(StorageError::ContextMismatch(existing.entity_id));
        }

        let embedding = record.embedding.clone().unwrap_or(existing.embedding.clone());
        if embedding.len() != self.dimension {
            return Err(StorageError::DimensionError {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let merge = serde_json::json!({
            "content": record.content,
            "metadata": Value::Object(record.metadata),
            "embedding": embedding,
            "updated_at": Utc::now(),
        });

        let updated: Option<SurrealRecord> = self
            .client
            .update((self.table.as_str(), record.id.as_str()))
            .merge(merge)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let merged = updated.map(from_surreal).ok_or_else(|| {
            warn!(id = %record.id, "vector update target not found");
            StorageError::NotFound(record.id.clone())
        })?;
        debug!(id = %merged.id, "vector update succeeded");
        Ok(merged)
    }

    async fn delete(&self, ctx: &EngramContext, id: &str) -> StorageResult<()> {
        if !ctx.is_valid() {
            return Err(StorageError::MissingContext);
        }
        let existing: Option<SurrealRecord> = self
            .client
            .select((self.table.as_str(), id))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        match existing {
            Some(r) if r.entity_id == ctx.entity_id => {
                let _: Option<SurrealRecord> = self
                    .client
                    .delete((self.table.as_str(), id))
                    .await
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                debug!(id = %id, "vector delete succeeded");
                Ok(())
            }
            _ => {
                warn!(id = %id, "vector delete target not found");
                Err(StorageError::NotFound(id.to_string()))
            }
        }
    }

    async fn health_check(&self) -> StorageResult<bool> {
        self.client
            .query("RETURN 1")
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(true)
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            supports_vector_search: true,
            dimension: Some(self.dimension),
        }
    }
}

#[cfg(all(test, feature = "surrealdb-embedded"))]
mod tests {
    use super::*;
    use crate::models::MemoryRecord;
    use tempfile::tempdir;

    fn ctx(entity: &str) -> EngramContext {
        EngramContext::for_entity(entity)
    }

    async fn open() -> (tempfile::TempDir, VectorBackend) {
        let dir = tempdir().unwrap();
        let store = VectorBackend::open(dir.path(), 3, DistanceMetric::Cosine, "memory")
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn store_then_retrieve_by_id() {
        let (_dir, store) = open().await;
        let c = ctx("E");
        let id = store
            .store(&c, MemoryRecord::builder("hello").embedding(vec![0.1, 0.2, 0.3]).build())
            .await
            .unwrap();

        let found = store.retrieve(&c, &LtmQuery::new().with_id(id.clone())).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let (_dir, store) = open().await;
        let err = store
            .store(&ctx("E"), MemoryRecord::builder("x").embedding(vec![0.1, 0.2]).build())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DimensionError { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn semantic_retrieve_orders_by_distance() {
        let (_dir, store) = open().await;
        let c = ctx("E");
        let id_close = store
            .store(&c, MemoryRecord::builder("close").embedding(vec![1.0, 0.0, 0.0]).build())
            .await
            .unwrap();
        store
            .store(&c, MemoryRecord::builder("far").embedding(vec![0.0, 1.0, 0.0]).build())
            .await
            .unwrap();

        let found = store
            .retrieve(&c, &LtmQuery::new().with_embedding(vec![1.0, 0.0, 0.0]).with_limit(1))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id_close);
    }

    #[tokio::test]
    async fn isolation_across_tenants() {
        let (_dir, store) = open().await;
        store
            .store(&ctx("A"), MemoryRecord::builder("a").embedding(vec![0.1, 0.2, 0.3]).build())
            .await
            .unwrap();
        store
            .store(&ctx("B"), MemoryRecord::builder("b").embedding(vec![0.4, 0.5, 0.6]).build())
            .await
            .unwrap();

        let visible = store.retrieve(&ctx("A"), &LtmQuery::new()).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].content, "a");
    }

    #[tokio::test]
    async fn repeat_delete_is_not_found() {
        let (_dir, store) = open().await;
        let c = ctx("E");
        let id = store
            .store(&c, MemoryRecord::builder("x").embedding(vec![0.1, 0.2, 0.3]).build())
            .await
            .unwrap();
        store.delete(&c, &id).await.unwrap();
        let err = store.delete(&c, &id).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
