//! The uniform LTM store contract implemented by every backend.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::context::EngramContext;
use crate::models::MemoryRecord;
use crate::query::LtmQuery;
use crate::storage::errors::StorageResult;

/// What a store instance can do beyond the baseline CRUD + query surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCapabilities {
    /// Whether this store can accept embeddings and service semantic
    /// retrieval.
    pub supports_vector_search: bool,

    /// The fixed embedding dimension this store instance was configured
    /// with, if vector-capable.
    pub dimension: Option<usize>,
}

/// The LTM store contract: uniform CRUD plus the query algebra over a
/// tenant-scoped record set, expressed as a capability set so the MMU can
/// hold a single opaque handle regardless of backend.
#[async_trait]
pub trait LtmStore: Send + Sync + Debug {
    /// Fill missing `id`/`entity_id`/`user_id` from context, set timestamps,
    /// persist, and return the assigned id.
    ///
    /// Rejects with `ContextMismatch` if the record carries a different
    /// entity id than the ambient one, and with `DimensionError` if this
    /// store is vector-capable and the embedding is absent or mis-sized.
    async fn store(
        &self,
        ctx: &EngramContext,
        record: MemoryRecord,
    ) -> StorageResult<String>;

    /// Return records visible to `ctx` under the access predicate that
    /// satisfy every predicate in `query`, ordered and truncated per the
    /// query algebra.
    async fn retrieve(
        &self,
        ctx: &EngramContext,
        query: &LtmQuery,
    ) -> StorageResult<Vec<MemoryRecord>>;

    /// Merge `content`, `metadata`, and (if vector-capable) `embedding` into
    /// the existing record identified by `record.id`, preserving its
    /// original `created_at` and `entity_id`, and advancing `updated_at`.
    ///
    /// Fails with `NotFound` if absent, `ContextMismatch` if owned by
    /// another entity.
    async fn update(
        &self,
        ctx: &EngramContext,
        record: MemoryRecord,
    ) -> StorageResult<MemoryRecord>;

    /// Delete the record by id under the same ownership check as `update`.
    /// Backends may treat a repeat delete as `NotFound`, but must never
    /// delete a record owned by another entity.
    async fn delete(&self, ctx: &EngramContext, id: &str) -> StorageResult<()>;

    /// Liveness probe.
    async fn health_check(&self) -> StorageResult<bool>;

    /// Release backend resources. Idempotent.
    async fn close(&self) -> StorageResult<()>;

    /// What this store instance supports.
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }
}
