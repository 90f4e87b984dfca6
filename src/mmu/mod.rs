//! The Memory Management Unit: the façade that fronts a store, injects
//! ambient context, chooses a retrieval strategy, and sources embeddings.

pub mod oracle;

pub use oracle::{ProcessOptions, ReasoningOracle};

use serde_json::Map;
use std::sync::Arc;
use tracing::warn;

use crate::context::EngramContext;
use crate::models::{AccessLevel, Insight, MemoryRecord};
use crate::query::LtmQuery;
use crate::storage::LtmStore;
use crate::{EngramError, Result};

/// How `RetrieveFromLTM` should obtain results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategy {
    #[default]
    Keyword,
    Semantic,
}

/// Options accompanying a `RetrieveFromLTM` call.
#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    /// Strategy to use. `None` means "caller didn't specify" and defers to
    /// `MmuConfig::default_retrieval_strategy`; this is distinct from an
    /// explicit `Some(RetrievalStrategy::Keyword)` request even though
    /// `Keyword` is that enum's own default variant.
    pub strategy: Option<RetrievalStrategy>,
    pub include_metadata: bool,
}

/// The payload accepted by `EncodeToLTM`: either bare content or content
/// plus metadata.
#[derive(Debug, Clone)]
pub struct EncodePayload {
    pub content: String,
    pub metadata: Map<String, serde_json::Value>,
    pub access_level: AccessLevel,
    /// Owning user for a `PrivateToUser` payload. Overrides the ambient
    /// context's user id when set, so `private_to` can scope a record to a
    /// user other than the caller.
    pub user_id: Option<String>,
}

impl EncodePayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
            access_level: AccessLevel::SharedWithinEntity,
            user_id: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn private_to(mut self, user_id: impl Into<String>) -> Self {
        self.access_level = AccessLevel::PrivateToUser;
        self.user_id = Some(user_id.into());
        self
    }
}

/// Knobs governing MMU behavior.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MmuConfig {
    /// Request an embedding synchronously at `EncodeToLTM` time whenever
    /// the underlying store is vector-capable.
    pub embedding_on_write: bool,

    /// Strategy used by `RetrieveFromLTM` when the caller doesn't specify
    /// one explicitly.
    pub default_retrieval_strategy: RetrievalStrategy,
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self {
            embedding_on_write: true,
            default_retrieval_strategy: RetrievalStrategy::Keyword,
        }
    }
}

/// Fronts a store and an optional reasoning oracle, enforcing ambient
/// context on every call.
#[derive(Debug, Clone)]
pub struct MemoryManagementUnit {
    store: Arc<dyn LtmStore>,
    oracle: Option<Arc<dyn ReasoningOracle>>,
    config: MmuConfig,
}

impl MemoryManagementUnit {
    pub fn new(store: Arc<dyn LtmStore>, oracle: Option<Arc<dyn ReasoningOracle>>, config: MmuConfig) -> Self {
        Self { store, oracle, config }
    }

    pub fn store(&self) -> &Arc<dyn LtmStore> {
        &self.store
    }

    /// Build and persist a record from `payload`, attaching an embedding
    /// synchronously when the store is vector-capable, an oracle is
    /// configured, and `embedding_on_write` is set.
    pub async fn encode_to_ltm(&self, ctx: &EngramContext, payload: EncodePayload) -> Result<String> {
        if !ctx.is_valid() {
            return Err(EngramError::MissingContext);
        }

        let mut builder = MemoryRecord::builder(payload.content.clone())
            .entity_id(ctx.entity_id.clone())
            .access_level(payload.access_level)
            .metadata(payload.metadata);
        if let Some(uid) = payload.user_id.or_else(|| ctx.user_id().map(String::from)) {
            builder = builder.user_id(uid);
        }
        let mut record = builder.build();

        let capabilities = self.store.capabilities();
        if self.config.embedding_on_write && capabilities.supports_vector_search {
            if let Some(oracle) = &self.oracle {
                let embeddings = oracle
                    .generate_embeddings(std::slice::from_ref(&payload.content))
                    .await
                    .map_err(|e| EngramError::Oracle(e.to_string()))?;
                record.embedding = embeddings.into_iter().next();
            }
        }

        let id = self.store.store(ctx, record).await?;
        Ok(id)
    }

    /// Retrieve records per `options.strategy`, falling back to keyword
    /// retrieval with a warning when semantic retrieval is requested
    /// against a non-vector-capable store.
    pub async fn retrieve_from_ltm(
        &self,
        ctx: &EngramContext,
        mut query: LtmQuery,
        options: RetrieveOptions,
    ) -> Result<Vec<MemoryRecord>> {
        if !ctx.is_valid() {
            return Err(EngramError::MissingContext);
        }

        let strategy = options.strategy.unwrap_or(self.config.default_retrieval_strategy);

        if strategy == RetrievalStrategy::Semantic {
            let capabilities = self.store.capabilities();
            if !capabilities.supports_vector_search {
                warn!("semantic retrieval requested against a non-vector-capable store, falling back to keyword");
            } else {
                let text = query
                    .text
                    .clone()
                    .ok_or(EngramError::InvalidArgument("semantic retrieval requires query text".into()))?;
                let oracle = self
                    .oracle
                    .as_ref()
                    .ok_or_else(|| EngramError::Oracle("no reasoning oracle configured".into()))?;
                let embeddings = oracle
                    .generate_embeddings(std::slice::from_ref(&text))
                    .await
                    .map_err(|e| EngramError::Oracle(e.to_string()))?;
                query.embedding = embeddings.into_iter().next();
            }
        }

        let records = self.store.retrieve(ctx, &query).await?;
        Ok(records)
    }

    /// Wrap `insight` as a record and delegate to `Store`.
    pub async fn consolidate_ltm(&self, ctx: &EngramContext, insight: &Insight) -> Result<String> {
        if !ctx.is_valid() {
            return Err(EngramError::MissingContext);
        }

        let mut metadata = Map::new();
        metadata.insert("source".into(), serde_json::json!("reflection"));
        metadata.insert("insight_type".into(), serde_json::json!(insight.insight_type.to_string()));
        metadata.insert("insight_id".into(), serde_json::json!(insight.id));
        metadata.insert("confidence".into(), serde_json::json!(insight.confidence));
        metadata.insert(
            "related_memory_ids".into(),
            serde_json::json!(insight.related_memory_ids),
        );
        metadata.insert("created_at".into(), serde_json::json!(insight.created_at.to_rfc3339()));

        let mut builder = MemoryRecord::builder(insight.description.clone())
            .entity_id(ctx.entity_id.clone())
            .access_level(AccessLevel::SharedWithinEntity)
            .metadata(metadata);
        if let Some(uid) = ctx.user_id() {
            builder = builder.user_id(uid);
        }

        let id = self.store.store(ctx, builder.build()).await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backends::MemoryBackend;
    use oracle::mock::MockOracle;

    fn ctx() -> EngramContext {
        EngramContext::for_entity("E")
    }

    #[tokio::test]
    async fn encode_without_oracle_stores_no_embedding() {
        let store: Arc<dyn LtmStore> = Arc::new(MemoryBackend::new());
        let mmu = MemoryManagementUnit::new(store.clone(), None, MmuConfig::default());

        let id = mmu.encode_to_ltm(&ctx(), EncodePayload::text("hello")).await.unwrap();
        let found = store.retrieve(&ctx(), &LtmQuery::new().with_id(id)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].embedding.is_none());
    }

    #[tokio::test]
    async fn private_to_makes_record_readable_by_its_owner() {
        let store: Arc<dyn LtmStore> = Arc::new(MemoryBackend::new());
        let mmu = MemoryManagementUnit::new(store.clone(), None, MmuConfig::default());

        let entity_ctx = ctx();
        let id = mmu
            .encode_to_ltm(&entity_ctx, EncodePayload::text("secret").private_to("u1"))
            .await
            .unwrap();

        let owner_ctx = EngramContext::for_user("E", "u1");
        let found = store.retrieve(&owner_ctx, &LtmQuery::new().with_id(id.clone())).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user_id.as_deref(), Some("u1"));

        let stranger_ctx = EngramContext::for_user("E", "u2");
        let hidden = store.retrieve(&stranger_ctx, &LtmQuery::new().with_id(id)).await.unwrap();
        assert!(hidden.is_empty());
    }

    #[tokio::test]
    async fn encode_attaches_embedding_for_vector_store() {
        let store: Arc<dyn LtmStore> = Arc::new(MemoryBackend::with_vector_support(
            4,
            crate::query::DistanceMetric::Cosine,
        ));
        let oracle: Arc<dyn ReasoningOracle> = Arc::new(MockOracle::new(4, "unused"));
        let mmu = MemoryManagementUnit::new(store.clone(), Some(oracle), MmuConfig::default());

        let id = mmu.encode_to_ltm(&ctx(), EncodePayload::text("hello")).await.unwrap();
        let found = store.retrieve(&ctx(), &LtmQuery::new().with_id(id)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].embedding.as_ref().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn semantic_retrieval_falls_back_on_non_vector_store() {
        let store: Arc<dyn LtmStore> = Arc::new(MemoryBackend::new());
        let oracle: Arc<dyn ReasoningOracle> = Arc::new(MockOracle::new(4, "unused"));
        let mmu = MemoryManagementUnit::new(store.clone(), Some(oracle), MmuConfig::default());

        store.store(&ctx(), MemoryRecord::builder("hello world").build()).await.unwrap();

        let results = mmu
            .retrieve_from_ltm(
                &ctx(),
                LtmQuery::new().with_text("hello"),
                RetrieveOptions { strategy: Some(RetrievalStrategy::Semantic), include_metadata: true },
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn explicit_keyword_request_ignores_semantic_default() {
        let store: Arc<dyn LtmStore> = Arc::new(MemoryBackend::new());
        let config = MmuConfig {
            default_retrieval_strategy: RetrievalStrategy::Semantic,
            ..MmuConfig::default()
        };
        let mmu = MemoryManagementUnit::new(store.clone(), None, config);

        store.store(&ctx(), MemoryRecord::builder("hello world").build()).await.unwrap();

        let results = mmu
            .retrieve_from_ltm(
                &ctx(),
                LtmQuery::new().with_text("hello"),
                RetrieveOptions { strategy: Some(RetrievalStrategy::Keyword), include_metadata: true },
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn missing_context_is_rejected() {
        let store: Arc<dyn LtmStore> = Arc::new(MemoryBackend::new());
        let mmu = MemoryManagementUnit::new(store, None, MmuConfig::default());
        let invalid = EngramContext::for_entity("");
        let err = mmu.encode_to_ltm(&invalid, EncodePayload::text("x")).await.unwrap_err();
        assert!(matches!(err, EngramError::MissingContext));
    }

    #[tokio::test]
    async fn consolidate_ltm_wraps_insight_as_record() {
        let store: Arc<dyn LtmStore> = Arc::new(MemoryBackend::new());
        let mmu = MemoryManagementUnit::new(store.clone(), None, MmuConfig::default());

        let insight = Insight::new(
            crate::models::InsightType::Pattern,
            "D",
            0.8,
            vec!["r1".into(), "r2".into()],
        );
        let id = mmu.consolidate_ltm(&ctx(), &insight).await.unwrap();

        let found = store
            .retrieve(&ctx(), &LtmQuery::new().with_filter("source", serde_json::json!("reflection")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);
        assert_eq!(found[0].content, "D");
        assert_eq!(found[0].metadata_get("insight_type"), Some(&serde_json::json!("pattern")));
    }
}
