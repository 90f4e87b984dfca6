//! The Reflection loop: sample recent memories, ask a reasoning oracle for
//! structured insights, and consolidate them back into the LTM.

pub mod hooks;
pub mod prompt;

pub use hooks::{HookResult, ScriptEngine};

use std::sync::Arc;
use tracing::{info, warn};

use crate::context::EngramContext;
use crate::mmu::{MemoryManagementUnit, ProcessOptions, ReasoningOracle, RetrieveOptions, RetrievalStrategy};
use crate::models::{Insight, InsightResponse};
use crate::query::LtmQuery;
use crate::{EngramError, Result};

const DEFAULT_MAX_MEMORIES: i64 = 50;
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Configuration fields enumerated in the reflection algorithm.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    pub enable_hooks: bool,
    pub max_memories_to_analyze: i64,
    pub analysis_temperature: f32,
    pub analysis_max_tokens: u32,
    pub analysis_model: Option<String>,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            enable_hooks: false,
            max_memories_to_analyze: DEFAULT_MAX_MEMORIES,
            analysis_temperature: DEFAULT_TEMPERATURE,
            analysis_max_tokens: DEFAULT_MAX_TOKENS,
            analysis_model: None,
        }
    }
}

/// Composes the MMU and a reasoning oracle into the sample → analyze →
/// consolidate loop.
#[derive(Clone)]
pub struct ReflectionEngine {
    mmu: Arc<MemoryManagementUnit>,
    oracle: Arc<dyn ReasoningOracle>,
    hooks: Option<Arc<dyn ScriptEngine>>,
    config: ReflectionConfig,
}

impl ReflectionEngine {
    pub fn new(
        mmu: Arc<MemoryManagementUnit>,
        oracle: Arc<dyn ReasoningOracle>,
        hooks: Option<Arc<dyn ScriptEngine>>,
        config: ReflectionConfig,
    ) -> Self {
        Self { mmu, oracle, hooks, config }
    }

    /// Run one reflection pass: sample, analyze, consolidate.
    pub async fn trigger_reflection(&self, ctx: &EngramContext) -> Result<Vec<Insight>> {
        info!(entity_id = %ctx.entity_id, "reflection: step 1, validating ambient context");
        if !ctx.is_valid() {
            return Err(EngramError::MissingContext);
        }

        info!(limit = self.config.max_memories_to_analyze, "reflection: step 2, sampling recent memories");
        let memories = self
            .mmu
            .retrieve_from_ltm(
                ctx,
                LtmQuery::new().with_limit(self.config.max_memories_to_analyze),
                RetrieveOptions { strategy: Some(RetrievalStrategy::Keyword), include_metadata: true },
            )
            .await?;

        if memories.is_empty() {
            info!("reflection: step 2 sample empty, short-circuiting without an oracle call");
            return Ok(Vec::new());
        }

        info!("reflection: step 3, running pre-analysis hook");
        if self.config.enable_hooks {
            if let Some(hooks) = &self.hooks
                && hooks.before_reflection_analysis(&memories).await == HookResult::Skip
            {
                info!("reflection: step 3 hook vetoed analysis");
                return Ok(Vec::new());
            }
        }

        info!(memory_count = memories.len(), "reflection: step 4, composing analysis prompt");
        let analysis_prompt = prompt::compose_analysis_prompt(&memories);

        info!("reflection: step 5, calling reasoning oracle");
        let response = self
            .oracle
            .process(
                &analysis_prompt,
                ProcessOptions {
                    temperature: self.config.analysis_temperature,
                    max_tokens: self.config.analysis_max_tokens,
                    model: self.config.analysis_model.clone(),
                },
            )
            .await
            .map_err(|e| EngramError::Oracle(e.to_string()))?;

        info!("reflection: step 6, parsing oracle response");
        let parsed: InsightResponse =
            serde_json::from_str(&response).map_err(|e| EngramError::Parse(e.to_string()))?;
        let mut insights: Vec<Insight> = parsed.insights.into_iter().map(Insight::from).collect();

        info!(insight_count = insights.len(), "reflection: step 7, running post-generation hook");
        if self.config.enable_hooks
            && let Some(hooks) = &self.hooks
        {
            hooks.after_insight_generation(&insights).await;

            info!("reflection: step 8, running pre-consolidation hook");
            if let Some(replacement) = hooks.before_consolidation(&insights).await {
                insights = replacement;
            }
        }

        info!(insight_count = insights.len(), "reflection: step 9, consolidating insights");
        for insight in &insights {
            if let Err(e) = self.mmu.consolidate_ltm(ctx, insight).await {
                warn!(insight_id = %insight.id, error = %e, "failed to consolidate insight, continuing");
            }
        }

        info!(insight_count = insights.len(), "reflection: step 10, reflection pass complete");
        Ok(insights)
    }
}

impl std::fmt::Debug for ReflectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmu::MmuConfig;
    use crate::models::AccessLevel;
    use crate::mmu::oracle::mock::MockOracle;
    use crate::reflection::hooks::mock::MockScriptEngine;
    use crate::storage::backends::MemoryBackend;
    use crate::storage::LtmStore;

    fn ctx() -> EngramContext {
        EngramContext::for_entity("E")
    }

    fn engine(response: &str) -> (ReflectionEngine, Arc<dyn LtmStore>) {
        let store: Arc<dyn LtmStore> = Arc::new(MemoryBackend::new());
        let mmu = Arc::new(MemoryManagementUnit::new(store.clone(), None, MmuConfig::default()));
        let oracle: Arc<dyn ReasoningOracle> = Arc::new(MockOracle::new(4, response));
        let reflection = ReflectionEngine::new(mmu, oracle, None, ReflectionConfig::default());
        (reflection, store)
    }

    #[tokio::test]
    async fn empty_sample_short_circuits_without_oracle_call() {
        let (reflection, _store) = engine(r#"{"insights":[]}"#);
        let insights = reflection.trigger_reflection(&ctx()).await.unwrap();
        assert!(insights.is_empty());
    }

    #[tokio::test]
    async fn reflection_round_trip() {
        let response = r#"{"insights":[{"type":"pattern","description":"D","confidence":0.8,"related_memory_ids":["r1","r2"]}]}"#;
        let (reflection, store) = engine(response);

        store
            .store(&ctx(), crate::models::MemoryRecord::builder("seed one").build())
            .await
            .unwrap();
        store
            .store(&ctx(), crate::models::MemoryRecord::builder("seed two").build())
            .await
            .unwrap();

        let insights = reflection.trigger_reflection(&ctx()).await.unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].description, "D");
        assert_eq!(insights[0].confidence, 0.8);

        let found = store
            .retrieve(&ctx(), &LtmQuery::new().with_filter("source", serde_json::json!("reflection")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "D");
        assert_eq!(found[0].metadata_get("insight_type"), Some(&serde_json::json!("pattern")));
        assert_eq!(found[0].access_level, AccessLevel::SharedWithinEntity);
    }

    #[tokio::test]
    async fn pre_hook_veto_skips_analysis() {
        let store: Arc<dyn LtmStore> = Arc::new(MemoryBackend::new());
        let mmu = Arc::new(MemoryManagementUnit::new(store.clone(), None, MmuConfig::default()));
        let oracle: Arc<dyn ReasoningOracle> = Arc::new(MockOracle::new(4, r#"{"insights":[]}"#));
        let hooks: Arc<dyn ScriptEngine> = Arc::new(MockScriptEngine { veto: true, replace_with: None });
        let reflection = ReflectionEngine::new(
            mmu,
            oracle.clone(),
            Some(hooks),
            ReflectionConfig { enable_hooks: true, ..Default::default() },
        );

        store.store(&ctx(), crate::models::MemoryRecord::builder("seed").build()).await.unwrap();

        let insights = reflection.trigger_reflection(&ctx()).await.unwrap();
        assert!(insights.is_empty());
    }

    #[tokio::test]
    async fn malformed_oracle_response_is_parse_error() {
        let (reflection, store) = engine("not json");
        store.store(&ctx(), crate::models::MemoryRecord::builder("seed").build()).await.unwrap();
        let err = reflection.trigger_reflection(&ctx()).await.unwrap_err();
        assert!(matches!(err, EngramError::Parse(_)));
    }
}
