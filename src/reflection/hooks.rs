//! The optional scripting hook engine the reflection loop calls around
//! sampling, insight generation, and consolidation. Always an external
//! collaborator; this crate ships no script runtime of its own.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::models::{Insight, MemoryRecord};

/// Outcome of a hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookResult {
    Continue,
    /// Valid only from `before_reflection_analysis`: skip this reflection
    /// pass entirely.
    Skip,
}

impl Default for HookResult {
    fn default() -> Self {
        HookResult::Continue
    }
}

/// The three named entry points a script engine may hook into, per the
/// reflection algorithm's optional pre/post steps.
#[async_trait]
pub trait ScriptEngine: Send + Sync + Debug {
    /// Called right after sampling, before the prompt is composed.
    /// Returning `Skip` aborts this reflection pass and returns no insights.
    async fn before_reflection_analysis(&self, memories: &[MemoryRecord]) -> HookResult {
        let _ = memories;
        HookResult::Continue
    }

    /// Called after the oracle's response is parsed into insights. Errors
    /// are logged by the caller and never abort the pass.
    async fn after_insight_generation(&self, insights: &[Insight]) -> HookResult {
        let _ = insights;
        HookResult::Continue
    }

    /// Called before consolidation. Returning `Some` replaces the insight
    /// list that gets consolidated and returned.
    async fn before_consolidation(&self, insights: &[Insight]) -> Option<Vec<Insight>> {
        let _ = insights;
        None
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Vetoes sampling at `before_reflection_analysis` when `veto` is set;
    /// otherwise a no-op pass-through, for exercising the optional hook
    /// steps in isolation.
    #[derive(Debug, Default)]
    pub struct MockScriptEngine {
        pub veto: bool,
        pub replace_with: Option<Vec<Insight>>,
    }

    #[async_trait]
    impl ScriptEngine for MockScriptEngine {
        async fn before_reflection_analysis(&self, _memories: &[MemoryRecord]) -> HookResult {
            if self.veto { HookResult::Skip } else { HookResult::Continue }
        }

        async fn before_consolidation(&self, _insights: &[Insight]) -> Option<Vec<Insight>> {
            self.replace_with.clone()
        }
    }
}
