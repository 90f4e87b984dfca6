//! # Engram
//!
//! A long-term memory substrate for autonomous agents: a tenant-isolated
//! access plane over pluggable storage backends (key-value, relational,
//! vector-indexed, in-memory), fronted by a Memory Management Unit, plus a
//! Reflection loop that asks a reasoning oracle to distill recent memories
//! into insights and consolidates them back in.
//!
//! ## Quick start
//!
//! ```rust
//! use engram::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engram = init_with_defaults().await?;
//!     let ctx = EngramContext::for_entity("agent-1");
//!
//!     let id = engram.mmu().encode_to_ltm(&ctx, EncodePayload::text("the sky is blue")).await?;
//!     let found = engram.mmu().retrieve_from_ltm(
//!         &ctx,
//!         LtmQuery::new().with_id(id),
//!         RetrieveOptions::default(),
//!     ).await?;
//!     assert_eq!(found.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod logging;
pub mod mmu;
pub mod models;
pub mod query;
pub mod reflection;
pub mod storage;

use std::sync::Arc;

/// Commonly used types, re-exported for `use engram::prelude::*;`.
pub mod prelude {
    pub use crate::{init, init_with_defaults, Engram, EngramError, Result};

    pub use crate::config::{ConfigBuilder, EngramConfig, LogFormat, LogLevel};
    pub use crate::context::EngramContext;
    pub use crate::mmu::{EncodePayload, MemoryManagementUnit, ProcessOptions, ReasoningOracle, RetrieveOptions, RetrievalStrategy};
    pub use crate::models::{AccessLevel, Insight, InsightType, MemoryRecord, MemoryRecordBuilder};
    pub use crate::query::{DistanceMetric, LtmQuery};
    pub use crate::reflection::{HookResult, ReflectionConfig, ReflectionEngine, ScriptEngine};
    pub use crate::storage::{LtmStore, StorageError, StoreConfig};
}

/// Current library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Top-level error type. One variant per [`storage::StorageError`] kind, plus
/// the ambient configuration/logging/catch-all variants a full application
/// needs beyond the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum EngramError {
    #[error("missing ambient entity context")]
    MissingContext,

    #[error("context mismatch: {0}")]
    ContextMismatch(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("dimension error: expected {expected}, got {actual}")]
    DimensionError { expected: usize, actual: usize },

    #[error("semantic retrieval requested with no query vector")]
    MissingQueryVector,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("oracle error: {0}")]
    Oracle(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("{0}")]
    Other(String),
}

impl From<config::ConfigError> for EngramError {
    fn from(err: config::ConfigError) -> Self {
        EngramError::Configuration(err.to_string())
    }
}

/// Result type for Engram operations.
pub type Result<T> = std::result::Result<T, EngramError>;

/// Bundles a constructed store behind the Memory Management Unit. The
/// reflection loop is assembled separately via [`Engram::reflection_engine`]
/// since it requires a reasoning oracle, which `init` does not assume.
pub struct Engram {
    mmu: Arc<mmu::MemoryManagementUnit>,
}

impl Engram {
    /// The Memory Management Unit fronting the configured store.
    pub fn mmu(&self) -> &Arc<mmu::MemoryManagementUnit> {
        &self.mmu
    }

    /// Build a [`reflection::ReflectionEngine`] over this instance's MMU.
    pub fn reflection_engine(
        &self,
        oracle: Arc<dyn mmu::ReasoningOracle>,
        hooks: Option<Arc<dyn reflection::ScriptEngine>>,
        config: reflection::ReflectionConfig,
    ) -> reflection::ReflectionEngine {
        reflection::ReflectionEngine::new(self.mmu.clone(), oracle, hooks, config)
    }
}

/// Initialize Engram with [`config::ConfigBuilder::defaults`].
pub async fn init_with_defaults() -> Result<Engram> {
    let config = config::ConfigBuilder::defaults().build()?;
    init(config).await
}

/// Initialize Engram with the given configuration: sets up logging (a
/// second call is harmless, matching [`logging::init`]'s own idempotence),
/// constructs the configured store, and wires it behind an MMU with no
/// reasoning oracle attached.
pub async fn init(config: config::EngramConfig) -> Result<Engram> {
    let _ = logging::init(&config.logging);

    let store = storage::create_store(&config.store).await?;
    let mmu = Arc::new(mmu::MemoryManagementUnit::new(Arc::from(store), None, config.mmu));

    Ok(Engram { mmu })
}
