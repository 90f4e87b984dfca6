//! Builder pattern API for assembling an [`EngramConfig`] in code.

use super::{models::*, validation, Result};
use crate::mmu::MmuConfig;
use crate::query::DistanceMetric;
use crate::reflection::ReflectionConfig;
use crate::storage::StoreConfig;
use std::path::{Path, PathBuf};

/// Builder for [`EngramConfig`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: EngramConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self { config: EngramConfig::default() }
    }

    pub fn with_memory_store(mut self) -> Self {
        self.config.store = StoreConfig::Memory;
        self
    }

    pub fn with_kv_store<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.store = StoreConfig::Kv { path: path.as_ref().to_path_buf() };
        self
    }

    pub fn with_relational_store<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.store = StoreConfig::Relational { path: path.as_ref().to_path_buf() };
        self
    }

    pub fn with_vector_store<P: AsRef<Path>>(mut self, path: P, dimension: usize, distance: DistanceMetric) -> Self {
        self.config.store = StoreConfig::Vector {
            path: path.as_ref().to_path_buf(),
            dimension,
            distance,
            table: "memory_vectors".to_string(),
        };
        self
    }

    pub fn with_mmu_config(mut self, mmu: MmuConfig) -> Self {
        self.config.mmu = mmu;
        self
    }

    pub fn with_reflection_config(mut self, reflection: ReflectionConfig) -> Self {
        self.config.reflection = reflection;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.logging.file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_default_logging(mut self) -> Self {
        self.config.logging.level = LogLevel::Info;
        self.config.logging.format = LogFormat::Json;
        self.config.logging.file = None;
        self
    }

    /// In-memory store, debug logging: fast startup for local development.
    pub fn development() -> Self {
        Self::new().with_memory_store().with_log_level(LogLevel::Debug)
    }

    /// In-memory store under a scratch data directory, for automated tests.
    pub fn testing() -> Self {
        Self::development()
    }

    /// Embedded RocksDB KV store under a persistent data directory.
    pub fn production() -> Self {
        let data_dir = directories::ProjectDirs::from("dev", "engram", "engram")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./data"));

        Self::new().with_kv_store(data_dir.join("ltm")).with_default_logging()
    }

    /// Equivalent to [`Self::production`]; the name most callers reach for.
    pub fn defaults() -> Self {
        Self::production()
    }

    /// In-memory store, minimal logging: quick prototyping.
    pub fn minimal() -> Self {
        Self::new().with_memory_store().with_log_level(LogLevel::Info)
    }

    /// Validate and return the assembled configuration.
    pub fn build(self) -> Result<EngramConfig> {
        validation::validate_config(&self.config)?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
