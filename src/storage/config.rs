//! Configuration for constructing store backends.

use crate::query::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which backend to construct and the knobs it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Embedded, bucketed key-value store.
    Kv { path: PathBuf },

    /// Indexed relational row store.
    Relational { path: PathBuf },

    /// Indexed rows plus approximate-nearest-neighbor search.
    Vector {
        path: PathBuf,
        dimension: usize,
        #[serde(default)]
        distance: DistanceMetric,
        #[serde(default = "default_vector_table")]
        table: String,
    },

    /// In-process reference backend; no persistence.
    Memory,
}

fn default_vector_table() -> String {
    "memory_vectors".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory
    }
}
