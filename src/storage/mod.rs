//! The LTM store abstraction: one trait, several backends, and a factory
//! that turns a [`config::StoreConfig`] into a boxed [`traits::LtmStore`].

pub mod backends;
pub mod config;
#[cfg(test)]
pub(crate) mod conformance;
pub mod errors;
pub mod traits;

pub use config::StoreConfig;
pub use errors::{StorageError, StorageResult};
pub use traits::{LtmStore, StoreCapabilities};

use backends::{KvBackend, MemoryBackend, RelationalBackend};

/// Construct the store described by `config`.
pub async fn create_store(config: &StoreConfig) -> StorageResult<Box<dyn LtmStore>> {
    match config {
        StoreConfig::Kv { path } => Ok(Box::new(KvBackend::open(path)?)),
        StoreConfig::Relational { path } => Ok(Box::new(RelationalBackend::open(path)?)),
        StoreConfig::Memory => Ok(Box::new(MemoryBackend::new())),
        #[cfg_attr(
            not(any(feature = "surrealdb-embedded", feature = "surrealdb-remote")),
            allow(unused_variables)
        )]
        StoreConfig::Vector { path, dimension, distance, table } => {
            #[cfg(any(feature = "surrealdb-embedded", feature = "surrealdb-remote"))]
            {
                let backend = backends::VectorBackend::open(path, *dimension, *distance, table.clone()).await?;
                Ok(Box::new(backend))
            }
            #[cfg(not(any(feature = "surrealdb-embedded", feature = "surrealdb-remote")))]
            {
                Err(StorageError::InvalidArgument(
                    "vector backend requires the surrealdb-embedded or surrealdb-remote feature".into(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn factory_builds_memory_store() {
        let store = create_store(&StoreConfig::Memory).await.unwrap();
        assert!(store.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn factory_builds_kv_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_store(&StoreConfig::Kv { path: dir.path().to_path_buf() })
            .await
            .unwrap();
        assert!(store.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn factory_builds_relational_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_store(&StoreConfig::Relational {
            path: dir.path().join("engram.sqlite3"),
        })
        .await
        .unwrap();
        assert!(store.health_check().await.unwrap());
    }
}
