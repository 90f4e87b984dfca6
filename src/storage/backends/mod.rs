//! Concrete [`crate::storage::traits::LtmStore`] implementations.

pub mod kv;
pub mod memory;
pub mod relational;

#[cfg(any(feature = "surrealdb-embedded", feature = "surrealdb-remote"))]
pub mod vector;

pub use kv::KvBackend;
pub use memory::MemoryBackend;
pub use relational::RelationalBackend;

#[cfg(any(feature = "surrealdb-embedded", feature = "surrealdb-remote"))]
pub use vector::VectorBackend;
