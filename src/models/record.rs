//! The memory record: the primary unit persisted by every store backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Access rule gating who may read a record back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Readable only by the caller whose `UserID` equals the record's `UserID`.
    PrivateToUser,
    /// Readable by any caller within the same entity.
    SharedWithinEntity,
}

impl AccessLevel {
    /// Encode as the integer form used by the relational and vector backends.
    pub fn as_i64(&self) -> i64 {
        match self {
            AccessLevel::SharedWithinEntity => 0,
            AccessLevel::PrivateToUser => 1,
        }
    }

    /// Decode from the integer form used by the relational and vector backends.
    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(AccessLevel::SharedWithinEntity),
            1 => Some(AccessLevel::PrivateToUser),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessLevel::PrivateToUser => write!(f, "private_to_user"),
            AccessLevel::SharedWithinEntity => write!(f, "shared_within_entity"),
        }
    }
}

/// The primary stored unit: content, metadata, an optional embedding, and
/// audit timestamps, scoped to exactly one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Globally unique identifier; assigned on first store if the caller
    /// omits it.
    pub id: String,

    /// Tenant boundary. Must equal the ambient entity id at write time.
    pub entity_id: String,

    /// Optional at creation; adopted from ambient context if absent and
    /// required in effect for `PrivateToUser`.
    pub user_id: Option<String>,

    /// Who may read this record back.
    pub access_level: AccessLevel,

    /// Free-form text.
    pub content: String,

    /// Structured metadata. Values are drawn from string, number, boolean,
    /// nested object, nested array, or null.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// Fixed-dimension dense vector, present only for embeddings matching
    /// the owning store's configured dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Instant of first store. Immutable thereafter.
    pub created_at: DateTime<Utc>,

    /// Instant of the most recent store or update. Advances monotonically.
    pub updated_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Start building a record with the given content.
    pub fn builder(content: impl Into<String>) -> MemoryRecordBuilder {
        MemoryRecordBuilder::new(content)
    }

    /// Look up a metadata value by key.
    pub fn metadata_get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Set a metadata value, overwriting any existing entry for `key`.
    pub fn metadata_set(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Whether this record carries an embedding.
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Fluent constructor for [`MemoryRecord`].
///
/// Fields left unset are filled with context-derived or generated defaults
/// when the record reaches `Store`: a fresh UUID for `id`, the ambient
/// entity/user for `entity_id`/`user_id`, and `now()` for both timestamps.
pub struct MemoryRecordBuilder {
    record: MemoryRecord,
}

impl MemoryRecordBuilder {
    /// Start a new builder with auto-generated id and current timestamps.
    pub fn new(content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            record: MemoryRecord {
                id: Uuid::new_v4().to_string(),
                entity_id: String::new(),
                user_id: None,
                access_level: AccessLevel::SharedWithinEntity,
                content: content.into(),
                metadata: Map::new(),
                embedding: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Override the generated id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.record.id = id.into();
        self
    }

    /// Set the owning entity.
    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.record.entity_id = entity_id.into();
        self
    }

    /// Set the owning user.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.record.user_id = Some(user_id.into());
        self
    }

    /// Set the access level.
    pub fn access_level(mut self, access_level: AccessLevel) -> Self {
        self.record.access_level = access_level;
        self
    }

    /// Mark this record `PrivateToUser` for the given user (convenience).
    pub fn private_to(mut self, user_id: impl Into<String>) -> Self {
        self.record.user_id = Some(user_id.into());
        self.record.access_level = AccessLevel::PrivateToUser;
        self
    }

    /// Set the full metadata map, replacing any previous entries.
    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.record.metadata = metadata;
        self
    }

    /// Set a single metadata key (convenience).
    pub fn property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.record.metadata.insert(key.into(), value);
        self
    }

    /// Attach an embedding.
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.record.embedding = Some(embedding);
        self
    }

    /// Build the final record.
    pub fn build(self) -> MemoryRecord {
        self.record
    }
}
