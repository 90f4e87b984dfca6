//! The LTM query algebra shared by every store backend.
//!
//! `LtmQuery` is a value object; the predicate helpers in this module give
//! the full-scan backends ([`crate::storage::backends::memory`],
//! [`crate::storage::backends::kv`]) and the relational/vector backends a
//! single place to agree on reserved keys, access rules, and ordering so the
//! behavior in §4.A of the access-plane contract stays identical across
//! radically different storage models.

use crate::context::EngramContext;
use crate::models::{AccessLevel, MemoryRecord};
use serde_json::Value;
use std::collections::HashMap;

/// Reserved `ExactMatch` key that short-circuits to an id lookup.
pub const EXACT_MATCH_ID_CANONICAL: &str = "ID";
/// Lowercase alias accepted for the id lookup, per the open question in the
/// design notes: one backend in the system's lineage used lowercase `id`.
pub const EXACT_MATCH_ID_ALIAS: &str = "id";

/// Reserved `Filters` keys targeting first-class columns rather than metadata.
pub const FILTER_ENTITY_ID: &str = "entity_id";
pub const FILTER_USER_ID: &str = "user_id";
pub const FILTER_ACCESS_LEVEL: &str = "access_level";

const DEFAULT_LIMIT_VECTOR: i64 = 10;
const DEFAULT_LIMIT_NON_VECTOR: i64 = 100;

/// Distance metric used to order semantic retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
    Dot,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        DistanceMetric::Cosine
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            "dot" | "dotproduct" | "inner-product" => Ok(DistanceMetric::Dot),
            other => Err(format!("unsupported distance metric: {other}")),
        }
    }
}

impl DistanceMetric {
    /// Smaller is closer for every metric here, so ascending order is
    /// always "most similar first".
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::Dot => -dot_product(a, b),
        }
    }
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 { 0.0 } else { dot_product(a, b) / denom }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// The query algebra's value object: exact-match lookups, structural
/// filters, a case-insensitive text predicate, an optional embedding that
/// switches retrieval into semantic mode, and a result cap.
#[derive(Debug, Clone, Default)]
pub struct LtmQuery {
    /// Field -> value. The reserved `ID`/`id` key short-circuits to a direct
    /// id lookup; every other key tests metadata equality.
    pub exact_match: HashMap<String, Value>,

    /// Field -> value, ANDed together. Reserved keys `entity_id`, `user_id`,
    /// `access_level` target first-class columns; anything else tests
    /// metadata equality via string form.
    pub filters: HashMap<String, Value>,

    /// Case-insensitive substring match against `Content`. Empty disables.
    pub text: Option<String>,

    /// Query vector. Presence of a non-empty vector switches retrieval to
    /// semantic mode.
    pub embedding: Option<Vec<f32>>,

    /// Result cap. `<= 0` (or unset) falls back to the backend-appropriate
    /// default (10 for vector-mode retrieval, 100 otherwise).
    pub limit: Option<i64>,
}

impl LtmQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exact_match(mut self, key: impl Into<String>, value: Value) -> Self {
        self.exact_match.insert(key.into(), value);
        self
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.with_exact_match(EXACT_MATCH_ID_CANONICAL, Value::String(id.into()))
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.filters.insert(key.into(), value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The id this query short-circuits to, if any (`ID` takes precedence
    /// over `id` when, implausibly, both are present).
    pub fn exact_id(&self) -> Option<&str> {
        self.exact_match
            .get(EXACT_MATCH_ID_CANONICAL)
            .or_else(|| self.exact_match.get(EXACT_MATCH_ID_ALIAS))
            .and_then(Value::as_str)
    }

    /// Whether this query is in semantic mode.
    pub fn is_semantic(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// The effective result cap, given whether the backend is about to
    /// service this as a vector-mode query.
    pub fn effective_limit(&self) -> i64 {
        let limit = self.limit.unwrap_or(0);
        if limit > 0 {
            limit
        } else if self.is_semantic() {
            DEFAULT_LIMIT_VECTOR
        } else {
            DEFAULT_LIMIT_NON_VECTOR
        }
    }
}

/// Tenant predicate: always applied, first.
pub fn matches_tenant(ctx: &EngramContext, record: &MemoryRecord) -> bool {
    record.entity_id == ctx.entity_id
}

/// Access predicate from §4.A: shared records are visible to anyone in the
/// tenant; private records require a matching, non-empty ambient user id.
pub fn matches_access(ctx: &EngramContext, record: &MemoryRecord) -> bool {
    match record.access_level {
        AccessLevel::SharedWithinEntity => true,
        AccessLevel::PrivateToUser => match ctx.user_id() {
            Some(uid) => record.user_id.as_deref() == Some(uid),
            None => false,
        },
    }
}

/// `ExactMatch` entries other than the reserved id key: metadata equality.
pub fn matches_exact(query: &LtmQuery, record: &MemoryRecord) -> bool {
    query.exact_match.iter().all(|(k, v)| {
        if k == EXACT_MATCH_ID_CANONICAL || k == EXACT_MATCH_ID_ALIAS {
            record.id == v.as_str().unwrap_or_default()
        } else {
            record.metadata.get(k) == Some(v)
        }
    })
}

/// `Filters` entries: reserved keys target first-class fields, everything
/// else tests metadata equality via string form.
pub fn matches_filters(query: &LtmQuery, record: &MemoryRecord) -> bool {
    query.filters.iter().all(|(k, v)| match k.as_str() {
        FILTER_ENTITY_ID => v.as_str() == Some(record.entity_id.as_str()),
        FILTER_USER_ID => v.as_str() == record.user_id.as_deref(),
        FILTER_ACCESS_LEVEL => v.as_str() == Some(record.access_level.to_string().as_str()),
        _ => record
            .metadata
            .get(k)
            .map(|mv| value_as_string(mv) == value_as_string(v))
            .unwrap_or(false),
    })
}

fn value_as_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Case-insensitive substring match over `Content`; an empty or absent
/// `Text` predicate disables the check entirely.
pub fn matches_text(query: &LtmQuery, record: &MemoryRecord) -> bool {
    match query.text.as_deref() {
        None => true,
        Some(t) if t.is_empty() => true,
        Some(t) => record.content.to_lowercase().contains(&t.to_lowercase()),
    }
}

/// All non-vector predicates ANDed together: tenant, access, exact-match,
/// filters, text. Callers apply this to every candidate record before
/// considering ordering and limit.
pub fn matches_all(ctx: &EngramContext, query: &LtmQuery, record: &MemoryRecord) -> bool {
    matches_tenant(ctx, record)
        && matches_access(ctx, record)
        && matches_exact(query, record)
        && matches_filters(query, record)
        && matches_text(query, record)
}

/// Sort non-semantic results newest-first by `UpdatedAt`, the ordering
/// standardized across all backends (see design notes).
pub fn sort_non_semantic(records: &mut [MemoryRecord]) {
    records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// Sort semantic results ascending by distance to `query_vector`.
pub fn sort_semantic(
    records: &mut Vec<(MemoryRecord, f32)>,
) {
    records.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
}

pub use DistanceMetric as Metric;
