//! Insights: reflection-produced statements persisted back into the LTM.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The kind of observation an insight represents.
///
/// Four variants are first-class; anything else the oracle returns is kept
/// verbatim under `Custom` rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightType {
    /// A recurring theme across several memories.
    Pattern,
    /// A relationship drawn between otherwise unrelated memories.
    Connection,
    /// A gap or missing piece implied by the sampled memories.
    Gap,
    /// An outlier inconsistent with the rest of the sample.
    Anomaly,
    /// Anything the oracle labeled outside the four first-class kinds.
    Custom(String),
}

impl Serialize for InsightType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for InsightType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(InsightType::parse(&s))
    }
}

impl std::fmt::Display for InsightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsightType::Pattern => write!(f, "pattern"),
            InsightType::Connection => write!(f, "connection"),
            InsightType::Gap => write!(f, "gap"),
            InsightType::Anomaly => write!(f, "anomaly"),
            InsightType::Custom(s) => write!(f, "{s}"),
        }
    }
}

impl InsightType {
    /// Parse the type string the oracle returned.
    pub fn parse(s: &str) -> Self {
        match s {
            "pattern" => InsightType::Pattern,
            "connection" => InsightType::Connection,
            "gap" => InsightType::Gap,
            "anomaly" => InsightType::Anomaly,
            other => InsightType::Custom(other.to_string()),
        }
    }
}

/// A structured observation produced by a reflection pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    /// Fresh, globally unique identifier.
    pub id: String,

    /// The kind of observation.
    #[serde(rename = "type")]
    pub insight_type: InsightType,

    /// Human-readable statement of the observation.
    pub description: String,

    /// Confidence in `[0, 1]`.
    pub confidence: f32,

    /// Memory ids this insight draws on, referenced by value.
    #[serde(default)]
    pub related_memory_ids: Vec<String>,

    /// Free-form metadata carried alongside the insight.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// When this insight was produced.
    pub created_at: DateTime<Utc>,
}

impl Insight {
    /// Construct an insight with a fresh id and the current timestamp.
    pub fn new(
        insight_type: InsightType,
        description: impl Into<String>,
        confidence: f32,
        related_memory_ids: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            insight_type,
            description: description.into(),
            confidence,
            related_memory_ids,
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }
}

/// The literal shape one entry of the oracle's `insights` array takes.
///
/// Deserialized directly from the reasoning oracle's JSON response before
/// being promoted into an [`Insight`] with a fresh id and timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInsight {
    #[serde(rename = "type")]
    pub insight_type: String,
    pub description: String,
    pub confidence: f32,
    #[serde(default)]
    pub related_memory_ids: Vec<String>,
}

/// The envelope the reasoning oracle is prompted to return:
/// `{ "insights": [ ... ] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct InsightResponse {
    pub insights: Vec<RawInsight>,
}

impl From<RawInsight> for Insight {
    fn from(raw: RawInsight) -> Self {
        Insight::new(
            InsightType::parse(&raw.insight_type),
            raw.description,
            raw.confidence,
            raw.related_memory_ids,
        )
    }
}
