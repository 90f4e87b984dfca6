//! Core data model: memory records and the insights reflection produces.

mod insight;
mod record;

pub use insight::{Insight, InsightResponse, InsightType, RawInsight};
pub use record::{AccessLevel, MemoryRecord, MemoryRecordBuilder};
