//! Deterministic prompt composition for the reflection analysis call.

use crate::models::MemoryRecord;

const RESPONSE_INSTRUCTION: &str = r#"Respond with a single JSON object and no preamble, in exactly this shape:
{ "insights": [ { "type": "pattern|connection|gap|anomaly", "description": "...", "confidence": 0.0, "related_memory_ids": ["..."] } ] }"#;

/// List each memory as `"Memory #i (ID, Created): Content / Metadata: <json>"`
/// followed by the fixed response-format instruction.
pub fn compose_analysis_prompt(memories: &[MemoryRecord]) -> String {
    let mut prompt = String::new();
    for (i, m) in memories.iter().enumerate() {
        let metadata = serde_json::Value::Object(m.metadata.clone());
        prompt.push_str(&format!(
            "Memory #{} ({}, {}): {} / Metadata: {}\n",
            i + 1,
            m.id,
            m.created_at.to_rfc3339(),
            m.content,
            metadata,
        ));
    }
    prompt.push('\n');
    prompt.push_str(RESPONSE_INSTRUCTION);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemoryRecord;

    #[test]
    fn lists_memories_in_order() {
        let memories = vec![
            MemoryRecord::builder("first").build(),
            MemoryRecord::builder("second").build(),
        ];
        let prompt = compose_analysis_prompt(&memories);
        assert!(prompt.contains("Memory #1"));
        assert!(prompt.contains("first"));
        assert!(prompt.contains("Memory #2"));
        assert!(prompt.contains("second"));
        assert!(prompt.contains("\"insights\""));
    }
}
