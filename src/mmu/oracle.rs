//! The reasoning/embedding oracle contract the MMU and reflection loop
//! compose over. Always an external collaborator — this crate never embeds
//! a model.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::Result;

/// Sampling knobs for a single `Process` call.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub model: Option<String>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 2048,
            model: None,
        }
    }
}

/// Text completion plus embedding generation, supplied externally.
#[async_trait]
pub trait ReasoningOracle: Send + Sync + Debug {
    /// Run a single completion over `prompt`.
    async fn process(&self, prompt: &str, options: ProcessOptions) -> Result<String>;

    /// Embed a batch of texts, one vector per input, in order.
    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Returns a fixed response to every `process` call and a deterministic
    /// per-character embedding, for exercising the MMU and reflection loop
    /// without a live model.
    #[derive(Debug)]
    pub struct MockOracle {
        pub dimension: usize,
        pub response: Mutex<String>,
        pub calls: Mutex<u32>,
    }

    impl MockOracle {
        pub fn new(dimension: usize, response: impl Into<String>) -> Self {
            Self {
                dimension,
                response: Mutex::new(response.into()),
                calls: Mutex::new(0),
            }
        }

        pub fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReasoningOracle for MockOracle {
        async fn process(&self, _prompt: &str, _options: ProcessOptions) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.response.lock().unwrap().clone())
        }

        async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; self.dimension];
                    for (i, c) in t.chars().enumerate() {
                        v[i % self.dimension] += (c as u32 % 97) as f32 / 97.0;
                    }
                    v
                })
                .collect())
        }
    }
}
