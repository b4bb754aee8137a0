//! Generator trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Result;

/// Configuration for text generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub stop_sequences: Vec<String>,
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: "ibm/granite-3-3-8b-instruct".to_string(),
            max_tokens: 500,
            temperature: None,
            top_p: Some(1.0),
            top_k: Some(50),
            stop_sequences: vec![
                "Question:".to_string(),
                "Context:".to_string(),
            ],
            timeout: Duration::from_secs(120),
        }
    }
}

/// Trait for answer generators (e.g., watsonx.ai Granite, extractive fallback)
///
/// Generators must accept an empty `context` and answer on a best-effort
/// basis. Backend failures are reported as [`crate::Error::Generation`].
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce an answer to `question` grounded in `context`
    async fn generate(&self, context: &str, question: &str, model_hint: Option<&str>) -> Result<String>;

    /// The model used when no hint is given
    fn model_id(&self) -> &str;
}
