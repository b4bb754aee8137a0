//! watsonx.ai backends for StudyMate
//!
//! `WatsonxClient` implements [`Generator`] with IBM Granite models and hands
//! out a [`WatsonxEmbedder`] sharing its IAM token.

mod client;
mod config;
mod embeddings;


pub use client::{WatsonxClient, build_prompt, clean_answer};
pub use config::{DEFAULT_API_URL, DEFAULT_EMBEDDING_MODEL_ID, DEFAULT_IAM_URL, DEFAULT_MODEL_ID, WatsonxConfig};
pub use embeddings::{WatsonxEmbedder, known_dimension};

// Re-export core types for convenience
pub use studymate_core::{Embedder, EmbeddingSpace, Error, GenerationConfig, Generator, Result};
