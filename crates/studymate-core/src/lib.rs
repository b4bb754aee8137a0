//! Core traits and types for StudyMate
//!
//! This crate defines the capability interfaces of the question-answering
//! pipeline (extractor, embedder, vector index, generator), the data model
//! that flows between them and the error taxonomy reported to callers.

pub mod document;
pub mod embedder;
pub mod vector_index;
pub mod generator;
pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use document::{Document, Chunk, ExtractedText, Extractor};
pub use embedder::{Embedder, EmbeddingSpace, EmbeddingVector};
pub use vector_index::{VectorIndex, RetrievalResult, ScoredChunk};
pub use generator::{Generator, GenerationConfig};
pub use types::*;
