//! Retrieval-augmented question answering for StudyMate
//!
//! This crate provides the default implementations of the pipeline
//! capabilities (PDF extraction, chunking, hashing embedder, flat vector
//! index, extractive generator) and the [`QaPipeline`] orchestrator that
//! wires them into one request.

mod chunker;
mod embedder;
mod extractor;
mod generator;
mod index;
mod pipeline;
mod retriever;


pub use chunker::{TextChunker, chunk};
pub use embedder::HashEmbedder;
pub use extractor::{PdfExtractor, clean_text};
pub use generator::ExtractiveGenerator;
pub use index::{FlatIndex, normalize};
pub use pipeline::{PipelineFailure, PipelineState, QaOutcome, QaPipeline, QaRequest, build_context};
pub use retriever::retrieve;

// Re-export core types for convenience
pub use studymate_core::{
    AnswerResult, Chunk, Document, Embedder, EmbeddingSpace, EmbeddingVector, Error, ErrorKind,
    ExtractedText, Extractor, Generator, PipelineConfig, Result, RetrievalResult, RetryConfig,
    ScoredChunk, Stage, VectorIndex,
};
