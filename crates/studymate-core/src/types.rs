//! Common types used across the StudyMate pipeline

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::document::Chunk;
use crate::error::{Error, ErrorKind, Result};

/// Stages of one question-answering request, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Extracting,
    Chunking,
    Indexing,
    Retrieving,
    Generating,
    Done,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Extracting => "extracting",
            Stage::Chunking => "chunking",
            Stage::Indexing => "indexing",
            Stage::Retrieving => "retrieving",
            Stage::Generating => "generating",
            Stage::Done => "done",
        }
    }

    /// Taxonomy value for failures that carry no kind of their own
    pub fn fallback_kind(&self) -> ErrorKind {
        match self {
            Stage::Extracting => ErrorKind::UnreadablePdf,
            Stage::Chunking => ErrorKind::Configuration,
            Stage::Indexing | Stage::Retrieving => ErrorKind::Embedding,
            Stage::Generating | Stage::Done => ErrorKind::Generation,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for retry behavior
///
/// `max_attempts` counts the first call, so the default of 2 allows exactly
/// one retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Configuration for one question-answering request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            request_timeout: Duration::from_secs(600),
            retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let config = Self::load_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read environment variables without validating the combination
    ///
    /// Callers that layer further overrides on top validate once at the end.
    pub fn load_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            chunk_size: parse_usize(&lookup, "STUDYMATE_CHUNK_SIZE")?.unwrap_or(defaults.chunk_size),
            chunk_overlap: parse_usize(&lookup, "STUDYMATE_CHUNK_OVERLAP")?.unwrap_or(defaults.chunk_overlap),
            top_k: parse_usize(&lookup, "STUDYMATE_TOP_K")?.unwrap_or(defaults.top_k),
            request_timeout: parse_usize(&lookup, "STUDYMATE_TIMEOUT_SECS")?
                .map(|secs| Duration::from_secs(secs as u64))
                .unwrap_or(defaults.request_timeout),
            retry: defaults.retry,
        })
    }

    /// Check the chunking and retrieval parameters
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be greater than 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(Error::Configuration("top_k must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Configuration("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_usize(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<usize>> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| Error::Configuration(format!("{} must be a non-negative integer, got '{}'", key, raw))),
        None => Ok(None),
    }
}

/// Final product of a question-answering request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub used_chunks: Vec<Chunk>,
    pub error: Option<ErrorKind>,
}

impl AnswerResult {
    pub fn answered(answer: String, used_chunks: Vec<Chunk>) -> Self {
        Self {
            answer,
            used_chunks,
            error: None,
        }
    }

    pub fn failed(kind: ErrorKind) -> Self {
        Self {
            answer: String::new(),
            used_chunks: Vec::new(),
            error: Some(kind),
        }
    }

    /// Number of chunks that grounded the answer; zero means "answered without evidence"
    pub fn evidence_count(&self) -> usize {
        self.used_chunks.len()
    }

    pub fn has_evidence(&self) -> bool {
        !self.used_chunks.is_empty()
    }
}
