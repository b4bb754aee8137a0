//! Error types for the StudyMate pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Stage;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by pipeline components and backends
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unreadable PDF: {0}")]
    UnreadablePdf(String),

    #[error("Empty document: {0}")]
    EmptyDocument(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// The taxonomy value this error belongs to, if it names one directly.
    ///
    /// Transport-level errors (network, auth, serialization, io) return `None`;
    /// they are classified by the stage that raised them, see [`Error::classify`].
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::UnreadablePdf(_) => Some(ErrorKind::UnreadablePdf),
            Error::EmptyDocument(_) => Some(ErrorKind::EmptyDocument),
            Error::Embedding(_) => Some(ErrorKind::Embedding),
            Error::DimensionMismatch(_) => Some(ErrorKind::DimensionMismatch),
            Error::Configuration(_) => Some(ErrorKind::Configuration),
            Error::InvalidQuestion(_) => Some(ErrorKind::InvalidQuestion),
            Error::Generation(_) => Some(ErrorKind::Generation),
            Error::Timeout(_) => Some(ErrorKind::Timeout),
            Error::Authentication(_)
            | Error::Network(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Other(_) => None,
        }
    }

    /// Map this error onto exactly one taxonomy value for the given stage.
    pub fn classify(&self, stage: Stage) -> ErrorKind {
        self.kind().unwrap_or_else(|| stage.fallback_kind())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Error taxonomy visible to callers of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "UnreadablePdfError")]
    UnreadablePdf,
    #[serde(rename = "EmptyDocumentError")]
    EmptyDocument,
    #[serde(rename = "EmbeddingError")]
    Embedding,
    #[serde(rename = "DimensionMismatchError")]
    DimensionMismatch,
    #[serde(rename = "ConfigurationError")]
    Configuration,
    #[serde(rename = "InvalidQuestionError")]
    InvalidQuestion,
    #[serde(rename = "GenerationError")]
    Generation,
    #[serde(rename = "TimeoutError")]
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnreadablePdf => "UnreadablePdfError",
            ErrorKind::EmptyDocument => "EmptyDocumentError",
            ErrorKind::Embedding => "EmbeddingError",
            ErrorKind::DimensionMismatch => "DimensionMismatchError",
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::InvalidQuestion => "InvalidQuestionError",
            ErrorKind::Generation => "GenerationError",
            ErrorKind::Timeout => "TimeoutError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_errors_keep_their_kind() {
        let err = Error::EmptyDocument("no text".to_string());
        assert_eq!(err.classify(Stage::Generating), ErrorKind::EmptyDocument);

        let err = Error::DimensionMismatch("3 chunks, 2 vectors".to_string());
        assert_eq!(err.classify(Stage::Extracting), ErrorKind::DimensionMismatch);
    }

    #[test]
    fn test_transport_errors_follow_stage() {
        let err = Error::Network("connection reset".to_string());
        assert_eq!(err.kind(), None);
        assert_eq!(err.classify(Stage::Generating), ErrorKind::Generation);
        assert_eq!(err.classify(Stage::Indexing), ErrorKind::Embedding);
        assert_eq!(err.classify(Stage::Retrieving), ErrorKind::Embedding);

        let err = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(err.classify(Stage::Extracting), ErrorKind::UnreadablePdf);
    }

    #[test]
    fn test_error_kind_wire_names() {
        let json = serde_json::to_string(&ErrorKind::EmptyDocument).unwrap();
        assert_eq!(json, "\"EmptyDocumentError\"");
        assert_eq!(ErrorKind::Timeout.to_string(), "TimeoutError");

        let parsed: ErrorKind = serde_json::from_str("\"GenerationError\"").unwrap();
        assert_eq!(parsed, ErrorKind::Generation);
    }

    #[test]
    fn test_taxonomy_snapshot() {
        let kinds = [
            ErrorKind::UnreadablePdf,
            ErrorKind::EmptyDocument,
            ErrorKind::Embedding,
            ErrorKind::DimensionMismatch,
            ErrorKind::Configuration,
            ErrorKind::InvalidQuestion,
            ErrorKind::Generation,
            ErrorKind::Timeout,
        ];

        insta::assert_yaml_snapshot!(kinds, @r###"
        - UnreadablePdfError
        - EmptyDocumentError
        - EmbeddingError
        - DimensionMismatchError
        - ConfigurationError
        - InvalidQuestionError
        - GenerationError
        - TimeoutError
        "###);
    }
}
