//! Documents, chunks and the extractor capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A document extracted from one uploaded PDF
///
/// Lives for one request only and is never modified after extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub raw_text: String,
    pub page_count: usize,
}

impl Document {
    pub fn is_blank(&self) -> bool {
        self.raw_text.trim().is_empty()
    }

    /// Length of the text in characters
    pub fn char_len(&self) -> usize {
        self.raw_text.chars().count()
    }
}

/// A contiguous slice of document text, the unit of retrieval
///
/// `char_start` and `char_end` are half-open character offsets into the
/// document text. `index` is contiguous over the chunks kept by the chunker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

/// Plain text and page count produced by an extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
}

/// Trait for PDF text extractors
///
/// Fails with [`crate::Error::UnreadablePdf`] on corrupt, encrypted or empty input.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Turn the raw bytes of a PDF into a single plain-text document
    async fn extract(&self, pdf_bytes: &[u8]) -> Result<ExtractedText>;
}
