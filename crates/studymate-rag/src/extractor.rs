//! PDF text extraction

use async_trait::async_trait;
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use studymate_core::{Error, ExtractedText, Extractor, Result};

static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").expect("valid whitespace pattern"));

/// Extracts plain text from PDF bytes with `pdf-extract`, falling back to `lopdf`
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    max_bytes: usize,
}

impl PdfExtractor {
    pub const DEFAULT_MAX_BYTES: usize = 50 * 1024 * 1024;

    pub fn new() -> Self {
        Self {
            max_bytes: Self::DEFAULT_MAX_BYTES,
        }
    }

    /// Reject inputs larger than `max_bytes`
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Raises the shared flag when the awaiting future goes away
///
/// A blocking thread cannot be aborted, so a deadline that drops `extract`
/// only stops the work at the next checkpoint in [`extract_blocking`].
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    async fn extract(&self, pdf_bytes: &[u8]) -> Result<ExtractedText> {
        if pdf_bytes.is_empty() {
            return Err(Error::UnreadablePdf("input is empty".to_string()));
        }
        if pdf_bytes.len() > self.max_bytes {
            return Err(Error::UnreadablePdf(format!(
                "input is {} bytes, limit is {}",
                pdf_bytes.len(),
                self.max_bytes
            )));
        }

        let data = pdf_bytes.to_vec();
        let cancelled = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(cancelled.clone());
        tokio::task::spawn_blocking(move || extract_blocking(&data, &cancelled))
            .await
            .map_err(|e| Error::UnreadablePdf(format!("extraction task failed: {}", e)))?
    }
}

fn check_cancelled(cancelled: &AtomicBool) -> Result<()> {
    if cancelled.load(Ordering::Relaxed) {
        return Err(Error::UnreadablePdf("extraction cancelled".to_string()));
    }
    Ok(())
}

/// Runs on a blocking thread; `cancelled` is polled between the parse and
/// each extraction backend
fn extract_blocking(data: &[u8], cancelled: &AtomicBool) -> Result<ExtractedText> {
    check_cancelled(cancelled)?;
    let document = lopdf::Document::load_mem(data)
        .map_err(|e| Error::UnreadablePdf(format!("failed to parse PDF: {}", e)))?;

    if document.is_encrypted() {
        return Err(Error::UnreadablePdf("PDF is encrypted".to_string()));
    }

    let pages = document.get_pages();
    let page_count = pages.len();
    if page_count == 0 {
        return Err(Error::UnreadablePdf("PDF has no pages".to_string()));
    }

    check_cancelled(cancelled)?;
    // pdf-extract panics on some malformed font tables
    let primary = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(data)));

    let raw = match primary {
        Ok(Ok(text)) if !text.trim().is_empty() => text,
        Ok(Ok(_)) => {
            debug!("pdf-extract produced no text, trying lopdf");
            fallback_text(&document, pages.keys().copied().collect(), cancelled)?
        }
        Ok(Err(e)) => {
            warn!(error = %e, "pdf-extract failed, trying lopdf");
            fallback_text(&document, pages.keys().copied().collect(), cancelled)?
        }
        Err(_) => {
            warn!("pdf-extract panicked, trying lopdf");
            fallback_text(&document, pages.keys().copied().collect(), cancelled)?
        }
    };

    Ok(ExtractedText {
        text: clean_text(&raw),
        page_count,
    })
}

fn fallback_text(document: &lopdf::Document, page_numbers: Vec<u32>, cancelled: &AtomicBool) -> Result<String> {
    check_cancelled(cancelled)?;
    match document.extract_text(&page_numbers) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(error = %e, "lopdf text extraction failed");
            Ok(String::new())
        }
    }
}

/// Normalise extracted text: drop NULs, collapse runs of spaces, trim lines
/// and remove blank lines.
pub fn clean_text(raw: &str) -> String {
    raw.replace('\0', "")
        .lines()
        .map(|line| HORIZONTAL_SPACE.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
