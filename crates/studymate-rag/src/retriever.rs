//! Question retrieval over a built index

use tracing::debug;

use studymate_core::{Embedder, Error, Result, RetrievalResult, VectorIndex};

/// Embed `question` and return the `k` most similar chunks of `index`
///
/// The embedder must produce the same vector space the index was built in;
/// otherwise the call fails with [`Error::Configuration`] before any
/// embedding work is done. A blank question fails with
/// [`Error::InvalidQuestion`].
pub async fn retrieve<I, E>(question: &str, index: &I, embedder: &E, k: usize) -> Result<RetrievalResult>
where
    I: VectorIndex,
    E: Embedder + ?Sized,
{
    let question = question.trim();
    if question.is_empty() {
        return Err(Error::InvalidQuestion("question must not be empty".to_string()));
    }

    let embedder_space = embedder.space();
    if &embedder_space != index.space() {
        return Err(Error::Configuration(format!(
            "index was built with {} but the question would be embedded with {}",
            index.space(),
            embedder_space
        )));
    }

    if k == 0 {
        return Err(Error::Configuration("k must be at least 1".to_string()));
    }

    let query = embedder.embed(question).await?;
    let result = index.search(&query, k)?;

    debug!(k, hits = result.len(), "retrieved chunks");
    Ok(result)
}
