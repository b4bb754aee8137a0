//! watsonx.ai text embeddings

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use studymate_core::{Embedder, EmbeddingSpace, EmbeddingVector, Error, Result};

use crate::client::REQUEST_TIMEOUT;
use crate::config::WatsonxConfig;

const EMBEDDINGS_PATH: &str = "/ml/v1/text/embeddings";
const EMBEDDINGS_VERSION: &str = "2023-10-25";

/// Output width of the embedding models we know about
pub fn known_dimension(model_id: &str) -> Option<usize> {
    match model_id {
        "ibm/slate-125m-english-rtrvr" | "ibm/slate-125m-english-rtrvr-v2" => Some(768),
        "ibm/slate-30m-english-rtrvr" | "ibm/slate-30m-english-rtrvr-v2" => Some(384),
        "sentence-transformers/all-minilm-l6-v2" | "sentence-transformers/all-minilm-l12-v2" => Some(384),
        "intfloat/multilingual-e5-large" => Some(1024),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbeddingsRequest<'a> {
    inputs: &'a [&'a str],
    model_id: &'a str,
    project_id: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    results: Vec<EmbeddingResult>,
}

#[derive(Deserialize)]
struct EmbeddingResult {
    embedding: Vec<f32>,
}

/// Embeds text with a watsonx.ai embedding model
///
/// Obtained from a connected [`crate::WatsonxClient`], so it shares the IAM
/// token and connection pool.
#[derive(Clone)]
pub struct WatsonxEmbedder {
    config: WatsonxConfig,
    client: Client,
    access_token: String,
    space: EmbeddingSpace,
    batch_size: usize,
}

impl WatsonxEmbedder {
    pub const DEFAULT_BATCH_SIZE: usize = 10;

    pub(crate) fn new(config: WatsonxConfig, client: Client, access_token: String, model_id: &str) -> Result<Self> {
        let dimension = known_dimension(model_id).ok_or_else(|| {
            Error::Configuration(format!(
                "unknown output dimension for embedding model '{}'",
                model_id
            ))
        })?;

        Ok(Self {
            config,
            client,
            access_token,
            space: EmbeddingSpace::new(model_id, dimension),
            batch_size: Self::DEFAULT_BATCH_SIZE,
        })
    }

    /// Use a model whose dimension is not in the built-in table
    pub fn with_model(mut self, model_id: impl Into<String>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Configuration("embedding dimension must be at least 1".to_string()));
        }
        self.space = EmbeddingSpace::new(model_id, dimension);
        Ok(self)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub(crate) fn request_body<'a>(&'a self, inputs: &'a [&'a str]) -> EmbeddingsRequest<'a> {
        EmbeddingsRequest {
            inputs,
            model_id: &self.space.model,
            project_id: &self.config.project_id,
        }
    }

    async fn embed_request(&self, inputs: &[&str]) -> Result<Vec<EmbeddingVector>> {
        let url = self.config.endpoint(EMBEDDINGS_PATH, EMBEDDINGS_VERSION)?;

        let response = self
            .client
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&self.request_body(inputs))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Embedding(format!(
                "watsonx.ai embeddings failed with status {}: {}",
                status, error_text
            )));
        }

        let body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("invalid embeddings response: {}", e)))?;

        self.check_vectors(inputs.len(), body.results.into_iter().map(|r| r.embedding).collect())
    }

    fn check_vectors(&self, expected: usize, vectors: Vec<EmbeddingVector>) -> Result<Vec<EmbeddingVector>> {
        if vectors.len() != expected {
            return Err(Error::Embedding(format!(
                "requested {} embeddings, received {}",
                expected,
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.space.dimension) {
            return Err(Error::DimensionMismatch(format!(
                "{} returned a {}-dimensional vector, expected {}",
                self.space.model,
                bad.len(),
                self.space.dimension
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for WatsonxEmbedder {
    fn space(&self) -> EmbeddingSpace {
        self.space.clone()
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(Error::Embedding("cannot embed empty text".to_string()));
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_number, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(batch_number, batch_len = batch.len(), model = %self.space.model, "embedding batch");
            vectors.extend(self.embed_request(batch).await?);
        }
        Ok(vectors)
    }
}
