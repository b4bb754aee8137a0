//! watsonx.ai Granite answer generation

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use studymate_core::{Error, GenerationConfig, Generator, Result};

use crate::config::WatsonxConfig;
use crate::embeddings::WatsonxEmbedder;

const GENERATION_PATH: &str = "/ml/v1/text/generation_stream";
const GENERATION_VERSION: &str = "2023-05-29";

/// Bound for the non-streaming calls; generation is bounded by `GenerationConfig.timeout`
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// watsonx.ai client answering questions with a Granite model
///
/// Call [`WatsonxClient::connect`] once to exchange the API key for an IAM
/// token before generating.
pub struct WatsonxClient {
    config: WatsonxConfig,
    access_token: Option<String>,
    client: Client,
    generation: GenerationConfig,
}

#[derive(Serialize)]
struct TokenRequest {
    grant_type: String,
    apikey: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerationParams {
    decoding_method: String,
    max_new_tokens: u32,
    min_new_tokens: u32,
    top_k: u32,
    top_p: f32,
    repetition_penalty: f32,
    stop_sequences: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerationRequest {
    input: String,
    parameters: GenerationParams,
    model_id: String,
    project_id: String,
}

#[derive(Deserialize)]
struct GenerationResults {
    generated_text: String,
}

#[derive(Deserialize)]
struct GenerationData {
    results: Vec<GenerationResults>,
}

impl WatsonxClient {
    pub const GRANITE_3_3_8B_INSTRUCT: &'static str = "ibm/granite-3-3-8b-instruct";
    pub const GRANITE_4_H_SMALL: &'static str = "ibm/granite-4-h-small";

    /// Create a new client from configuration
    pub fn new(config: WatsonxConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        let generation = GenerationConfig {
            model_id: config.model_id.clone(),
            ..Default::default()
        };

        Ok(Self {
            config,
            access_token: None,
            client,
            generation,
        })
    }

    /// Create a new client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(WatsonxConfig::from_env()?)
    }

    /// Set the default model used when a request carries no model hint
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.generation.model_id = model_id.into();
        self
    }

    /// Replace the generation parameters; `model_id` becomes the default model
    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn config(&self) -> &WatsonxConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.access_token.is_some()
    }

    /// Exchange the API key for an IAM access token
    pub async fn connect(&mut self) -> Result<()> {
        let token_request = TokenRequest {
            grant_type: "urn:ibm:params:oauth:grant-type:apikey".to_string(),
            apikey: self.config.api_key.clone(),
        };

        let response = self
            .client
            .post(self.config.token_url())
            .timeout(REQUEST_TIMEOUT)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&token_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Authentication(format!(
                "IAM token request failed: {}",
                response.status()
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Serialization(e.to_string()))?;

        debug!(iam_url = %self.config.iam_url, "obtained IAM access token");
        self.access_token = Some(token_response.access_token);

        Ok(())
    }

    /// An embedder sharing this client's credentials and HTTP connection pool
    pub fn embedder(&self) -> Result<WatsonxEmbedder> {
        let token = self.token()?;
        WatsonxEmbedder::new(
            self.config.clone(),
            self.client.clone(),
            token.to_string(),
            &self.config.embedding_model_id,
        )
    }

    fn token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .ok_or_else(|| Error::Authentication("Not authenticated. Call connect() first.".to_string()))
    }

    pub(crate) fn request_body(&self, prompt: &str, model_id: &str) -> GenerationRequest {
        let config = &self.generation;
        GenerationRequest {
            input: prompt.to_string(),
            parameters: GenerationParams {
                decoding_method: "greedy".to_string(),
                max_new_tokens: config.max_tokens,
                min_new_tokens: 5,
                top_k: config.top_k.unwrap_or(50),
                top_p: config.top_p.unwrap_or(1.0),
                repetition_penalty: 1.1,
                stop_sequences: config.stop_sequences.clone(),
            },
            model_id: model_id.to_string(),
            project_id: self.config.project_id.clone(),
        }
    }

    async fn perform_generation(&self, prompt: &str, model_id: &str) -> Result<String> {
        let access_token = self.token()?;
        let url = self.config.endpoint(GENERATION_PATH, GENERATION_VERSION)?;

        let response = self
            .client
            .post(url)
            .header("Accept", "text/event-stream")
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&self.request_body(prompt, model_id))
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Generation(format!(
                "watsonx.ai generation failed with status {}: {}",
                status, error_text
            )));
        }

        let mut decoder = EventStreamDecoder::default();
        let mut stream = response.bytes_stream();
        while let Some(bytes) = stream.next().await {
            let bytes = bytes.map_err(|e| Error::Network(e.to_string()))?;
            decoder.feed(&bytes);
        }
        let answer = decoder.finish();

        let cleaned = clean_answer(&answer);
        if cleaned.is_empty() {
            return Err(Error::Generation(format!(
                "empty response from watsonx.ai model {}",
                model_id
            )));
        }

        Ok(cleaned)
    }
}

#[async_trait]
impl Generator for WatsonxClient {
    async fn generate(&self, context: &str, question: &str, model_hint: Option<&str>) -> Result<String> {
        let model_id = model_hint.unwrap_or(&self.generation.model_id);
        let prompt = build_prompt(context, question);
        debug!(model_id, prompt_len = prompt.len(), "requesting generation");

        match timeout(self.generation.timeout, self.perform_generation(&prompt, model_id)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Generation(format!(
                "watsonx.ai did not answer within {}s",
                self.generation.timeout.as_secs()
            ))),
        }
    }

    fn model_id(&self) -> &str {
        &self.generation.model_id
    }
}

/// Prompt asking the model to answer from the retrieved passages only
pub fn build_prompt(context: &str, question: &str) -> String {
    let context = context.trim();
    let context = if context.is_empty() {
        "No relevant passages were found in the document. Say that the document does not cover this question."
    } else {
        context
    };

    format!(
        "Answer the question using only the context below.\n\nContext: {}\n\nQuestion: {}\n\nAnswer:",
        context,
        question.trim()
    )
}

/// Strip the echoed `Answer:` label and surrounding whitespace
pub fn clean_answer(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("Answer:")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Accumulates `generated_text` from a server-sent event stream
///
/// Chunks may split lines, and UTF-8 characters, anywhere; only complete
/// lines are decoded and parsed.
#[derive(Debug, Default)]
pub(crate) struct EventStreamDecoder {
    pending: Vec<u8>,
    text: String,
}

impl EventStreamDecoder {
    pub(crate) fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            self.consume_bytes(&line);
        }
    }

    pub(crate) fn finish(mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        self.consume_bytes(&rest);
        self.text
    }

    fn consume_bytes(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        self.consume_line(line.trim_end_matches(['\r', '\n']));
    }

    fn consume_line(&mut self, line: &str) {
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return;
        }

        match serde_json::from_str::<GenerationData>(data) {
            Ok(parsed) => {
                if let Some(result) = parsed.results.first() {
                    self.text.push_str(&result.generated_text);
                }
            }
            Err(e) => warn!(error = %e, "skipping unparseable event"),
        }
    }
}
