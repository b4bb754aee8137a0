//! watsonx.ai configuration

use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

use studymate_core::{Error, Result};

pub const DEFAULT_IAM_URL: &str = "iam.cloud.ibm.com";
pub const DEFAULT_API_URL: &str = "https://us-south.ml.cloud.ibm.com";
pub const DEFAULT_MODEL_ID: &str = "ibm/granite-3-3-8b-instruct";
pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "ibm/slate-125m-english-rtrvr";

/// Configuration for the watsonx.ai backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatsonxConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub project_id: String,
    pub iam_url: String,
    pub api_url: String,
    pub model_id: String,
    pub embedding_model_id: String,
}

impl WatsonxConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let api_key = env::var("WATSONX_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .map_err(|_| {
                Error::Configuration("WATSONX_API_KEY or API_KEY environment variable not found".to_string())
            })?;

        let project_id = env::var("WATSONX_PROJECT_ID")
            .or_else(|_| env::var("PROJECT_ID"))
            .map_err(|_| {
                Error::Configuration("WATSONX_PROJECT_ID or PROJECT_ID environment variable not found".to_string())
            })?;

        let config = Self {
            api_key,
            project_id,
            iam_url: env::var("IAM_IBM_CLOUD_URL").unwrap_or_else(|_| DEFAULT_IAM_URL.to_string()),
            api_url: env::var("WATSONX_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            model_id: env::var("WATSONX_MODEL_ID").unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string()),
            embedding_model_id: env::var("WATSONX_EMBEDDING_MODEL_ID")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL_ID.to_string()),
        };
        config.validate()?;

        Ok(config)
    }

    /// Create configuration with explicit credentials and default endpoints
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            iam_url: DEFAULT_IAM_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            embedding_model_id: DEFAULT_EMBEDDING_MODEL_ID.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Configuration("watsonx API key is empty".to_string()));
        }
        if self.project_id.trim().is_empty() {
            return Err(Error::Configuration("watsonx project id is empty".to_string()));
        }
        self.base_url().map(|_| ())
    }

    fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.api_url)
            .map_err(|e| Error::Configuration(format!("invalid WATSONX_API_URL '{}': {}", self.api_url, e)))?;
        match url.scheme() {
            "https" | "http" => Ok(url),
            other => Err(Error::Configuration(format!(
                "WATSONX_API_URL must be http(s), got scheme '{}'",
                other
            ))),
        }
    }

    /// Absolute URL of an API `path` with a `version` query parameter
    pub fn endpoint(&self, path: &str, version: &str) -> Result<Url> {
        let mut url = self
            .base_url()?
            .join(path)
            .map_err(|e| Error::Configuration(format!("invalid endpoint path '{}': {}", path, e)))?;
        url.query_pairs_mut().append_pair("version", version);
        Ok(url)
    }

    pub fn token_url(&self) -> String {
        format!("https://{}/identity/token", self.iam_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_path_and_version() {
        let config = WatsonxConfig::new("key", "project");
        let url = config.endpoint("/ml/v1/text/embeddings", "2023-10-25").unwrap();
        assert_eq!(
            url.as_str(),
            "https://us-south.ml.cloud.ibm.com/ml/v1/text/embeddings?version=2023-10-25"
        );
    }

    #[test]
    fn test_invalid_api_url_is_rejected() {
        let mut config = WatsonxConfig::new("key", "project");
        config.api_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        config.api_url = "ftp://us-south.ml.cloud.ibm.com".to_string();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_blank_credentials_are_rejected() {
        assert!(WatsonxConfig::new(" ", "project").validate().is_err());
        assert!(WatsonxConfig::new("key", "").validate().is_err());
        assert!(WatsonxConfig::new("key", "project").validate().is_ok());
    }
}
