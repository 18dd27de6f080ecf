use crate::embeddings::{ensure_dimension, EmbedError, Embedder, Embedding, EMBEDDING_DIMENSION};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

const DEFAULT_EMBEDDINGS_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/embedding-001:embedContent";
const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for Gemini API
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// Without a key every embedding call fails, which retrieval treats
    /// like any other embedding outage
    pub api_key: Option<String>,
    pub embeddings_url: String,
    pub model: String,
    pub timeout: Duration,
    pub dimension: usize,
}

impl GeminiConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let embeddings_url = env::var("GEMINI_EMBEDDINGS_URL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDINGS_URL.to_string());
        let model = env::var("GEMINI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
        let timeout_secs = match env::var("GEMINI_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("Invalid GEMINI_TIMEOUT_SECS: {}", raw))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(GeminiConfig {
            api_key,
            embeddings_url,
            model,
            timeout: Duration::from_secs(timeout_secs),
            dimension: EMBEDDING_DIMENSION,
        })
    }

    /// Configuration pointing at an arbitrary endpoint, used against mock servers
    #[cfg(test)]
    pub(crate) fn with_endpoint(api_key: &str, embeddings_url: &str) -> Self {
        GeminiConfig {
            api_key: Some(api_key.to_string()),
            embeddings_url: embeddings_url.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            dimension: EMBEDDING_DIMENSION,
        }
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(GeminiClient { config, client })
    }

    /// Get the client configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Generate embeddings for a text
    pub async fn get_embedding(&self, text: &str) -> Result<Embedding, EmbedError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(EmbedError::MissingApiKey)?;

        let request = EmbeddingRequest {
            model: &self.config.model,
            content: EmbeddingContent {
                parts: vec![Part { text }],
            },
        };

        let response = self
            .client
            .post(&self.config.embeddings_url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EmbedError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response_data: EmbeddingResponse = response.json().await?;
        debug!(
            "Received {}-dimensional embedding from {}",
            response_data.embedding.values.len(),
            self.config.model
        );

        ensure_dimension(
            Embedding::new(response_data.embedding.values),
            self.config.dimension,
        )
    }
}

impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        self.get_embedding(text).await
    }
}

// Request/response structures for the embedContent endpoint

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    content: EmbeddingContent<'a>,
}

#[derive(Serialize)]
struct EmbeddingContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}
