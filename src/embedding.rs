//! HTTP embedding providers.
//!
//! Implements the core [`EmbeddingProvider`] trait for:
//! - **[`DisabledProvider`]**: fails every call with [`ProviderError::Disabled`].
//! - **[`OpenAIProvider`]**: any OpenAI-compatible `POST {url}/embeddings`
//!   endpoint. Defaults to a local LM Studio server, so no API key is needed;
//!   `OPENAI_API_KEY` is sent as a bearer token when set.
//! - **[`OllamaProvider`]**: a local Ollama instance's `POST {url}/api/embed`.
//!
//! # Retry Strategy
//!
//! - HTTP 429 and 5xx → retry
//! - other HTTP 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, ... capped at 32s, for at most `max_retries` retries
//!
//! Each request is bounded by the client timeout (`timeout_secs`). The core
//! crate's per-call bound is [`EmbeddingConfig::call_timeout`], which leaves
//! room for every retry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use chat_wrapped_core::error::ProviderError;
use chat_wrapped_core::semantic::EmbeddingProvider;

use crate::config::EmbeddingConfig;

const DEFAULT_OPENAI_URL: &str = "http://127.0.0.1:1234/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Build the provider named by `config.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Sleep before retry number `attempt` (1-based): 1s, 2s, 4s, ... capped at 32s.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

// ============ Disabled Provider ============

pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::Disabled)
    }
}

// ============ Shared HTTP plumbing ============

/// Client, retry budget and timeout shared by the HTTP providers.
struct HttpEmbedder {
    client: reqwest::Client,
    max_retries: u32,
    timeout: Duration,
}

impl HttpEmbedder {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
            timeout: config.timeout(),
        })
    }

    /// POST `body` to `url`, retrying transient failures, and return the
    /// decoded JSON of the first successful response.
    async fn post_json(
        &self,
        label: &str,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<Value, ProviderError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                tracing::debug!(provider = label, attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(url).json(body);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response.json::<Value>().await.map_err(|e| {
                            ProviderError::InvalidResponse(format!("{} returned invalid JSON: {}", label, e))
                        });
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = ProviderError::Unavailable(format!("{} API error {}: {}", label, status, body_text));
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) if e.is_timeout() => {
                    last_err = Some(ProviderError::Timeout(self.timeout));
                }
                Err(e) => {
                    last_err = Some(ProviderError::Unavailable(format!(
                        "{} connection error (is it running at {}?): {}",
                        label, url, e
                    )));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ProviderError::Unavailable(format!("{} embedding failed after retries", label))
        }))
    }
}

fn json_vector(value: &Value) -> Result<Vec<f32>, ProviderError> {
    value
        .as_array()
        .ok_or_else(|| ProviderError::InvalidResponse("embedding is not an array".to_string()))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| ProviderError::InvalidResponse("embedding holds a non-number".to_string()))
        })
        .collect()
}

// ============ OpenAI-compatible Provider ============

pub struct OpenAIProvider {
    http: HttpEmbedder,
    model: String,
    dims: usize,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let base = config.url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
        Ok(Self {
            http: HttpEmbedder::new(config)?,
            model,
            dims: config.dims.unwrap_or(0),
            endpoint: format!("{}/embeddings", base.trim_end_matches('/')),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self
            .http
            .post_json("OpenAI", &self.endpoint, self.api_key.as_deref(), &body)
            .await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index` field.
///
/// Items without an `index` keep their position.
pub fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse("missing data array".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| ProviderError::InvalidResponse("missing embedding".to_string()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map_or(position, |i| i as usize);
        indexed.push((index, json_vector(embedding)?));
    }
    indexed.sort_by_key(|(index, _)| *index);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Requires Ollama running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    http: HttpEmbedder,
    model: String,
    dims: usize,
    endpoint: String,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let base = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        Ok(Self {
            http: HttpEmbedder::new(config)?,
            model,
            dims: config.dims.unwrap_or(0),
            endpoint: format!("{}/api/embed", base.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self.http.post_json("Ollama", &self.endpoint, None, &body).await?;
        parse_ollama_response(&json)
    }
}

pub fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>, ProviderError> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse("missing embeddings array".to_string()))?
        .iter()
        .map(json_vector)
        .collect()
}
