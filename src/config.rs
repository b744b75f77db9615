//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration with embeddings disabled.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use chat_wrapped_core::engine::{EngineConfig, ThreadOptions};
use chat_wrapped_core::fusion::FusionWeights;
use chat_wrapped_core::lexical::Bm25Params;
use chat_wrapped_core::semantic::EmbedOptions;

use crate::embedding::backoff_delay;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub threads: ThreadOptions,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL; each provider has its own default.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            dims: None,
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_concurrency() -> usize {
    4
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    120
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Upper bound on one provider call, retries included: every attempt
    /// may run to the request timeout, plus the backoff between attempts.
    pub fn call_timeout(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        let backoff: Duration = (1..=self.max_retries).map(backoff_delay).sum();
        self.timeout().saturating_mul(attempts).saturating_add(backoff)
    }

    pub fn embed_options(&self) -> EmbedOptions {
        EmbedOptions {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            timeout: self.call_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,
    #[serde(default)]
    pub bm25: Bm25Params,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
            lexical_weight: default_lexical_weight(),
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            case_insensitive: default_case_insensitive(),
            bm25: Bm25Params::default(),
        }
    }
}

fn default_final_limit() -> usize {
    10
}
fn default_lexical_weight() -> f64 {
    FusionWeights::default().lexical
}
fn default_semantic_weight() -> f64 {
    FusionWeights::default().semantic
}
fn default_keyword_weight() -> f64 {
    FusionWeights::default().keyword
}
fn default_case_insensitive() -> bool {
    true
}

impl RetrievalConfig {
    pub fn weights(&self) -> FusionWeights {
        FusionWeights::new(self.lexical_weight, self.semantic_weight, self.keyword_weight)
    }
}

impl Config {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            weights: self.retrieval.weights(),
            case_insensitive: self.retrieval.case_insensitive,
            bm25: self.retrieval.bm25,
            embed: self.embedding.embed_options(),
        }
    }
}

/// Read and validate the config at `path`. A missing file means defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)?;
    tracing::debug!(path = %path.display(), provider = %config.embedding.provider, "loaded config");
    Ok(config)
}

/// Parse and validate TOML config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Retrieval
    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }
    for (name, w) in [
        ("lexical_weight", config.retrieval.lexical_weight),
        ("semantic_weight", config.retrieval.semantic_weight),
        ("keyword_weight", config.retrieval.keyword_weight),
    ] {
        if !w.is_finite() || w < 0.0 {
            anyhow::bail!("retrieval.{} must be a finite number >= 0.0", name);
        }
    }
    let bm25 = &config.retrieval.bm25;
    if !bm25.k1.is_finite() || bm25.k1 < 0.0 {
        anyhow::bail!("retrieval.bm25.k1 must be >= 0.0");
    }
    if !bm25.epsilon.is_finite() || bm25.epsilon < 0.0 {
        anyhow::bail!("retrieval.bm25.epsilon must be a finite number >= 0.0");
    }
    if !(0.0..=1.0).contains(&bm25.b) {
        anyhow::bail!("retrieval.bm25.b must be in [0.0, 1.0]");
    }

    // Embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.concurrency == 0 {
        anyhow::bail!("embedding.concurrency must be > 0");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() && config.embedding.model.is_none() {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    // Threads
    if config.threads.min_messages == 0 {
        anyhow::bail!("threads.min_messages must be >= 1");
    }

    Ok(())
}
