//! Embedding provider trait and the semantic (vector) index.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, the batching helpers that call it under a timeout, and
//! [`SemanticIndex`], a built-once table of message vectors keyed by
//! [`MessageId`].
//!
//! A `SemanticIndex` value only exists once every message has been
//! embedded, so semantic search can never run against a half-built cache.
//! Lazy construction (build on first use, share afterwards) is the
//! engine's job; see [`crate::engine`].
//!
//! Concrete providers (OpenAI-compatible HTTP, Ollama) live in the
//! `chat-wrapped` app crate.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::ProviderError;
use crate::models::{Corpus, MessageId, SearchMethod, SearchResult};
use crate::rank::top_k_by_score;

/// Trait for embedding providers.
///
/// `embed` must return exactly one vector per input text, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-nomic-embed-text-v1.5"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality, or 0 if unknown.
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// How the index talks to its provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbedOptions {
    /// Texts per provider call.
    pub batch_size: usize,
    /// Provider calls in flight at once while building.
    pub concurrency: usize,
    /// Upper bound on a single provider call.
    pub timeout: Duration,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            concurrency: 4,
            timeout: Duration::from_secs(120),
        }
    }
}

impl EmbedOptions {
    /// # Panics
    ///
    /// Panics if `batch_size` or `concurrency` is zero.
    pub fn validate(&self) {
        assert!(self.batch_size > 0, "embedding batch_size must be > 0");
        assert!(self.concurrency > 0, "embedding concurrency must be > 0");
    }
}

/// One provider call, bounded by `timeout` and checked for arity.
pub async fn embed_with_timeout(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    timeout: Duration,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let vectors = tokio::time::timeout(timeout, provider.embed(texts))
        .await
        .map_err(|_| ProviderError::Timeout(timeout))??;
    if vectors.len() != texts.len() {
        return Err(ProviderError::InvalidResponse(format!(
            "expected {} vectors, got {}",
            texts.len(),
            vectors.len()
        )));
    }
    Ok(vectors)
}

/// Embed `texts` in batches, several batches in flight, preserving order.
pub async fn embed_batched(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    opts: &EmbedOptions,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    opts.validate();
    let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(opts.batch_size))
        .map(|batch| embed_with_timeout(provider, batch, opts.timeout))
        .buffered(opts.concurrency)
        .try_collect()
        .await?;
    Ok(batches.into_iter().flatten().collect())
}

/// Embed a single text.
pub async fn embed_one(
    provider: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>, ProviderError> {
    let mut vectors = embed_with_timeout(provider, &[text.to_string()], timeout).await?;
    vectors
        .pop()
        .ok_or_else(|| ProviderError::InvalidResponse("empty embedding response".to_string()))
}

/// Cosine of the angle between `a` and `b`, clamped to `[-1, 1]`.
///
/// Mismatched lengths, empty input and zero-norm vectors all give `0.0`,
/// so a degenerate vector is never "similar" to anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, aa, bb) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, aa, bb), (x, y)| {
            (dot + x * y, aa + x * x, bb + y * y)
        });
    let norms = (aa * bb).sqrt();
    if norms < f32::EPSILON {
        return 0.0;
    }
    (dot / norms).clamp(-1.0, 1.0)
}

/// Message vectors for a whole corpus, indexed by [`MessageId`].
#[derive(Debug, Clone)]
pub struct SemanticIndex {
    vectors: Vec<Vec<f32>>,
    model: String,
}

impl SemanticIndex {
    /// Embed every message of `corpus`, in corpus order.
    pub async fn build(
        corpus: &Corpus,
        provider: &dyn EmbeddingProvider,
        opts: &EmbedOptions,
    ) -> Result<Self, ProviderError> {
        let texts: Vec<String> = corpus.messages().iter().map(|m| m.content.clone()).collect();
        let vectors = embed_batched(provider, &texts, opts).await?;
        let declared = provider.dims();
        let dims = vectors.first().map_or(declared, Vec::len);
        if vectors.iter().any(|v| v.len() != dims) {
            return Err(ProviderError::InvalidResponse(
                "embedding vectors differ in length".to_string(),
            ));
        }
        if declared != 0 && dims != declared {
            return Err(ProviderError::InvalidResponse(format!(
                "{} returned {}-dimensional vectors, expected {}",
                provider.model_name(),
                dims,
                declared
            )));
        }
        tracing::debug!(
            messages = vectors.len(),
            dims,
            model = provider.model_name(),
            "built semantic index"
        );
        Ok(Self {
            vectors,
            model: provider.model_name().to_string(),
        })
    }

    /// Wrap precomputed vectors; `vectors[i]` belongs to `MessageId(i)`.
    pub fn from_vectors(model: impl Into<String>, vectors: Vec<Vec<f32>>) -> Self {
        Self {
            vectors,
            model: model.into(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vector(&self, id: MessageId) -> Option<&[f32]> {
        self.vectors.get(id.index()).map(Vec::as_slice)
    }

    /// Rank `ids` by similarity to `query_vec`, keeping positive scores only.
    pub fn rank(&self, query_vec: &[f32], ids: &[MessageId], top_k: usize) -> Vec<SearchResult> {
        let scored = ids
            .iter()
            .filter_map(|&id| {
                let v = self.vector(id)?;
                let sim = cosine_similarity(query_vec, v) as f64;
                (sim > 0.0).then_some((id, sim))
            })
            .collect();
        top_k_by_score(scored, top_k)
            .into_iter()
            .map(|(id, score)| SearchResult::new(id, score, SearchMethod::Semantic))
            .collect()
    }

    /// Embed `query` and rank every indexed message against it.
    pub async fn search(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        top_k: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_one(provider, query, timeout).await?;
        let ids: Vec<MessageId> = (0..self.vectors.len()).map(MessageId).collect();
        Ok(self.rank(&query_vec, &ids, top_k))
    }
}
