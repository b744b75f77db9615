//! Test utilities for chat-wrapped-core.
//!
//! Corpus builders and deterministic in-memory embedding providers.
//! Only compiled when running tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::ProviderError;
use crate::models::{Corpus, Message};
use crate::semantic::EmbeddingProvider;
use crate::tokenize::tokenize;

const DIMS: usize = 64;

pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn at_minute(minute: i64) -> NaiveDateTime {
    base_time() + chrono::Duration::minutes(minute)
}

/// One message per text, one minute apart, all from "A".
pub fn corpus_of(texts: &[&str]) -> Corpus {
    Corpus::new(
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Message::new(at_minute(i as i64), "A", *t))
            .collect(),
    )
}

/// Messages from `(minute, sender, text)` triples, in the given order.
pub fn corpus_at(rows: &[(i64, &str, &str)]) -> Corpus {
    Corpus::new(
        rows.iter()
            .map(|(m, s, t)| Message::new(at_minute(*m), *s, *t))
            .collect(),
    )
}

/// Bag-of-words embeddings: one dimension per distinct token, assigned on
/// first sight. Identical texts always get identical vectors.
pub struct BagOfWordsProvider {
    vocab: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
}

impl BagOfWordsProvider {
    pub fn new() -> Self {
        Self {
            vocab: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vocab = self.vocab.lock().unwrap();
        let mut v = vec![0.0f32; DIMS];
        for token in tokenize(text) {
            let next = vocab.len();
            let slot = *vocab.entry(token).or_insert(next);
            assert!(slot < DIMS, "test vocabulary exceeded {} words", DIMS);
            v[slot] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsProvider {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Always unreachable.
pub struct FailingProvider;

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::Unavailable("connection refused".to_string()))
    }
}

/// Sleeps before answering with zero vectors.
pub struct SlowProvider {
    delay: Duration,
}

impl SlowProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl EmbeddingProvider for SlowProvider {
    fn model_name(&self) -> &str {
        "slow"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(texts.iter().map(|_| vec![0.0; DIMS]).collect())
    }
}
