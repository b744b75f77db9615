//! BM25 lexical index over message content.
//!
//! Each message is tokenized with [`tokenize`] into one document. The index
//! keeps per-document term frequencies and corpus-wide document
//! frequencies, and scores queries with Okapi BM25:
//!
//! ```text
//!                      tf · (k1 + 1)
//! score(d, q) = Σ idf(t) · ───────────────────────────────
//!               t∈q       tf + k1 · (1 − b + b · |d| / avgdl)
//!
//! idf(t) = ln((N − n_t + 0.5) / (n_t + 0.5))
//! ```
//!
//! Terms that appear in more than half the documents get a negative idf;
//! those are floored to `epsilon × mean(idf)` so very common words still
//! carry a small positive weight. Query terms never seen in the corpus
//! contribute nothing.

use std::collections::HashMap;

use serde::Deserialize;

use crate::models::{Corpus, MessageId, SearchMethod, SearchResult};
use crate::rank::top_k_by_score;
use crate::tokenize::tokenize;

/// BM25 free parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    #[serde(default = "default_k1")]
    pub k1: f64,
    /// Length normalization strength in `[0, 1]`.
    #[serde(default = "default_b")]
    pub b: f64,
    /// Floor factor for negative idf values.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_k1() -> f64 {
    1.5
}
fn default_b() -> f64 {
    0.75
}
fn default_epsilon() -> f64 {
    0.25
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            epsilon: default_epsilon(),
        }
    }
}

struct IndexedDoc {
    id: MessageId,
    len: usize,
    term_freqs: HashMap<String, u32>,
}

/// Immutable BM25 index built once from a set of messages.
pub struct Bm25Index {
    docs: Vec<IndexedDoc>,
    idf: HashMap<String, f64>,
    avg_doc_len: f64,
    params: Bm25Params,
}

impl Bm25Index {
    /// Index every message of the corpus.
    pub fn build(corpus: &Corpus, params: Bm25Params) -> Self {
        Self::build_for(corpus, &corpus.ids(), params)
    }

    /// Index only the given messages; statistics cover that subset alone.
    pub fn build_for(corpus: &Corpus, ids: &[MessageId], params: Bm25Params) -> Self {
        let mut docs = Vec::with_capacity(ids.len());
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();
        let mut total_len = 0usize;

        for &id in ids {
            let tokens = tokenize(&corpus.get(id).content);
            total_len += tokens.len();
            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens.iter() {
                *term_freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            docs.push(IndexedDoc {
                id,
                len: tokens.len(),
                term_freqs,
            });
        }

        let n = docs.len() as f64;
        let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freqs.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, df) in doc_freqs {
            let df = df as f64;
            let value = ((n - df + 0.5) / (df + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }
        if !idf.is_empty() {
            let floor = params.epsilon * (idf_sum / idf.len() as f64);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        let avg_doc_len = if docs.is_empty() {
            0.0
        } else {
            total_len as f64 / docs.len() as f64
        };

        tracing::debug!(
            documents = docs.len(),
            vocabulary = idf.len(),
            avg_doc_len,
            "built lexical index"
        );

        Self {
            docs,
            idf,
            avg_doc_len,
            params,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// BM25 score of every indexed document, in index order.
    pub fn scores(&self, query: &str) -> Vec<(MessageId, f64)> {
        let terms = tokenize(query);
        if terms.is_empty() || self.avg_doc_len <= 0.0 {
            return self.docs.iter().map(|d| (d.id, 0.0)).collect();
        }

        let Bm25Params { k1, b, .. } = self.params;
        self.docs
            .iter()
            .map(|doc| {
                let norm = k1 * (1.0 - b + b * doc.len as f64 / self.avg_doc_len);
                let score = terms
                    .iter()
                    .map(|term| {
                        let idf = self.idf.get(term).copied().unwrap_or(0.0);
                        let tf = doc.term_freqs.get(term).copied().unwrap_or(0) as f64;
                        idf * (tf * (k1 + 1.0)) / (tf + norm)
                    })
                    .sum::<f64>();
                (doc.id, score)
            })
            .collect()
    }

    /// Return up to `top_k` documents with a positive score, best first.
    ///
    /// Ties keep index order. A query that tokenizes to nothing yields an
    /// empty list.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        let scored = self
            .scores(query)
            .into_iter()
            .filter(|(_, s)| *s > 0.0)
            .collect();
        top_k_by_score(scored, top_k)
            .into_iter()
            .map(|(id, score)| SearchResult::new(id, score, SearchMethod::Lexical))
            .collect()
    }
}
