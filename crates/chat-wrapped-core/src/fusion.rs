//! Weighted rank fusion of lexical, semantic, and keyword results.
//!
//! # Fusion Algorithm
//!
//! 1. Each method returns its own candidate list (callers ask for
//!    `2 × top_k` so fusion has room to re-rank).
//! 2. Each list is normalized independently by dividing by its maximum
//!    score. Raw match counts and bounded cosine similarities end up on the
//!    same `[0, 1]` scale.
//! 3. Per message: `score = w_lex · lex + w_sem · sem + w_kw · kw`, where a
//!    method the message is absent from contributes 0.
//! 4. Sort by score (desc), corpus position (asc); truncate to `top_k`.
//!
//! Accumulation is keyed by [`MessageId`], so the result does not depend on
//! the order in which the lists are merged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::models::{MessageId, ScoreBreakdown, SearchMethod, SearchResult};
use crate::rank::top_k_by_score;

/// Per-method weights. They need not sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub lexical: f64,
    pub semantic: f64,
    pub keyword: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            lexical: 0.3,
            semantic: 0.5,
            keyword: 0.2,
        }
    }
}

impl FusionWeights {
    pub fn new(lexical: f64, semantic: f64, keyword: f64) -> Self {
        Self {
            lexical,
            semantic,
            keyword,
        }
    }

    /// # Panics
    ///
    /// Panics if any weight is negative or not finite.
    pub fn validate(&self) {
        for (name, w) in [
            ("lexical", self.lexical),
            ("semantic", self.semantic),
            ("keyword", self.keyword),
        ] {
            assert!(
                w.is_finite() && w >= 0.0,
                "{} weight must be a finite non-negative number, got {}",
                name,
                w
            );
        }
    }
}

/// Divide every score by the list maximum.
///
/// Returns an empty map when the list is empty or its maximum is not
/// positive.
pub fn normalize_by_max(results: &[SearchResult]) -> HashMap<MessageId, f64> {
    let max = results
        .iter()
        .map(|r| r.score)
        .fold(f64::NEG_INFINITY, f64::max);
    if results.is_empty() || max <= 0.0 {
        return HashMap::new();
    }
    results.iter().map(|r| (r.id, r.score / max)).collect()
}

/// Fuse the three methods' candidate lists into one ranking.
///
/// Messages whose weighted total is zero are dropped. Every returned result
/// carries its [`ScoreBreakdown`].
pub fn fuse(
    lexical: &[SearchResult],
    semantic: &[SearchResult],
    keyword: &[SearchResult],
    weights: &FusionWeights,
    top_k: usize,
) -> Vec<SearchResult> {
    weights.validate();

    let mut breakdowns: HashMap<MessageId, ScoreBreakdown> = HashMap::new();
    for (id, s) in normalize_by_max(lexical) {
        breakdowns.entry(id).or_default().lexical = s;
    }
    for (id, s) in normalize_by_max(semantic) {
        breakdowns.entry(id).or_default().semantic = s;
    }
    for (id, s) in normalize_by_max(keyword) {
        breakdowns.entry(id).or_default().keyword = s;
    }

    let scored = breakdowns
        .iter()
        .map(|(id, b)| {
            let total =
                weights.lexical * b.lexical + weights.semantic * b.semantic + weights.keyword * b.keyword;
            (*id, total)
        })
        .filter(|(_, total)| *total > 0.0)
        .collect();

    top_k_by_score(scored, top_k)
        .into_iter()
        .map(|(id, score)| SearchResult {
            id,
            score,
            method: SearchMethod::Fused,
            breakdown: breakdowns.get(&id).copied(),
        })
        .collect()
}

/// Whether semantic candidates made it into a hybrid ranking.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticStatus {
    Included,
    /// The provider failed; the ranking uses lexical and keyword only.
    Degraded(ProviderError),
}

/// Outcome of a hybrid search.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridResults {
    pub results: Vec<SearchResult>,
    pub semantic: SemanticStatus,
}

impl HybridResults {
    /// No results, semantic leg counted as included.
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            semantic: SemanticStatus::Included,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.semantic, SemanticStatus::Degraded(_))
    }

    pub fn degradation(&self) -> Option<&ProviderError> {
        match &self.semantic {
            SemanticStatus::Included => None,
            SemanticStatus::Degraded(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(id: usize, score: f64, method: SearchMethod) -> SearchResult {
        SearchResult::new(MessageId(id), score, method)
    }

    fn ids(results: &[SearchResult]) -> Vec<usize> {
        results.iter().map(|r| r.id.0).collect()
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_by_max(&[]).is_empty());
    }

    #[test]
    fn test_normalize_divides_by_max() {
        let list = vec![
            r(0, 4.0, SearchMethod::Keyword),
            r(1, 2.0, SearchMethod::Keyword),
            r(2, 1.0, SearchMethod::Keyword),
        ];
        let norm = normalize_by_max(&list);
        assert!((norm[&MessageId(0)] - 1.0).abs() < 1e-12);
        assert!((norm[&MessageId(1)] - 0.5).abs() < 1e-12);
        assert!((norm[&MessageId(2)] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_non_positive_max_contributes_nothing() {
        let list = vec![r(0, 0.0, SearchMethod::Semantic)];
        assert!(normalize_by_max(&list).is_empty());
    }

    #[test]
    fn test_lexical_only_weights_reproduce_lexical_ranking() {
        let lex = vec![
            r(3, 9.0, SearchMethod::Lexical),
            r(1, 4.0, SearchMethod::Lexical),
            r(7, 1.0, SearchMethod::Lexical),
        ];
        let sem = vec![r(5, 0.9, SearchMethod::Semantic), r(1, 0.8, SearchMethod::Semantic)];
        let kw = vec![r(2, 5.0, SearchMethod::Keyword), r(7, 1.0, SearchMethod::Keyword)];
        let fused = fuse(&lex, &sem, &kw, &FusionWeights::new(1.0, 0.0, 0.0), 3);
        assert_eq!(ids(&fused), ids(&lex));
        assert!(fused.iter().all(|r| r.method == SearchMethod::Fused));
    }

    #[test]
    fn test_merge_order_is_irrelevant() {
        let a = vec![r(0, 3.0, SearchMethod::Lexical), r(1, 1.0, SearchMethod::Lexical)];
        let b = vec![r(1, 0.9, SearchMethod::Semantic), r(2, 0.3, SearchMethod::Semantic)];
        let c = vec![r(2, 2.0, SearchMethod::Keyword), r(0, 1.0, SearchMethod::Keyword)];
        let w = FusionWeights::new(0.4, 0.4, 0.4);
        let forward = fuse(&a, &b, &c, &w, 10);
        let backward = fuse(&c, &b, &a, &FusionWeights::new(0.4, 0.4, 0.4), 10);
        let fwd: Vec<_> = forward.iter().map(|r| (r.id, r.score)).collect();
        let bwd: Vec<_> = backward.iter().map(|r| (r.id, r.score)).collect();
        assert_eq!(fwd, bwd);
    }

    #[test]
    fn test_weighted_sum_and_breakdown() {
        let lex = vec![r(0, 2.0, SearchMethod::Lexical), r(1, 1.0, SearchMethod::Lexical)];
        let sem = vec![r(1, 0.5, SearchMethod::Semantic)];
        let kw = vec![r(1, 3.0, SearchMethod::Keyword)];
        let fused = fuse(&lex, &sem, &kw, &FusionWeights::default(), 10);
        assert_eq!(ids(&fused), vec![1, 0]);
        // 0.3 * 0.5 + 0.5 * 1.0 + 0.2 * 1.0
        assert!((fused[0].score - 0.85).abs() < 1e-12);
        assert!((fused[1].score - 0.3).abs() < 1e-12);
        let b = fused[0].breakdown.unwrap();
        assert!((b.lexical - 0.5).abs() < 1e-12);
        assert!((b.semantic - 1.0).abs() < 1e-12);
        assert!((b.keyword - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ties_break_by_corpus_order() {
        let lex = vec![r(4, 1.0, SearchMethod::Lexical)];
        let kw = vec![r(2, 1.0, SearchMethod::Keyword)];
        let fused = fuse(&lex, &[], &kw, &FusionWeights::new(0.5, 0.0, 0.5), 10);
        assert_eq!(ids(&fused), vec![2, 4]);
    }

    #[test]
    fn test_top_k_truncates() {
        let lex: Vec<_> = (0..10).map(|i| r(i, 10.0 - i as f64, SearchMethod::Lexical)).collect();
        let fused = fuse(&lex, &[], &[], &FusionWeights::default(), 4);
        assert_eq!(ids(&fused), vec![0, 1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "semantic weight")]
    fn test_negative_weight_panics() {
        fuse(&[], &[], &[], &FusionWeights::new(0.3, -0.1, 0.2), 5);
    }
}
