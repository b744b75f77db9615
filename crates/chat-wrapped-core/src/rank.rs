//! Shared ranking helpers.

use std::cmp::Ordering;

use crate::models::MessageId;

/// Order by score (desc), then corpus position (asc).
pub fn by_score_then_corpus_order(a: &(MessageId, f64), b: &(MessageId, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Sort `scored` best-first and keep the first `top_k`.
///
/// Ties are broken by corpus position, so the output does not depend on
/// the order of the input.
pub fn top_k_by_score(mut scored: Vec<(MessageId, f64)>, top_k: usize) -> Vec<(MessageId, f64)> {
    scored.sort_by(by_score_then_corpus_order);
    scored.truncate(top_k);
    scored
}
