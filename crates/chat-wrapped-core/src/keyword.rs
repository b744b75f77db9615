//! Grep-style pattern matching over message content.
//!
//! Patterns are compiled as regular expressions. A pattern that does not
//! compile is escaped and matched literally instead, so malformed input
//! degrades to substring search and never surfaces as an error.

use regex::{Regex, RegexBuilder};

use crate::models::{Corpus, MessageId, SearchMethod, SearchResult};
use crate::rank::top_k_by_score;

/// Compile `pattern`, falling back to a literal match on syntax errors.
///
/// Returns `None` only when even the escaped pattern exceeds the regex
/// size limit; such a pattern matches nothing.
pub fn compile_pattern(pattern: &str, case_insensitive: bool) -> Option<Regex> {
    let build = |p: &str| {
        RegexBuilder::new(p)
            .case_insensitive(case_insensitive)
            .build()
    };
    match build(pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::debug!(pattern, error = %err, "invalid pattern, matching literally");
            build(&regex::escape(pattern)).ok()
        }
    }
}

/// Stateless matcher over a corpus.
pub struct KeywordMatcher<'a> {
    corpus: &'a Corpus,
}

impl<'a> KeywordMatcher<'a> {
    pub fn new(corpus: &'a Corpus) -> Self {
        Self { corpus }
    }

    /// Score every message by its number of non-overlapping matches.
    ///
    /// Messages with no match are left out; the rest are ranked by count
    /// with corpus order breaking ties.
    pub fn search(&self, pattern: &str, case_insensitive: bool, top_k: usize) -> Vec<SearchResult> {
        self.search_within(&self.corpus.ids(), pattern, case_insensitive, top_k)
    }

    /// Like [`search`](Self::search), restricted to `ids`.
    pub fn search_within(
        &self,
        ids: &[MessageId],
        pattern: &str,
        case_insensitive: bool,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let Some(re) = compile_pattern(pattern, case_insensitive) else {
            return Vec::new();
        };
        let scored = ids
            .iter()
            .filter_map(|&id| {
                let count = re.find_iter(&self.corpus.get(id).content).count();
                (count > 0).then_some((id, count as f64))
            })
            .collect();
        top_k_by_score(scored, top_k)
            .into_iter()
            .map(|(id, score)| SearchResult::new(id, score, SearchMethod::Keyword))
            .collect()
    }
}
