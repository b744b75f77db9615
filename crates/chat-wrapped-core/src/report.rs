//! Extracted-thread report, tagged with the corpus it came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ConversationThread, Corpus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadReport {
    /// [`Corpus::fingerprint`] of the source corpus.
    pub fingerprint: String,
    pub extracted_at: DateTime<Utc>,
    pub threads: Vec<ConversationThread>,
}

impl ThreadReport {
    pub fn new(corpus: &Corpus, threads: Vec<ConversationThread>) -> Self {
        Self {
            fingerprint: corpus.fingerprint(),
            extracted_at: Utc::now(),
            threads,
        }
    }

    /// Whether this report was extracted from `corpus` (by fingerprint).
    pub fn is_for(&self, corpus: &Corpus) -> bool {
        self.fingerprint == corpus.fingerprint()
    }
}
