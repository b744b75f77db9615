//! Core data models used throughout Chat Wrapped.
//!
//! These types represent the messages, search results, and conversation
//! threads that flow through the retrieval and segmentation pipeline.
//! Messages live in a [`Corpus`] arena and are addressed by [`MessageId`]
//! everywhere else, so two messages with identical text stay distinct.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single chat message as produced by a transcript parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Local send time, second precision.
    pub timestamp: NaiveDateTime,
    pub sender: String,
    /// Raw text; may span multiple lines.
    pub content: String,
    pub is_media: bool,
    pub is_edited: bool,
}

impl Message {
    pub fn new(timestamp: NaiveDateTime, sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            timestamp,
            sender: sender.into(),
            content: content.into(),
            is_media: false,
            is_edited: false,
        }
    }
}

/// Stable identity of a message: its position in the [`Corpus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub usize);

impl MessageId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The fixed set of messages under analysis for one run.
///
/// Input order is preserved; it is the tie-breaking order for every ranked
/// list the engine returns.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    messages: Vec<Message>,
}

impl Corpus {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Look up a message by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this corpus.
    pub fn get(&self, id: MessageId) -> &Message {
        &self.messages[id.index()]
    }

    pub fn try_get(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(id.index())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// All ids in corpus order.
    pub fn ids(&self) -> Vec<MessageId> {
        (0..self.messages.len()).map(MessageId).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MessageId, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .map(|(i, m)| (MessageId(i), m))
    }

    /// Ids of one sender's messages, in corpus order.
    pub fn by_sender(&self, sender: &str) -> Vec<MessageId> {
        self.iter()
            .filter(|(_, m)| m.sender == sender)
            .map(|(id, _)| id)
            .collect()
    }

    /// Distinct sender names, sorted.
    pub fn participants(&self) -> Vec<String> {
        self.messages
            .iter()
            .map(|m| m.sender.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Short content fingerprint used to invalidate cached reports.
    ///
    /// Derived from the message count and the first and last timestamps,
    /// hex-encoded and truncated to 12 characters.
    pub fn fingerprint(&self) -> String {
        let first = self
            .messages
            .first()
            .map(|m| m.timestamp.to_string())
            .unwrap_or_default();
        let last = self
            .messages
            .last()
            .map(|m| m.timestamp.to_string())
            .unwrap_or_default();
        let digest = Sha256::digest(format!("{}_{}_{}", self.messages.len(), first, last));
        digest
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>()
            .chars()
            .take(12)
            .collect()
    }
}

/// Which retrieval strategy produced a [`SearchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Lexical,
    Semantic,
    Keyword,
    Fused,
    Filtered,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Lexical => "lexical",
            SearchMethod::Semantic => "semantic",
            SearchMethod::Keyword => "keyword",
            SearchMethod::Fused => "fused",
            SearchMethod::Filtered => "filtered",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ranked hit. Scores are only comparable within one method's list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: MessageId,
    pub score: f64,
    pub method: SearchMethod,
    /// Per-method normalized scores; populated on fused results only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

impl SearchResult {
    pub fn new(id: MessageId, score: f64, method: SearchMethod) -> Self {
        Self {
            id,
            score,
            method,
            breakdown: None,
        }
    }
}

/// Scoring breakdown for a fused result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Normalized lexical score (0.0 if absent from lexical candidates).
    pub lexical: f64,
    /// Normalized semantic score (0.0 if absent or degraded).
    pub semantic: f64,
    /// Normalized keyword score (0.0 if absent from keyword candidates).
    pub keyword: f64,
}

/// A burst of rapid back-and-forth messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationThread {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub message_count: usize,
    pub participants: BTreeSet<String>,
    /// Engagement score in `[0, 1]`.
    pub exchange_score: f64,
    /// Filled in by an external summarizer; empty by default.
    #[serde(default)]
    pub topic_summary: String,
    #[serde(default)]
    pub sample_messages: Vec<String>,
    /// Chronological ids of the thread's messages.
    #[serde(default)]
    pub message_ids: Vec<MessageId>,
}

impl ConversationThread {
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }

    /// Duration in whole minutes, truncated.
    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Resolve the thread's messages against the corpus it came from.
    pub fn messages<'a>(&self, corpus: &'a Corpus) -> Vec<&'a Message> {
        self.message_ids
            .iter()
            .filter_map(|id| corpus.try_get(*id))
            .collect()
    }
}
