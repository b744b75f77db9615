//! Engagement scoring for conversation segments.
//!
//! Four factors, each clamped to `[0, 1]`:
//!
//! | Factor | Definition | Weight |
//! |--------|------------|--------|
//! | alternation | adjacent pairs with different senders / (n − 1) | 0.4 |
//! | participants | distinct senders / corpus participants | 0.2 |
//! | volume | min(n / 50, 1) | 0.2 |
//! | length | min(mean chars per message / 100, 1) | 0.2 |
//!
//! The weighted sum is the thread's `exchange_score`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{ConversationThread, Corpus, Message};
use crate::segment::Segment;

const ALTERNATION_WEIGHT: f64 = 0.4;
const PARTICIPANT_WEIGHT: f64 = 0.2;
const MESSAGE_WEIGHT: f64 = 0.2;
const LENGTH_WEIGHT: f64 = 0.2;

/// Message count at which the volume factor saturates.
const MESSAGE_SATURATION: f64 = 50.0;
/// Mean message length (chars) at which the length factor saturates.
const LENGTH_SATURATION: f64 = 100.0;

/// Messages sampled from the head of a thread.
const HEAD_SAMPLES: usize = 3;
/// Messages sampled from the middle of a thread.
const MIDDLE_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementFactors {
    pub alternation_ratio: f64,
    pub participant_factor: f64,
    pub message_factor: f64,
    pub length_factor: f64,
}

impl EngagementFactors {
    /// Compute the factors for a chronological run of messages.
    ///
    /// `total_participants` is the number of distinct senders in the whole
    /// corpus; when it is 0 the participant factor is 0.
    pub fn compute(messages: &[&Message], total_participants: usize) -> Self {
        let n = messages.len();
        if n == 0 {
            return Self {
                alternation_ratio: 0.0,
                participant_factor: 0.0,
                message_factor: 0.0,
                length_factor: 0.0,
            };
        }

        let alternation_ratio = alternation_ratio(messages);

        let distinct = messages
            .iter()
            .map(|m| m.sender.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let participant_factor = if total_participants == 0 {
            0.0
        } else {
            distinct as f64 / total_participants as f64
        };

        let message_factor = n as f64 / MESSAGE_SATURATION;

        let total_chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
        let length_factor = (total_chars as f64 / n as f64) / LENGTH_SATURATION;

        Self {
            alternation_ratio: unit(alternation_ratio),
            participant_factor: unit(participant_factor),
            message_factor: unit(message_factor),
            length_factor: unit(length_factor),
        }
    }

    pub fn exchange_score(&self) -> f64 {
        ALTERNATION_WEIGHT * self.alternation_ratio
            + PARTICIPANT_WEIGHT * self.participant_factor
            + MESSAGE_WEIGHT * self.message_factor
            + LENGTH_WEIGHT * self.length_factor
    }
}

fn unit(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Share of adjacent message pairs whose senders differ.
pub fn alternation_ratio(messages: &[&Message]) -> f64 {
    if messages.len() <= 1 {
        return 0.0;
    }
    let changes = messages
        .windows(2)
        .filter(|w| w[0].sender != w[1].sender)
        .count();
    changes as f64 / (messages.len() - 1) as f64
}

/// Representative texts: the first three messages plus two from the
/// midpoint, each cut to `max_chars` characters. A message is sampled at
/// most once.
pub fn sample_messages(messages: &[&Message], max_chars: usize) -> Vec<String> {
    let mid = messages.len() / 2;
    let mut picked: Vec<usize> = (0..HEAD_SAMPLES.min(messages.len())).collect();
    for i in mid..(mid + MIDDLE_SAMPLES).min(messages.len()) {
        if !picked.contains(&i) {
            picked.push(i);
        }
    }
    picked
        .into_iter()
        .map(|i| messages[i].content.chars().take(max_chars).collect())
        .collect()
}

/// Scoring knobs that do not affect the score itself.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScoringOptions {
    /// Character bound for each sampled message.
    #[serde(default = "default_sample_chars")]
    pub sample_chars: usize,
}

fn default_sample_chars() -> usize {
    100
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            sample_chars: default_sample_chars(),
        }
    }
}

/// Turn a segment into a scored [`ConversationThread`].
///
/// # Panics
///
/// Panics if the segment is empty; the segmenter never produces one.
pub fn score_segment(
    corpus: &Corpus,
    segment: &Segment,
    total_participants: usize,
    opts: &ScoringOptions,
) -> ConversationThread {
    assert!(!segment.is_empty(), "cannot score an empty segment");
    let messages: Vec<&Message> = segment.ids.iter().map(|id| corpus.get(*id)).collect();
    let factors = EngagementFactors::compute(&messages, total_participants);

    ConversationThread {
        start_time: messages[0].timestamp,
        end_time: messages[messages.len() - 1].timestamp,
        message_count: messages.len(),
        participants: messages.iter().map(|m| m.sender.clone()).collect(),
        exchange_score: factors.exchange_score(),
        topic_summary: String::new(),
        sample_messages: sample_messages(&messages, opts.sample_chars),
        message_ids: segment.ids.clone(),
    }
}

/// Sort threads by engagement (desc) and keep the best `n`.
///
/// Equal scores keep their incoming (chronological) order.
pub fn rank_threads(mut threads: Vec<ConversationThread>, n: usize) -> Vec<ConversationThread> {
    threads.sort_by(|a, b| b.exchange_score.total_cmp(&a.exchange_score));
    threads.truncate(n);
    threads
}
