//! Gap-based conversation segmentation.
//!
//! Messages are ordered by timestamp (stable on ties) and walked once. A new
//! segment starts whenever the gap to the previous message exceeds
//! `max_gap_minutes`. At every boundary, including the end of the stream,
//! the open segment is kept only if it has at least `min_messages`
//! messages. Shorter runs are discarded, including a short run at the very
//! end of the transcript.

use serde::Deserialize;

use crate::models::{Corpus, MessageId};

/// Segmentation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SegmentOptions {
    /// Largest gap, in minutes, that still continues a segment.
    #[serde(default = "default_max_gap_minutes")]
    pub max_gap_minutes: u32,
    /// Smallest message count a segment needs to be kept.
    #[serde(default = "default_min_messages")]
    pub min_messages: usize,
}

fn default_max_gap_minutes() -> u32 {
    5
}
fn default_min_messages() -> usize {
    10
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            max_gap_minutes: default_max_gap_minutes(),
            min_messages: default_min_messages(),
        }
    }
}

/// An unscored run of messages, chronological.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub ids: Vec<MessageId>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Message ids sorted by timestamp; equal timestamps keep corpus order.
pub fn chronological(corpus: &Corpus, ids: &[MessageId]) -> Vec<MessageId> {
    let mut sorted = ids.to_vec();
    sorted.sort_by_key(|id| corpus.get(*id).timestamp);
    sorted
}

/// Split the whole corpus into segments.
pub fn segment(corpus: &Corpus, opts: &SegmentOptions) -> Vec<Segment> {
    segment_ids(corpus, &corpus.ids(), opts)
}

/// Split the given messages into segments, in chronological order.
pub fn segment_ids(corpus: &Corpus, ids: &[MessageId], opts: &SegmentOptions) -> Vec<Segment> {
    let sorted = chronological(corpus, ids);
    let max_gap_secs = i64::from(opts.max_gap_minutes) * 60;

    let mut segments = Vec::new();
    let mut current: Vec<MessageId> = Vec::new();
    let mut dropped = 0usize;

    let mut commit = |run: Vec<MessageId>, segments: &mut Vec<Segment>| {
        if run.is_empty() {
            return;
        }
        if run.len() >= opts.min_messages {
            segments.push(Segment { ids: run });
        } else {
            dropped += 1;
        }
    };

    for id in sorted {
        if let Some(&prev) = current.last() {
            let gap = corpus.get(id).timestamp - corpus.get(prev).timestamp;
            if gap.num_seconds() > max_gap_secs {
                commit(std::mem::take(&mut current), &mut segments);
            }
        }
        current.push(id);
    }
    commit(current, &mut segments);

    tracing::debug!(
        kept = segments.len(),
        dropped,
        max_gap_minutes = opts.max_gap_minutes,
        min_messages = opts.min_messages,
        "segmented messages"
    );
    segments
}
