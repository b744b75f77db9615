//! WhatsApp chat export parser.
//!
//! Each message starts with a header line:
//!
//! ```text
//! [M/D/YY, HH:MM:SS] Name: text
//! [M/D/YYYY, HH:MM] Name: text
//! ```
//!
//! Lines that do not start a message are appended to the previous one with
//! a newline. Lines before the first header are ignored.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use chat_wrapped_core::models::{Corpus, Message};

static RE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(\d{1,2})/(\d{1,2})/(\d{2,4}),\s*(\d{1,2}):(\d{2})(?::(\d{2}))?\]\s*([^:]+):\s*(.*)$")
        .unwrap_or_else(|err| panic!("invalid RE_HEADER regex: {err}"))
});

/// Placeholders WhatsApp writes instead of attachments.
const MEDIA_MARKERS: &[&str] = &[
    "image omitted",
    "video omitted",
    "audio omitted",
    "sticker omitted",
    "document omitted",
    "GIF omitted",
    "Contact card omitted",
];

const EDITED_MARKER: &str = "<This message was edited>";

/// Read and parse a transcript file into a corpus.
pub fn parse_file(path: &Path) -> Result<Corpus> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;
    let messages = parse_transcript(&text)
        .with_context(|| format!("Failed to parse transcript: {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        messages = messages.len(),
        "parsed transcript"
    );
    Ok(Corpus::new(messages))
}

/// Parse transcript text into messages, in file order.
pub fn parse_transcript(text: &str) -> Result<Vec<Message>> {
    let mut messages = Vec::new();
    let mut current: Option<Message> = None;

    for (line_no, line) in text.lines().enumerate() {
        match RE_HEADER.captures(line) {
            Some(caps) => {
                if let Some(done) = current.take() {
                    messages.push(done);
                }

                let timestamp = header_timestamp(&caps)
                    .with_context(|| format!("line {}: invalid timestamp", line_no + 1))?;
                let sender = caps[7].trim();
                let content = caps[8].trim();
                let content = content.strip_prefix('\u{200e}').unwrap_or(content);

                let mut message = Message::new(timestamp, sender, content);
                message.is_media = is_media(content);
                message.is_edited = content.contains(EDITED_MARKER);
                current = Some(message);
            }
            None => {
                if let Some(message) = current.as_mut() {
                    message.content.push('\n');
                    message.content.push_str(line);
                }
            }
        }
    }

    if let Some(done) = current {
        messages.push(done);
    }
    Ok(messages)
}

fn header_timestamp(caps: &regex::Captures<'_>) -> Result<NaiveDateTime> {
    let num = |i: usize| -> Result<u32> {
        caps.get(i)
            .map_or(Ok(0), |m| m.as_str().parse::<u32>())
            .with_context(|| format!("bad number in field {}", i))
    };
    let (month, day, mut year) = (num(1)?, num(2)?, num(3)?);
    if year < 100 {
        year += 2000;
    }
    let (hour, minute, second) = (num(4)?, num(5)?, num(6)?);

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "{}/{}/{} {:02}:{:02}:{:02} is not a valid date and time",
                month,
                day,
                year,
                hour,
                minute,
                second
            )
        })
}

/// Whether `content` is an attachment placeholder.
///
/// Case, punctuation and spacing are ignored, so `‎image omitted` and
/// `<Image omitted>` both match.
pub fn is_media(content: &str) -> bool {
    let squash = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .flat_map(char::to_lowercase)
            .collect()
    };
    let cleaned = squash(content);
    MEDIA_MARKERS.iter().any(|m| cleaned.contains(&squash(m)))
}
