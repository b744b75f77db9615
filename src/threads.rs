//! `wrapped threads`: extract, rank and print conversation threads.
//!
//! With `--cache PATH` the full (unranked) thread list is saved as a JSON
//! [`ThreadReport`] and reused on later runs while the transcript's
//! fingerprint is unchanged.

use std::path::Path;

use anyhow::{Context, Result};

use chat_wrapped_core::engagement::rank_threads;
use chat_wrapped_core::engine::{RetrievalEngine, ThreadOptions};
use chat_wrapped_core::models::ConversationThread;
use chat_wrapped_core::report::ThreadReport;

use crate::config::Config;
use crate::search::open_engine;

pub fn run_threads(
    config: &Config,
    transcript: &Path,
    top: Option<usize>,
    json: bool,
    cache: Option<&Path>,
    rebuild: bool,
) -> Result<()> {
    let engine = open_engine(config, transcript)?;
    let opts = ThreadOptions {
        top_n: top.unwrap_or(config.threads.top_n),
        ..config.threads
    };

    let report = match cache {
        Some(path) => load_or_compute(&engine, &opts, path, rebuild)?,
        None => ThreadReport::new(engine.corpus(), engine.threads(&opts)),
    };
    let total = report.threads.len();
    let ranked = rank_threads(report.threads, opts.top_n);

    if json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
        return Ok(());
    }

    if ranked.is_empty() {
        println!("No conversation threads found.");
        return Ok(());
    }
    println!("Top {} of {} threads:", ranked.len(), total);
    println!();
    for (i, thread) in ranked.iter().enumerate() {
        print_thread(i + 1, thread);
    }
    Ok(())
}

/// Reuse the report at `path` when it belongs to the engine's corpus;
/// otherwise extract threads and overwrite it.
pub fn load_or_compute(
    engine: &RetrievalEngine,
    opts: &ThreadOptions,
    path: &Path,
    rebuild: bool,
) -> Result<ThreadReport> {
    if !rebuild && path.exists() {
        match load_report(path) {
            Ok(report) if report.is_for(engine.corpus()) => {
                tracing::info!(path = %path.display(), threads = report.threads.len(), "loaded threads from cache");
                return Ok(report);
            }
            Ok(_) => {
                tracing::info!(path = %path.display(), "thread cache is for a different transcript, rebuilding");
            }
            Err(err) => {
                let reason = format!("{:#}", err);
                tracing::warn!(path = %path.display(), error = %reason, "unreadable thread cache, rebuilding");
            }
        }
    }

    let report = ThreadReport::new(engine.corpus(), engine.threads(opts));
    save_report(&report, path)?;
    tracing::info!(path = %path.display(), threads = report.threads.len(), "saved thread cache");
    Ok(report)
}

pub fn load_report(path: &Path) -> Result<ThreadReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read thread cache: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse thread cache: {}", path.display()))
}

pub fn save_report(report: &ThreadReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write thread cache: {}", path.display()))
}

fn print_thread(rank: usize, thread: &ConversationThread) {
    println!(
        "{}. [{:.2}] {} - {} ({} min, {} messages)",
        rank,
        thread.exchange_score,
        thread.start_time.format("%Y-%m-%d %H:%M"),
        thread.end_time.format("%H:%M"),
        thread.duration_minutes(),
        thread.message_count
    );
    println!(
        "    participants: {}",
        thread.participants.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    if !thread.topic_summary.is_empty() {
        println!("    topic: {}", thread.topic_summary);
    }
    for sample in &thread.sample_messages {
        println!("    > {}", sample.replace('\n', " "));
    }
    println!();
}
