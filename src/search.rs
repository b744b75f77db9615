//! `wrapped search`, `wrapped sender` and `wrapped similar`.
//!
//! Each command parses the transcript, builds a [`RetrievalEngine`] from the
//! config, runs one query and prints ranked messages to stdout.

use std::path::Path;

use anyhow::{bail, Result};

use chat_wrapped_core::engine::RetrievalEngine;
use chat_wrapped_core::fusion::HybridResults;
use chat_wrapped_core::models::{Corpus, MessageId, SearchResult};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::parser::parse_file;

const EXCERPT_CHARS: usize = 200;

/// Parse `transcript` and build an engine over it.
pub fn open_engine(config: &Config, transcript: &Path) -> Result<RetrievalEngine> {
    let corpus = parse_file(transcript)?;
    let provider = create_provider(&config.embedding)?;
    Ok(RetrievalEngine::new(corpus, provider, config.engine_config()))
}

pub async fn run_search(
    config: &Config,
    transcript: &Path,
    query: &str,
    mode: &str,
    limit: Option<usize>,
    explain: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    match mode {
        "lexical" | "semantic" | "keyword" | "hybrid" => {}
        _ => bail!(
            "Unknown search mode: {}. Use lexical, semantic, keyword, or hybrid.",
            mode
        ),
    }

    let engine = open_engine(config, transcript)?;
    let final_limit = limit.unwrap_or(config.retrieval.final_limit);

    let results = match mode {
        "lexical" => engine.search_lexical(query, final_limit),
        "keyword" => engine.search_keyword(query, config.retrieval.case_insensitive, final_limit),
        "semantic" => engine.search_semantic(query, final_limit).await?,
        _ => unwrap_hybrid(engine.search_hybrid(query, final_limit).await),
    };

    print_results(engine.corpus(), &results, explain);
    Ok(())
}

pub async fn run_sender(
    config: &Config,
    transcript: &Path,
    sender: &str,
    query: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let engine = open_engine(config, transcript)?;
    if engine.corpus().by_sender(sender).is_empty() {
        bail!(
            "No messages from '{}'. Participants: {}",
            sender,
            engine.corpus().participants().join(", ")
        );
    }
    let final_limit = limit.unwrap_or(config.retrieval.final_limit);

    let results = match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => unwrap_hybrid(engine.search_by_sender(sender, q, final_limit).await),
        None => engine.recent_by_sender(sender, final_limit),
    };

    print_results(engine.corpus(), &results, false);
    Ok(())
}

pub async fn run_similar(
    config: &Config,
    transcript: &Path,
    index: usize,
    limit: Option<usize>,
) -> Result<()> {
    let engine = open_engine(config, transcript)?;
    let id = MessageId(index);
    let Some(reference) = engine.corpus().try_get(id) else {
        bail!(
            "Message index {} out of range (transcript has {} messages)",
            index,
            engine.corpus().len()
        );
    };
    println!("Similar to {} {}: \"{}\"", id, reference.sender, excerpt(&reference.content));
    println!();

    let final_limit = limit.unwrap_or(config.retrieval.final_limit);
    let results = engine.find_similar(id, final_limit).await?;
    print_results(engine.corpus(), &results, false);
    Ok(())
}

/// Report a degraded hybrid search on stderr and keep its results.
fn unwrap_hybrid(hybrid: HybridResults) -> Vec<SearchResult> {
    if let Some(err) = hybrid.degradation() {
        eprintln!("Warning: semantic search unavailable ({}); showing lexical and keyword matches only.", err);
    }
    hybrid.results
}

fn excerpt(content: &str) -> String {
    let flat = content.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() > EXCERPT_CHARS {
        let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat.to_string()
    }
}

fn print_results(corpus: &Corpus, results: &[SearchResult], explain: bool) {
    if results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        let message = corpus.get(result.id);
        println!(
            "{}. [{:.2}] {} {} ({}, {})",
            i + 1,
            result.score,
            message.timestamp.format("%Y-%m-%d %H:%M"),
            message.sender,
            result.method,
            result.id
        );
        println!("    \"{}\"", excerpt(&message.content));
        if explain {
            if let Some(b) = result.breakdown {
                println!(
                    "    lexical: {:.2}  semantic: {:.2}  keyword: {:.2}",
                    b.lexical, b.semantic, b.keyword
                );
            }
        }
        println!();
    }
}
