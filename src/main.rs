//! # Chat Wrapped CLI (`wrapped`)
//!
//! Search a chat transcript and pull out its liveliest conversations.
//!
//! ## Usage
//!
//! ```bash
//! wrapped --config ./config/wrapped.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wrapped search <transcript> "<query>"` | Rank messages by relevance |
//! | `wrapped sender <transcript> <name>` | One participant's messages, recent or by query |
//! | `wrapped threads <transcript>` | Most engaging conversation threads |
//! | `wrapped similar <transcript> <index>` | Messages semantically close to one message |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `chat_wrapped=info,chat_wrapped_core=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use chat_wrapped::{config, search, threads};

const DEFAULT_LOG_FILTER: &str = "chat_wrapped=info,chat_wrapped_core=info";

/// Chat Wrapped CLI: search and thread extraction for exported chats.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults (embeddings disabled).
#[derive(Parser)]
#[command(
    name = "wrapped",
    about = "Chat Wrapped: search and thread extraction for exported chat transcripts",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wrapped.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search messages.
    ///
    /// `lexical` ranks by BM25, `keyword` by regex match count, `semantic`
    /// by embedding similarity, and `hybrid` fuses all three. Hybrid still
    /// answers when the embedding provider is unavailable.
    Search {
        /// Exported chat transcript.
        transcript: PathBuf,

        /// Query text (a regular expression in keyword mode).
        query: String,

        /// Search mode: `lexical`, `semantic`, `keyword`, or `hybrid`.
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// Show per-method scores for hybrid results.
        #[arg(long)]
        explain: bool,
    },

    /// Show one participant's messages.
    ///
    /// Without `--query`, lists their most recent messages. With it, runs
    /// a hybrid search restricted to their messages.
    Sender {
        transcript: PathBuf,

        /// Sender name as it appears in the transcript.
        name: String,

        #[arg(long)]
        query: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// List the most engaging conversation threads.
    Threads {
        transcript: PathBuf,

        /// Number of threads to show (defaults to `threads.top_n`).
        #[arg(long)]
        top: Option<usize>,

        /// Print threads as JSON.
        #[arg(long)]
        json: bool,

        /// Reuse or write a thread report at this path.
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Ignore an existing cache and re-extract.
        #[arg(long)]
        rebuild: bool,
    },

    /// Find messages similar to a given message.
    Similar {
        transcript: PathBuf,

        /// Zero-based position of the message in the transcript.
        index: usize,

        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Search {
            transcript,
            query,
            mode,
            limit,
            explain,
        } => {
            search::run_search(&cfg, &transcript, &query, &mode, limit, explain).await?;
        }
        Commands::Sender {
            transcript,
            name,
            query,
            limit,
        } => {
            search::run_sender(&cfg, &transcript, &name, query.as_deref(), limit).await?;
        }
        Commands::Threads {
            transcript,
            top,
            json,
            cache,
            rebuild,
        } => {
            threads::run_threads(&cfg, &transcript, top, json, cache.as_deref(), rebuild)?;
        }
        Commands::Similar {
            transcript,
            index,
            limit,
        } => {
            search::run_similar(&cfg, &transcript, index, limit).await?;
        }
    }

    Ok(())
}
