//! # Chat Wrapped
//!
//! Search and conversation-thread extraction over exported chat
//! transcripts.
//!
//! The retrieval and segmentation engine lives in `chat-wrapped-core`;
//! this crate adds everything that touches the outside world.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │ Transcript │──▶│ RetrievalEngine (core)        │──▶│   CLI    │
//! │  (parser)  │   │ BM25 · embeddings · keyword   │   │ (wrapped)│
//! └────────────┘   │ fusion · segment · engagement │   └──────────┘
//!                  └──────────────┬───────────────┘
//!                                 ▼
//!                       ┌──────────────────┐
//!                       │ OpenAI / Ollama  │
//!                       │ embeddings (HTTP)│
//!                       └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wrapped search chat.txt "pizza" --mode hybrid
//! wrapped sender chat.txt "Ann" --query "holiday"
//! wrapped threads chat.txt --top 5 --cache chat.threads.json
//! wrapped similar chat.txt 42
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | HTTP embedding providers |
//! | [`parser`] | WhatsApp export parser |
//! | [`search`] | `search`, `sender` and `similar` commands |
//! | [`threads`] | `threads` command and thread-report cache |

pub mod config;
pub mod embedding;
pub mod parser;
pub mod search;
pub mod threads;
