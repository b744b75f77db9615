//! # Chat Wrapped Core
//!
//! Retrieval and conversation-segmentation engine for Chat Wrapped:
//! data models, tokenizer, BM25 lexical index, embedding trait and
//! semantic index, keyword matcher, rank fusion, gap-based segmenter and
//! engagement scorer.
//!
//! This crate does no file or network I/O. Concrete embedding providers,
//! transcript parsing and configuration live in the `chat-wrapped` crate.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Message`, `Corpus`, `SearchResult`, `ConversationThread` |
//! | [`tokenize`] | Unicode word tokenizer |
//! | [`lexical`] | Okapi BM25 index |
//! | [`semantic`] | `EmbeddingProvider` trait and cosine-similarity index |
//! | [`keyword`] | Regex match counting with literal fallback |
//! | [`fusion`] | Max-normalized weighted fusion |
//! | [`segment`] | Time-gap segmentation |
//! | [`engagement`] | Thread engagement scoring and ranking |
//! | [`engine`] | `RetrievalEngine` tying it together |
//! | [`report`] | Fingerprinted thread report for caching |

pub mod engagement;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod keyword;
pub mod lexical;
pub mod models;
pub mod rank;
pub mod report;
pub mod segment;
pub mod semantic;
pub mod tokenize;

#[cfg(test)]
mod test_utils;
