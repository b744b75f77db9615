//! Error types for chat-wrapped-core.
//!
//! Only the embedding boundary can fail. Lexical and keyword search,
//! segmentation and scoring are total functions over the corpus.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by an embedding provider or by the semantic index while
/// talking to one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// No provider is configured.
    #[error("embedding provider is disabled")]
    Disabled,
    /// The provider could not be reached or rejected the request.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
    /// The provider did not answer within the configured bound.
    #[error("embedding provider timed out after {0:?}")]
    Timeout(Duration),
    /// The provider answered with something that is not one vector per input.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// True for failures where retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_) | ProviderError::Timeout(_))
    }
}
