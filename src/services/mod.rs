//! External service collaborators: ASR and embedding generation.
//!
//! Both are black boxes behind traits. HTTP client implementations talk to
//! OpenAI-compatible endpoints; the mock implementations are deterministic
//! and used by the test suite.

pub mod asr;
pub mod embedding;
pub mod mock;

use thiserror::Error;

pub use asr::{AsrSegment, AsrService, HttpAsrClient};
pub use embedding::{EmbeddingService, HttpEmbeddingClient};
pub use mock::{MockAsr, MockEmbedder};

/// Errors from external service calls (ASR, embedding).
///
/// Timeouts are service failures; the pipeline treats all variants the same
/// way (the affected stage fails or degrades, per its own policy).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service request failed: {0}")]
    Request(String),

    #[error("Service call timed out")]
    Timeout,

    #[error("Unexpected service response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else {
            ServiceError::Request(err.to_string())
        }
    }
}
