//! Typed errors for the embedding boundary and the retriever.

use thiserror::Error;

/// Why an embedding could not be produced.
///
/// Every variant means the same thing to callers: no vector is available.
/// Ingestion stores the item without an embedding and retrieval returns no
/// context.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The provider is switched off in configuration.
    #[error("embedding provider is disabled")]
    Disabled,

    /// Connection failure, timeout, or body read error.
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response did not carry a usable `embedding` array.
    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

/// Usage errors raised at the [`Retriever`](crate::retrieve::Retriever) call boundary.
///
/// Provider outages and empty results are not errors.
#[derive(Debug, Error, PartialEq)]
pub enum RetrievalError {
    #[error("threshold must be a finite value in [0.0, 1.0], got {0}")]
    InvalidThreshold(f32),
}
