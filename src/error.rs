//! Error types for the query path.
//!
//! Capability implementations report failures as [`anyhow::Error`]; the
//! orchestrator classifies them into [`RagError`] so that callers can tell
//! a rejected question apart from an upstream outage.

use thiserror::Error;

/// Errors surfaced by [`RagPipeline::answer_question`](crate::pipeline::RagPipeline::answer_question).
#[derive(Debug, Error)]
pub enum RagError {
    /// The question was empty or whitespace-only.
    #[error("Question is required.")]
    EmptyQuestion,

    /// Embedding the question or searching the vector index failed.
    #[error("Retrieval failed: {0:#}")]
    Retrieval(#[source] anyhow::Error),

    /// The completion call for the answer failed.
    #[error("Answer generation failed: {0:#}")]
    Generation(#[source] anyhow::Error),
}

impl RagError {
    /// True for errors caused by the caller's input rather than an upstream failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RagError::EmptyQuestion)
    }
}

/// A convenience result type for query operations.
pub type Result<T> = std::result::Result<T, RagError>;
