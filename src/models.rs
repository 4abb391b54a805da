//! Core data models used throughout the question-answering pipeline.
//!
//! These types represent the parsed documents, chunks, retrieval hits,
//! conversation turns, and answers that flow between ingestion and query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance carried from a parsed document onto every chunk cut from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the source PDF.
    pub source: String,
    /// 1-based page number, when the parser reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Parsed source text plus metadata, produced by the PDF parser.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>, page: Option<u32>) -> Self {
        Self {
            text: text.into(),
            metadata: ChunkMetadata {
                source: source.into(),
                page,
            },
        }
    }
}

/// A contiguous, bounded-length slice of a document's text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    /// Position of this chunk within its document, starting at 0.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    pub metadata: ChunkMetadata,
}

/// A chunk returned by similarity search, in rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// 0 is the most relevant hit.
    pub rank: usize,
}

/// One completed question/answer exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            at: Utc::now(),
        }
    }
}

/// The answer to a single query and the passages it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    /// Metadata of the retrieved chunks in rank order. `None` when the
    /// deployment is configured not to surface sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<ChunkMetadata>>,
}
