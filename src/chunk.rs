//! Recursive-separator text chunker with fixed overlap.
//!
//! Splits each [`Document`] into [`Chunk`]s of at most `max_chars`
//! characters. Consecutive chunks of the same document share exactly
//! `overlap_chars` characters, so text that spans a split point appears
//! intact in at least one chunk.
//!
//! # Algorithm
//!
//! 1. If the unconsumed text fits in `max_chars`, emit it as the final chunk.
//! 2. Otherwise look for a split point inside the window
//!    `(start + overlap, start + max_chars]`, trying separators from
//!    coarsest to finest: paragraph break (`\n\n`), line break (`\n`),
//!    space. The separator stays attached to the chunk it ends.
//! 3. If no separator occurs in the window, split on the character
//!    boundary at `start + max_chars`.
//! 4. The next chunk starts `overlap_chars` before the split point.
//!
//! Lengths are measured in Unicode scalar values, never bytes, so
//! multi-byte text is never cut mid-character.
//!
//! # Example
//!
//! ```rust
//! use pdf_rag::chunk::Chunker;
//! use pdf_rag::models::Document;
//!
//! let chunker = Chunker::new(1200, 150);
//! let chunks = chunker.chunk(&[Document::new("Hello world.", "a.pdf", Some(1))]);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].metadata.page, Some(1));
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Separators in priority order, coarsest first.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Splits documents into overlapping, bounded-length chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Chunker {
    /// Create a chunker. `overlap_chars` is clamped below `max_chars`;
    /// configuration validation rejects such values before they get here.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            overlap_chars: overlap_chars.min(max_chars - 1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Chunk every document in order. Chunks never cross a document
    /// boundary, and each document's chunks keep source order.
    pub fn chunk(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunk_document(doc))
            .collect()
    }

    /// Chunk a single document. Empty or whitespace-only text yields no chunks.
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        split_text(&doc.text, self.max_chars, self.overlap_chars)
            .into_iter()
            .enumerate()
            .map(|(i, text)| make_chunk(doc, i as i64, text))
            .collect()
    }
}

/// Split `text` into overlapping slices. See the module docs for the rules.
fn split_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<&str> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    // Byte offset of every char, plus the end of the string.
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let n = offsets.len();
    offsets.push(text.len());

    let mut pieces = Vec::new();
    let mut start = 0usize;

    loop {
        if n - start <= max_chars {
            pieces.push(&text[offsets[start]..]);
            break;
        }

        let limit = start + max_chars;
        let end = find_split(text, &offsets, start + overlap_chars, limit).unwrap_or(limit);
        pieces.push(&text[offsets[start]..offsets[end]]);
        start = end - overlap_chars;
    }

    pieces
}

/// Find the char index just past the last, coarsest separator lying fully
/// inside `[lo, hi)` chars. Always returns a value in `(lo, hi]`.
fn find_split(text: &str, offsets: &[usize], lo: usize, hi: usize) -> Option<usize> {
    let window_start = offsets[lo];
    let window = &text[window_start..offsets[hi]];

    SEPARATORS.iter().find_map(|sep| {
        window.rfind(sep).map(|pos| {
            let end_byte = window_start + pos + sep.len();
            // Separators are ASCII, so end_byte is always a char boundary.
            offsets.partition_point(|&o| o < end_byte)
        })
    })
}

/// Create a single [`Chunk`] with a UUID and SHA-256 content hash.
fn make_chunk(doc: &Document, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
        metadata: doc.metadata.clone(),
    }
}
