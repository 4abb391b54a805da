//! In-memory [`VectorStore`] for tests and throwaway sessions.
//!
//! Vectors live in a `Vec` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity; ties keep insertion order.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::Chunk;

use super::{check_lengths, ScoredChunk, VectorStore};

struct StoredVector {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Process-local vector store. Contents are lost when the process exits.
pub struct InMemoryStore {
    vectors: RwLock<Vec<StoredVector>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_lengths(chunks, vectors)?;
        let mut stored = self
            .vectors
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            match stored.iter_mut().find(|sv| sv.chunk.id == chunk.id) {
                Some(existing) => {
                    existing.chunk = chunk.clone();
                    existing.vector = vector.clone();
                }
                None => stored.push(StoredVector {
                    chunk: chunk.clone(),
                    vector: vector.clone(),
                }),
            }
        }
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        let stored = self
            .vectors
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        let mut candidates: Vec<ScoredChunk> = stored
            .iter()
            .map(|sv| ScoredChunk {
                chunk: sv.chunk.clone(),
                score: cosine_similarity(query_vec, &sv.vector),
            })
            .collect();
        // Stable sort keeps insertion order among equal scores.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);
        Ok(candidates)
    }
}
