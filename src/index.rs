//! The vector index: text in, ranked chunks out.
//!
//! [`VectorIndex`] is the interface the retriever and the ingestion
//! pipeline consume. [`EmbeddingIndex`] implements it by pairing an
//! [`Embedder`] with a [`VectorStore`], so callers never see vectors.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::Embedder;
use crate::models::{Chunk, RetrievedChunk};
use crate::store::VectorStore;

/// Similarity search over indexed chunks.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Embed and store chunks. Duplicate upserts are tolerated, not deduplicated.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()>;

    /// Up to `k` chunks ordered by decreasing similarity to `query_text`.
    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// A [`VectorIndex`] that embeds text itself before touching the store.
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }
}

#[async_trait]
impl VectorIndex for EmbeddingIndex {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            anyhow::bail!(
                "embedder {} returned {} vectors for {} chunks",
                self.embedder.model_name(),
                vectors.len(),
                chunks.len()
            );
        }
        self.store.upsert(chunks, &vectors).await
    }

    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query_vec = self.embedder.embed_query(query_text).await?;
        let hits = self.store.search(&query_vec, k).await?;
        debug!(
            backend = self.store.backend(),
            hits = hits.len(),
            "vector search complete"
        );
        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| RetrievedChunk {
                chunk: hit.chunk,
                rank,
            })
            .collect())
    }
}
