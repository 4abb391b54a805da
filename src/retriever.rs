//! Fixed top-k retrieval policy over a [`VectorIndex`].

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::index::VectorIndex;
use crate::models::RetrievedChunk;

/// Wraps the vector index with a fixed result count.
///
/// Results are returned in the index's similarity order, untouched. An
/// empty result is a valid outcome, not an error.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self {
            index,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let mut hits = self.index.search(question, self.top_k).await?;
        // The index is asked for top_k; never pass on more even if it misbehaves.
        hits.truncate(self.top_k);
        debug!(top_k = self.top_k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}
