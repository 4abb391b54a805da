//! Vector storage backends.
//!
//! The [`VectorStore`] trait is the storage half of the vector index: it
//! persists chunk vectors with their metadata and answers nearest-neighbour
//! queries. Embedding happens one layer up, in [`crate::index`].
//!
//! | Backend | Module | Notes |
//! |---------|--------|-------|
//! | `memory` | [`memory`] | Process-local, brute-force cosine; tests and demos |
//! | `sqlite` | [`sqlite`] | Single file, brute-force cosine over BLOB vectors |
//! | `milvus` | [`milvus`] | Milvus / Zilliz Cloud via the v2 REST API |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod milvus;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::VectorStoreConfig;
use crate::models::Chunk;

/// A stored chunk together with its similarity to the query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Backend-reported similarity; higher is closer.
    pub score: f32,
}

/// Abstract vector storage.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Store chunks with their vectors, creating the collection if absent |
/// | [`search`](VectorStore::search) | Return up to `limit` chunks by decreasing similarity |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name for logs and error messages.
    fn backend(&self) -> &str;

    /// Store `chunks[i]` with `vectors[i]`. Re-upserting a chunk id
    /// overwrites it; different ids with identical text are kept.
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Nearest-neighbour search. An absent or empty collection yields an
    /// empty result, not an error.
    async fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;
}

/// Open the configured backend.
pub async fn open_store(config: &VectorStoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(memory::InMemoryStore::new())),
        "sqlite" => Ok(Arc::new(
            sqlite::SqliteStore::connect(&config.uri, &config.collection).await?,
        )),
        "milvus" => Ok(Arc::new(milvus::MilvusStore::new(config)?)),
        other => anyhow::bail!("Unknown vector store backend: {}", other),
    }
}

fn check_lengths(chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != vectors.len() {
        anyhow::bail!(
            "upsert got {} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        );
    }
    Ok(())
}
