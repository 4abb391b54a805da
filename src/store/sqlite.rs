//! SQLite-backed [`VectorStore`].
//!
//! Each collection is one table holding chunk text, provenance and the
//! embedding as a little-endian `f32` BLOB. The table is created on the
//! first write. Search loads the collection's vectors and ranks them by
//! cosine similarity, which is adequate for a single-user PDF corpus.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{Chunk, ChunkMetadata};

use super::{check_lengths, ScoredChunk, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    /// Table name; validated to `[A-Za-z0-9_]+` by config loading.
    collection: String,
}

impl SqliteStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn connect(path: &str, collection: &str) -> Result<Self> {
        let db_path = Path::new(path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool, collection))
    }

    pub fn new(pool: SqlitePool, collection: &str) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
        }
    }

    async fn ensure_collection(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                source TEXT NOT NULL,
                page INTEGER,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                hash TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
            self.collection
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n > 0)
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_lengths(chunks, vectors)?;
        self.ensure_collection().await?;

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            sqlx::query(&format!(
                r#"
                INSERT INTO {} (id, source, page, chunk_index, text, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source = excluded.source,
                    page = excluded.page,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    hash = excluded.hash,
                    embedding = excluded.embedding
                "#,
                self.collection
            ))
            .bind(&chunk.id)
            .bind(&chunk.metadata.source)
            .bind(chunk.metadata.page.map(i64::from))
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        if !self.collection_exists().await? {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT id, source, page, chunk_index, text, hash, embedding FROM {} ORDER BY seq",
            self.collection
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut candidates: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let page: Option<i64> = row.get("page");
                ScoredChunk {
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)),
                    chunk: Chunk {
                        id: row.get("id"),
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                        hash: row.get("hash"),
                        metadata: ChunkMetadata {
                            source: row.get("source"),
                            page: page.and_then(|p| u32::try_from(p).ok()),
                        },
                    },
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);

        Ok(candidates)
    }
}
