//! Milvus [`VectorStore`] over the v2 RESTful API.
//!
//! Works against self-hosted Milvus and Zilliz Cloud. The collection is
//! addressed by `uri` + access token + collection name, and is created
//! with the quick-setup schema (VarChar primary key `id`, float vector
//! `vector`, COSINE metric, dynamic fields for text and provenance) the
//! first time chunks are written.
//!
//! Endpoints used:
//!
//! | Method | Path |
//! |--------|------|
//! | `POST` | `/v2/vectordb/collections/has` |
//! | `POST` | `/v2/vectordb/collections/create` |
//! | `POST` | `/v2/vectordb/entities/upsert` |
//! | `POST` | `/v2/vectordb/entities/search` |

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::VectorStoreConfig;
use crate::http::send_with_retry;
use crate::models::{Chunk, ChunkMetadata};

use super::{check_lengths, ScoredChunk, VectorStore};

const OUTPUT_FIELDS: [&str; 5] = ["text", "source", "page", "chunk_index", "hash"];

pub struct MilvusStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    collection: String,
    /// Set once the collection is known to exist.
    ready: OnceCell<()>,
}

impl MilvusStore {
    /// The token is optional: a local Milvus without auth needs none.
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.is_empty());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.uri.trim_end_matches('/').to_string(),
            token,
            collection: config.collection.clone(),
            ready: OnceCell::new(),
        })
    }

    async fn call(&self, path: &str, body: Value) -> Result<Value> {
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let json = send_with_retry(request, 0, "Milvus").await?;
        check_milvus_code(&json)?;
        Ok(json)
    }

    async fn has_collection(&self) -> Result<bool> {
        let json = self
            .call(
                "/v2/vectordb/collections/has",
                json!({ "collectionName": self.collection }),
            )
            .await?;
        Ok(json
            .pointer("/data/has")
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn ensure_collection(&self, dims: usize) -> Result<()> {
        self.ready
            .get_or_try_init(|| async move {
                if !self.has_collection().await? {
                    info!(
                        collection = %self.collection,
                        dims,
                        "creating Milvus collection"
                    );
                    self.call(
                        "/v2/vectordb/collections/create",
                        json!({
                            "collectionName": self.collection,
                            "dimension": dims,
                            "metricType": "COSINE",
                            "idType": "VarChar",
                            "primaryFieldName": "id",
                            "vectorFieldName": "vector",
                            "params": { "max_length": 64 }
                        }),
                    )
                    .await?;
                }
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MilvusStore {
    fn backend(&self) -> &str {
        "milvus"
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        check_lengths(chunks, vectors)?;
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        self.ensure_collection(first.len()).await?;

        let data: Vec<Value> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| entity_json(chunk, vector))
            .collect();
        self.call(
            "/v2/vectordb/entities/upsert",
            json!({ "collectionName": self.collection, "data": data }),
        )
        .await?;
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        if self.ready.get().is_none() && !self.has_collection().await? {
            return Ok(Vec::new());
        }

        let json = self
            .call(
                "/v2/vectordb/entities/search",
                json!({
                    "collectionName": self.collection,
                    "data": [query_vec],
                    "annsField": "vector",
                    "limit": limit,
                    "outputFields": OUTPUT_FIELDS,
                }),
            )
            .await?;
        parse_search_response(&json)
    }
}

fn entity_json(chunk: &Chunk, vector: &[f32]) -> Value {
    let mut entity = json!({
        "id": chunk.id,
        "vector": vector,
        "text": chunk.text,
        "source": chunk.metadata.source,
        "chunk_index": chunk.chunk_index,
        "hash": chunk.hash,
    });
    if let Some(page) = chunk.metadata.page {
        entity["page"] = json!(page);
    }
    entity
}

/// Milvus REST reports failures as HTTP 200 with a non-zero `code`.
fn check_milvus_code(json: &Value) -> Result<()> {
    match json.get("code").and_then(|c| c.as_i64()) {
        Some(0) | None => Ok(()),
        Some(code) => bail!(
            "Milvus error {}: {}",
            code,
            json.get("message").and_then(|m| m.as_str()).unwrap_or("")
        ),
    }
}

fn parse_search_response(json: &Value) -> Result<Vec<ScoredChunk>> {
    let hits = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Milvus response: missing data array"))?;

    hits.iter()
        .map(|hit| {
            let id = match hit.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => bail!("Invalid Milvus response: hit without id"),
            };
            Ok(ScoredChunk {
                score: hit.get("distance").and_then(|d| d.as_f64()).unwrap_or(0.0) as f32,
                chunk: Chunk {
                    id,
                    chunk_index: hit.get("chunk_index").and_then(|v| v.as_i64()).unwrap_or(0),
                    text: str_field(hit, "text"),
                    hash: str_field(hit, "hash"),
                    metadata: ChunkMetadata {
                        source: str_field(hit, "source"),
                        page: hit
                            .get("page")
                            .and_then(|v| v.as_u64())
                            .and_then(|p| u32::try_from(p).ok()),
                    },
                },
            })
        })
        .collect()
}

fn str_field(hit: &Value, key: &str) -> String {
    hit.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
