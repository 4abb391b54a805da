//! TOML configuration parsing and validation.
//!
//! All tunables of the pipeline live here: chunk sizes, retrieval depth,
//! memory retention, capability endpoints and the vector store address.
//! Secrets are never read from the file; the file names the environment
//! variables that hold them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1200
}
fn default_overlap_chars() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Whether answers carry the metadata of the retrieved chunks.
    #[serde(default = "default_true")]
    pub include_sources: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            include_sources: true,
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Number of most recent turns kept verbatim before older ones are summarized.
    #[serde(default = "default_retention_turns")]
    pub retention_turns: usize,
    /// Optional budget for the verbatim transcript, in approximate tokens.
    /// `0` disables the budget.
    #[serde(default)]
    pub max_history_tokens: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            retention_turns: default_retention_turns(),
            max_history_tokens: 0,
        }
    }
}

fn default_retention_turns() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for `ollama` or an OpenAI-compatible embeddings server.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
            api_key_env: default_embedding_key_env(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_embedding_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            api_key_env: default_llm_key_env(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_llm_model() -> String {
    "moonshotai/kimi-k2-instruct-0905".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_llm_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Milvus endpoint, or SQLite database path for the `sqlite` backend.
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            uri: default_uri(),
            token_env: default_token_env(),
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "milvus".to_string()
}
fn default_uri() -> String {
    "http://localhost:19530".to_string()
}
fn default_token_env() -> String {
    "MILVUS_TOKEN".to_string()
}
fn default_collection() -> String {
    "pdf_rag_chunks".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            pdf_dir: default_pdf_dir(),
            include_globs: default_include_globs(),
        }
    }
}

fn default_pdf_dir() -> PathBuf {
    PathBuf::from("./data/pdfs")
}
fn default_include_globs() -> Vec<String> {
    vec!["*.pdf".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Upper bound on a single `/query` call, after which it is abandoned.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            anyhow::bail!("chunking.max_chars must be > 0");
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            anyhow::bail!(
                "chunking.overlap_chars ({}) must be < chunking.max_chars ({})",
                self.chunking.overlap_chars,
                self.chunking.max_chars
            );
        }

        if self.retrieval.top_k < 1 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }

        if self.memory.retention_turns < 1 {
            anyhow::bail!("memory.retention_turns must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "local" => {}
            "openai" | "ollama" => {
                if self.embedding.dims.is_none() || self.embedding.dims == Some(0) {
                    anyhow::bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    );
                }
                if self.embedding.model.is_none() {
                    anyhow::bail!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
                other
            ),
        }
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
        }

        match self.vector_store.backend.as_str() {
            "memory" | "sqlite" | "milvus" => {}
            other => anyhow::bail!(
                "Unknown vector store backend: '{}'. Must be memory, sqlite, or milvus.",
                other
            ),
        }
        let collection = &self.vector_store.collection;
        if collection.is_empty()
            || !collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            anyhow::bail!(
                "vector_store.collection '{}' must be non-empty and contain only [A-Za-z0-9_]",
                collection
            );
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Config::from_toml(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.chunking.max_chars, 1200);
        assert_eq!(cfg.chunking.overlap_chars, 150);
        assert_eq!(cfg.retrieval.top_k, 4);
        assert!(cfg.retrieval.include_sources);
        assert_eq!(cfg.vector_store.collection, "pdf_rag_chunks");
        assert_eq!(cfg.llm.api_key_env, "GROQ_API_KEY");
        assert!((cfg.llm.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_overrides() {
        let cfg = Config::from_toml(
            r#"
            [retrieval]
            top_k = 8
            include_sources = false

            [memory]
            retention_turns = 2

            [vector_store]
            backend = "sqlite"
            uri = "/tmp/rag.sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.retrieval.top_k, 8);
        assert!(!cfg.retrieval.include_sources);
        assert_eq!(cfg.memory.retention_turns, 2);
        assert_eq!(cfg.vector_store.backend, "sqlite");
    }

    #[test]
    fn test_rejects_overlap_not_below_max() {
        let err = Config::from_toml("[chunking]\nmax_chars = 100\noverlap_chars = 100\n")
            .unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn test_rejects_zero_top_k_and_retention() {
        assert!(Config::from_toml("[retrieval]\ntop_k = 0\n").is_err());
        assert!(Config::from_toml("[memory]\nretention_turns = 0\n").is_err());
    }

    #[test]
    fn test_remote_embedding_requires_model_and_dims() {
        assert!(Config::from_toml("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(Config::from_toml(
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n"
        )
        .is_ok());
        assert!(Config::from_toml("[embedding]\nprovider = \"bogus\"\n").is_err());
    }

    #[test]
    fn test_rejects_bad_collection_and_backend() {
        assert!(Config::from_toml("[vector_store]\ncollection = \"drop table\"\n").is_err());
        assert!(Config::from_toml("[vector_store]\nbackend = \"faiss\"\n").is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let cfg = Config::from_toml(include_str!("../config/rag.example.toml")).unwrap();
        assert_eq!(cfg.chunking.max_chars, 1200);
        assert_eq!(cfg.vector_store.backend, "milvus");
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
    }
}
