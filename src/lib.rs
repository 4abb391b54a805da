//! # PDF RAG
//!
//! Retrieval-augmented question answering over a folder of PDFs, with
//! per-session conversational memory.
//!
//! ## Architecture
//!
//! ```text
//!  ingest                                  query
//! ┌──────┐  ┌─────────┐  ┌───────────┐    ┌───────────┐   ┌───────────┐
//! │ PDFs │─▶│ Chunker │─▶│  Vector   │◀───│ Retriever │◀──│ Pipeline  │◀── CLI / HTTP
//! └──────┘  └─────────┘  │  Index    │    └───────────┘   │           │
//!                        │embed+store│                    │ context   │
//!                        └───────────┘    ┌───────────┐   │ generator │
//!                                         │ Sessions  │◀─▶│ memory    │
//!                                         └───────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag ingest                         # index ./data/pdfs
//! rag ask "What does the manual say about priming?"
//! rag chat                           # multi-turn, with memory
//! rag serve                          # POST /query on 127.0.0.1:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Query error taxonomy |
//! | [`extract`] | PDF discovery and per-page text extraction |
//! | [`chunk`] | Overlapping character-bounded chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat-completion capability |
//! | [`http`] | Shared JSON-over-HTTP retry helper |
//! | [`store`] | Vector storage backends (memory, SQLite, Milvus) |
//! | [`index`] | Embed-and-store vector index |
//! | [`retriever`] | Top-k retrieval policy |
//! | [`context`] | Provenance-tagged context assembly |
//! | [`memory`] | Summarized conversation memory |
//! | [`session`] | Session-keyed memories with per-session locking |
//! | [`generator`] | Context-grounded answer generation |
//! | [`pipeline`] | Query orchestration |
//! | [`ingest`] | Offline ingestion run |
//! | [`server`] | HTTP query server |

pub mod chunk;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generator;
pub mod http;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod memory;
pub mod models;
pub mod pipeline;
pub mod retriever;
pub mod server;
pub mod session;
pub mod store;
