//! The query orchestrator.
//!
//! [`RagPipeline::answer_question`] runs one question through the fixed
//! sequence:
//!
//! ```text
//! normalize ─▶ lock session ─▶ load history ─▶ retrieve ─▶ assemble
//!                                                              │
//!            AnswerResult ◀── save turn ◀── generate ◀────────┘
//! ```
//!
//! Any retrieval or generation failure aborts the call before `save`, so
//! the session's memory stays at its previous state. The session lock is
//! held for the whole cycle.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::context;
use crate::embedding::create_embedder;
use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;
use crate::index::{EmbeddingIndex, VectorIndex};
use crate::llm::{ChatModel, OpenAiChatModel};
use crate::models::AnswerResult;
use crate::retriever::Retriever;
use crate::session::SessionStore;
use crate::store::open_store;

/// Trim the question, rejecting empty or whitespace-only input.
pub fn normalize_question(question: &str) -> Result<String> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(RagError::EmptyQuestion);
    }
    Ok(trimmed.to_string())
}

#[derive(Clone)]
pub struct RagPipeline {
    retriever: Retriever,
    generator: AnswerGenerator,
    summarizer: Arc<dyn ChatModel>,
    sessions: Arc<SessionStore>,
    include_sources: bool,
}

impl RagPipeline {
    pub fn new(
        retriever: Retriever,
        generator: AnswerGenerator,
        summarizer: Arc<dyn ChatModel>,
        sessions: Arc<SessionStore>,
        include_sources: bool,
    ) -> Self {
        Self {
            retriever,
            generator,
            summarizer,
            sessions,
            include_sources,
        }
    }

    /// Build the embedding, vector store and completion clients once.
    /// The same chat model answers questions and summarizes history.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let store = open_store(&config.vector_store).await?;
        let index: Arc<dyn VectorIndex> = Arc::new(EmbeddingIndex::new(embedder, store));
        let chat: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(&config.llm)?);

        Ok(Self::new(
            Retriever::new(index, config.retrieval.top_k),
            AnswerGenerator::new(chat.clone()),
            chat,
            Arc::new(SessionStore::new(config.memory.clone())),
            config.retrieval.include_sources,
        ))
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn answer_question(&self, session_id: &str, question: &str) -> Result<AnswerResult> {
        let question = normalize_question(question)?;

        let session = self.sessions.session(session_id);
        let mut memory = session.lock().await;
        let chat_history = memory.load();

        let retrieved = self
            .retriever
            .retrieve(&question)
            .await
            .map_err(RagError::Retrieval)?;
        let context = context::assemble(&retrieved);
        debug!(
            session = session_id,
            chunks = retrieved.len(),
            context_chars = context.len(),
            history_chars = chat_history.len(),
            "prompt assembled"
        );

        let answer = self
            .generator
            .generate(&question, &context, &chat_history)
            .await
            .map_err(RagError::Generation)?;

        memory
            .save(&question, &answer, self.summarizer.as_ref())
            .await;
        info!(
            session = session_id,
            sources = retrieved.len(),
            turns = memory.turn_count(),
            "question answered"
        );

        let sources = self.include_sources.then(|| {
            retrieved
                .into_iter()
                .map(|rc| rc.chunk.metadata)
                .collect()
        });
        Ok(AnswerResult { answer, sources })
    }
}
