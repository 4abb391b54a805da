//! End-to-end query scenarios against in-process fakes: a keyword-count
//! embedder, the in-memory vector store, and a scripted chat model.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pdf_rag::chunk::Chunker;
use pdf_rag::config::MemoryConfig;
use pdf_rag::embedding::Embedder;
use pdf_rag::error::RagError;
use pdf_rag::generator::{AnswerGenerator, SYSTEM_PROMPT};
use pdf_rag::index::{EmbeddingIndex, VectorIndex};
use pdf_rag::ingest::index_documents;
use pdf_rag::llm::{ChatMessage, ChatModel};
use pdf_rag::memory::MemoryPhase;
use pdf_rag::models::{Chunk, Document, RetrievedChunk};
use pdf_rag::pipeline::RagPipeline;
use pdf_rag::retriever::Retriever;
use pdf_rag::session::SessionStore;
use pdf_rag::store::memory::InMemoryStore;

const VOCAB: [&str; 4] = ["pump", "valve", "pressure", "seal"];

struct KeywordEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }
    fn dims(&self) -> usize {
        VOCAB.len()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Answers from the prompt it is given and summarizes by listing the
/// questions it was asked to fold.
struct ScriptedModel {
    answer_prompts: Mutex<Vec<Vec<ChatMessage>>>,
    summary_calls: AtomicUsize,
    fail_answers: AtomicBool,
}

impl ScriptedModel {
    fn new() -> Self {
        Self {
            answer_prompts: Mutex::new(Vec::new()),
            summary_calls: AtomicUsize::new(0),
            fail_answers: AtomicBool::new(false),
        }
    }

    fn calls(&self) -> usize {
        self.answer_prompts.lock().unwrap().len() + self.summary_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let prompt = &messages.last().unwrap().content;

        if messages[0].content != SYSTEM_PROMPT {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            let asked: Vec<&str> = prompt
                .lines()
                .filter_map(|l| l.strip_prefix("Human: "))
                .collect();
            return Ok(format!("Earlier the user asked: {}", asked.join(" | ")));
        }

        self.answer_prompts.lock().unwrap().push(messages.to_vec());
        if self.fail_answers.load(Ordering::SeqCst) {
            anyhow::bail!("completion service unavailable");
        }
        if prompt.ends_with("Context:\n") {
            return Ok("I don't know based on the provided documents.".to_string());
        }
        let question = prompt
            .strip_prefix("Question: ")
            .and_then(|p| p.split("\n\n").next())
            .unwrap_or_default();
        Ok(format!("Answer to: {}", question))
    }
}

/// Delegates to a real index until `failing` is set.
struct SwitchableIndex {
    inner: Arc<dyn VectorIndex>,
    failing: AtomicBool,
}

#[async_trait]
impl VectorIndex for SwitchableIndex {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        self.inner.upsert(chunks).await
    }

    async fn search(&self, query_text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("vector store unreachable");
        }
        self.inner.search(query_text, k).await
    }
}

struct Harness {
    pipeline: RagPipeline,
    embedder: Arc<KeywordEmbedder>,
    model: Arc<ScriptedModel>,
    sessions: Arc<SessionStore>,
}

async fn harness(documents: &[Document], retention_turns: usize) -> Harness {
    let embedder = Arc::new(KeywordEmbedder {
        calls: AtomicUsize::new(0),
    });
    let index: Arc<dyn VectorIndex> = Arc::new(EmbeddingIndex::new(
        embedder.clone(),
        Arc::new(InMemoryStore::new()),
    ));
    index_documents(index.as_ref(), &Chunker::new(200, 20), documents, 16)
        .await
        .unwrap();
    embedder.calls.store(0, Ordering::SeqCst);

    let model = Arc::new(ScriptedModel::new());
    let sessions = Arc::new(SessionStore::new(MemoryConfig {
        retention_turns,
        max_history_tokens: 0,
    }));
    let pipeline = RagPipeline::new(
        Retriever::new(index, 2),
        AnswerGenerator::new(model.clone()),
        model.clone(),
        sessions.clone(),
        true,
    );
    Harness {
        pipeline,
        embedder,
        model,
        sessions,
    }
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "The pump must be primed before start. Pump pressure is 40 psi.",
            "data/pdfs/pump.pdf",
            Some(3),
        ),
        Document::new(
            "Each valve has a seal. Replace the valve seal yearly.",
            "data/pdfs/valve.pdf",
            Some(1),
        ),
    ]
}

fn history_of(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .find(|m| m.content.starts_with("Conversation so far:"))
        .map(|m| m.content.as_str())
}

#[tokio::test]
async fn empty_question_is_rejected_before_any_call() {
    let h = harness(&corpus(), 2).await;

    let err = h.pipeline.answer_question("s", "").await.unwrap_err();
    assert!(matches!(err, RagError::EmptyQuestion));
    assert!(err.is_client_error());
    let err = h.pipeline.answer_question("s", "  \n\t").await.unwrap_err();
    assert!(matches!(err, RagError::EmptyQuestion));

    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.model.calls(), 0);
}

#[tokio::test]
async fn no_matching_chunks_still_generates_with_empty_context() {
    let h = harness(&[], 2).await;

    let result = h
        .pipeline
        .answer_question("s", "What is the pump pressure?")
        .await
        .unwrap();

    assert!(result.answer.contains("I don't know"));
    assert_eq!(result.sources, Some(Vec::new()));
    let prompts = h.model.answer_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0][0].content, SYSTEM_PROMPT);
}

#[tokio::test]
async fn answer_carries_ranked_sources() {
    let h = harness(&corpus(), 2).await;

    let result = h
        .pipeline
        .answer_question("s", "  What pressure does the pump run at?  ")
        .await
        .unwrap();

    assert_eq!(result.answer, "Answer to: What pressure does the pump run at?");
    let sources = result.sources.unwrap();
    assert_eq!(sources[0].source, "data/pdfs/pump.pdf");
    assert_eq!(sources[0].page, Some(3));

    let prompts = h.model.answer_prompts.lock().unwrap();
    let user = &prompts[0].last().unwrap().content;
    assert!(user.contains("[source=data/pdfs/pump.pdf, page=3]\nThe pump must be primed"));
}

#[tokio::test]
async fn second_question_sees_first_turn_verbatim() {
    let h = harness(&corpus(), 3).await;

    h.pipeline
        .answer_question("s", "How often is the valve seal replaced?")
        .await
        .unwrap();
    h.pipeline
        .answer_question("s", "And the pump?")
        .await
        .unwrap();

    let prompts = h.model.answer_prompts.lock().unwrap();
    assert!(history_of(&prompts[0]).is_none());
    let history = history_of(&prompts[1]).unwrap();
    assert!(history.contains(
        "Human: How often is the valve seal replaced?\nAI: Answer to: How often is the valve seal replaced?"
    ));
    assert_eq!(h.model.summary_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oldest_turn_is_summarized_after_retention_overflows() {
    let retention = 3;
    let h = harness(&corpus(), retention).await;

    for i in 1..=retention + 1 {
        h.pipeline
            .answer_question("s", &format!("pump question {}", i))
            .await
            .unwrap();
    }

    let session = h.sessions.session("s");
    let memory = session.lock().await;
    assert_eq!(memory.phase(), MemoryPhase::Summarized);
    assert_eq!(memory.turn_count(), retention);

    let history = memory.load();
    assert!(!history.contains("Human: pump question 1\n"));
    assert!(history.contains("Earlier the user asked: pump question 1"));
    for i in 2..=retention + 1 {
        assert!(history.contains(&format!("Human: pump question {}\n", i)));
    }
    assert_eq!(h.model.summary_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_generation_leaves_memory_unchanged() {
    let h = harness(&corpus(), 2).await;
    h.pipeline
        .answer_question("s", "What about the valve?")
        .await
        .unwrap();

    h.model.fail_answers.store(true, Ordering::SeqCst);
    let err = h
        .pipeline
        .answer_question("s", "And the pump?")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Generation(_)));
    assert!(!err.is_client_error());

    let session = h.sessions.session("s");
    let memory = session.lock().await;
    assert_eq!(memory.turn_count(), 1);
    assert!(!memory.load().contains("And the pump?"));
}

#[tokio::test]
async fn sessions_do_not_share_history() {
    let h = harness(&corpus(), 2).await;

    h.pipeline
        .answer_question("alice", "Tell me about the valve seal")
        .await
        .unwrap();
    h.pipeline
        .answer_question("bob", "Tell me about the pump")
        .await
        .unwrap();

    let prompts = h.model.answer_prompts.lock().unwrap();
    assert!(history_of(&prompts[1]).is_none());
}

#[tokio::test]
async fn concurrent_questions_in_one_session_are_serialized() {
    let h = Arc::new(harness(&corpus(), 10).await);

    let mut handles = Vec::new();
    for i in 0..5 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.pipeline
                .answer_question("shared", &format!("pump question {}", i))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let session = h.sessions.session("shared");
    let memory = session.lock().await;
    assert_eq!(memory.turn_count(), 5);

    // Each call saw exactly the turns completed before it.
    let prompts = h.model.answer_prompts.lock().unwrap();
    let mut seen: Vec<usize> = prompts
        .iter()
        .map(|p| history_of(p).map_or(0, |hist| hist.matches("Human: ").count()))
        .collect();
    seen.sort();
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn failed_retrieval_aborts_without_touching_memory() {
    let embedder = Arc::new(KeywordEmbedder {
        calls: AtomicUsize::new(0),
    });
    let inner: Arc<dyn VectorIndex> = Arc::new(EmbeddingIndex::new(
        embedder,
        Arc::new(InMemoryStore::new()),
    ));
    index_documents(inner.as_ref(), &Chunker::new(200, 20), &corpus(), 16)
        .await
        .unwrap();
    let index = Arc::new(SwitchableIndex {
        inner,
        failing: AtomicBool::new(false),
    });

    let model = Arc::new(ScriptedModel::new());
    let sessions = Arc::new(SessionStore::new(MemoryConfig {
        retention_turns: 2,
        max_history_tokens: 0,
    }));
    let pipeline = RagPipeline::new(
        Retriever::new(index.clone(), 2),
        AnswerGenerator::new(model.clone()),
        model.clone(),
        sessions.clone(),
        true,
    );

    pipeline
        .answer_question("s", "What about the valve?")
        .await
        .unwrap();

    index.failing.store(true, Ordering::SeqCst);
    let err = pipeline
        .answer_question("s", "And the pump?")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Retrieval(_)));
    assert!(!err.is_client_error());

    // Generation was never attempted for the failed question.
    assert_eq!(model.answer_prompts.lock().unwrap().len(), 1);

    let session = sessions.session("s");
    let memory = session.lock().await;
    assert_eq!(memory.turn_count(), 1);
    assert!(!memory.load().contains("And the pump?"));
}
