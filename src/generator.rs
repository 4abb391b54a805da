//! Answer generation: question + context + history → answer text.

use anyhow::Result;
use std::sync::Arc;

use crate::llm::{ChatMessage, ChatModel};

/// Fixed instruction that confines the model to the supplied context.
pub const SYSTEM_PROMPT: &str =
    "You are a careful assistant. Use ONLY the provided context. If missing, say you don't know.";

#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Ask the completion model. The reply is returned verbatim.
    ///
    /// An empty `context` is still sent; the system prompt tells the model
    /// to say it does not know.
    pub async fn generate(&self, question: &str, context: &str, chat_history: &str) -> Result<String> {
        let messages = build_messages(question, context, chat_history);
        self.model.complete(&messages).await
    }
}

pub fn build_messages(question: &str, context: &str, chat_history: &str) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
    if !chat_history.is_empty() {
        messages.push(ChatMessage::system(format!(
            "Conversation so far:\n{}",
            chat_history
        )));
    }
    messages.push(ChatMessage::user(format!(
        "Question: {}\n\nContext:\n{}",
        question, context
    )));
    messages
}
