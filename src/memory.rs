//! Summarized conversation memory.
//!
//! A [`ConversationMemory`] holds a free-text summary of older turns plus
//! the most recent turns verbatim. It moves through three phases:
//!
//! | Phase | Meaning | `load()` |
//! |-------|---------|----------|
//! | [`MemoryPhase::Empty`] | nothing recorded yet | `""` |
//! | [`MemoryPhase::Accumulating`] | verbatim turns only | transcript |
//! | [`MemoryPhase::Summarized`] | summary + up to `retention_turns` verbatim turns | summary, then transcript |
//!
//! When a [`save`](ConversationMemory::save) pushes the turn count past
//! `retention_turns` (or the verbatim transcript past the optional token
//! budget), the oldest turns are folded into the summary by the completion
//! model. Their verbatim text is then discarded for good.
//!
//! # Lossy by construction
//!
//! Summarization bounds what is sent to the model on every query, at the
//! price of fidelity: details of folded turns survive only as far as the
//! summary keeps them, and there is no way back to the original text.
//! Raise `memory.retention_turns` to keep more history verbatim at the cost
//! of larger prompts.
//!
//! If the summarization call fails, nothing is folded: the new turn is
//! appended and all turns stay verbatim past the threshold until a later
//! save summarizes successfully.

use std::collections::VecDeque;
use std::fmt::Write as _;
use tracing::{debug, warn};

use crate::config::MemoryConfig;
use crate::llm::{ChatMessage, ChatModel};
use crate::models::ConversationTurn;

/// Approximate characters per token for the optional history budget.
const CHARS_PER_TOKEN: usize = 4;

const SUMMARIZE_INSTRUCTION: &str = "Progressively summarize the conversation between a human and an AI assistant. \
Extend the current summary with the new lines and return only the new summary. \
Keep names, numbers and document references that later questions may depend on.";

/// Lifecycle phase of a [`ConversationMemory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPhase {
    Empty,
    Accumulating,
    Summarized,
}

#[derive(Debug, Clone)]
pub struct ConversationMemory {
    summary: String,
    turns: VecDeque<ConversationTurn>,
    retention_turns: usize,
    /// `0` disables the token budget.
    max_history_tokens: usize,
}

impl ConversationMemory {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            summary: String::new(),
            turns: VecDeque::new(),
            retention_turns: config.retention_turns,
            max_history_tokens: config.max_history_tokens,
        }
    }

    pub fn phase(&self) -> MemoryPhase {
        if !self.summary.is_empty() {
            MemoryPhase::Summarized
        } else if self.turns.is_empty() {
            MemoryPhase::Empty
        } else {
            MemoryPhase::Accumulating
        }
    }

    /// Number of turns currently held verbatim.
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// Render the history for the answer prompt. No side effects.
    pub fn load(&self) -> String {
        let mut out = String::new();
        if !self.summary.is_empty() {
            let _ = write!(out, "Summary of earlier conversation:\n{}", self.summary);
        }
        let transcript = render_transcript(self.turns.iter());
        if !transcript.is_empty() {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&transcript);
        }
        out
    }

    /// Record a completed turn, folding the oldest turns into the summary
    /// when the retention window overflows.
    ///
    /// The new state is computed before anything is committed, so dropping
    /// this future (e.g. on a request timeout) leaves the memory untouched.
    pub async fn save(&mut self, question: &str, answer: &str, summarizer: &dyn ChatModel) {
        let turn = ConversationTurn::new(question, answer);
        let fold = self.overflow(&turn);

        if fold == 0 {
            self.turns.push_back(turn);
            return;
        }

        let folded: Vec<&ConversationTurn> =
            self.turns.iter().chain(std::iter::once(&turn)).take(fold).collect();
        let messages = summarize_prompt(&self.summary, &render_transcript(folded.into_iter()));

        match summarizer.complete(&messages).await {
            Ok(new_summary) if !new_summary.trim().is_empty() => {
                self.turns.push_back(turn);
                self.turns.drain(..fold);
                self.summary = new_summary.trim().to_string();
                debug!(
                    folded = fold,
                    retained = self.turns.len(),
                    "conversation summarized"
                );
            }
            Ok(_) => {
                warn!("Summarizer returned an empty summary; keeping turns verbatim");
                self.turns.push_back(turn);
            }
            Err(e) => {
                warn!("Summarization failed, keeping turns verbatim: {:#}", e);
                self.turns.push_back(turn);
            }
        }
    }

    /// How many of the oldest turns must be folded once `incoming` is added.
    fn overflow(&self, incoming: &ConversationTurn) -> usize {
        let total = self.turns.len() + 1;
        let mut fold = total.saturating_sub(self.retention_turns);

        if self.max_history_tokens > 0 {
            let lens: Vec<usize> = self
                .turns
                .iter()
                .chain(std::iter::once(incoming))
                .map(estimate_tokens)
                .collect();
            let mut kept: usize = lens[fold.min(total)..].iter().sum();
            // The newest turn always stays verbatim.
            while fold < total - 1 && kept > self.max_history_tokens {
                kept -= lens[fold];
                fold += 1;
            }
        }
        fold
    }
}

fn estimate_tokens(turn: &ConversationTurn) -> usize {
    (turn.question.chars().count() + turn.answer.chars().count()).div_ceil(CHARS_PER_TOKEN)
}

fn render_transcript<'a>(turns: impl Iterator<Item = &'a ConversationTurn>) -> String {
    turns
        .map(|t| format!("Human: {}\nAI: {}", t.question, t.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize_prompt(current: &str, new_lines: &str) -> Vec<ChatMessage> {
    let current = if current.is_empty() { "(none)" } else { current };
    vec![
        ChatMessage::system(SUMMARIZE_INSTRUCTION),
        ChatMessage::user(format!(
            "Current summary:\n{}\n\nNew lines of conversation:\n{}\n\nNew summary:",
            current, new_lines
        )),
    ]
}
