//! Completion capability: chat messages in, text out.
//!
//! [`ChatModel`] is the narrow interface the answer generator and the
//! conversation memory consume. [`OpenAiChatModel`] implements it against
//! any OpenAI-compatible `/chat/completions` endpoint (Groq by default).
//! Requests are plain request/response; there is no streaming.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::http::send_with_retry;

/// Speaker of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message of a completion prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A text-completion service.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Complete the prompt and return the model's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions API.
///
/// Built once at startup from [`LlmConfig`]; the API key is read from the
/// environment variable named by `llm.api_key_env`.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("{} environment variable not set", config.api_key_env)
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let endpoint = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        info!(
            "Chat model configured: endpoint={}, model={}",
            endpoint, config.model
        );

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let start = std::time::Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        let request = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        // Single attempt: completion failures surface to the caller.
        let json = send_with_retry(request, 0, "Chat completion").await?;
        let text = parse_chat_response(json)?;

        debug!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "completion received"
        );
        Ok(text)
    }
}

fn parse_chat_response(json: serde_json::Value) -> Result<String> {
    let response: ChatResponse = serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid chat completion response: {}", e))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat completion response: no message content"))
}
