//! Chat completion client
//!
//! One request shape for every flow: `POST {endpoint}` with
//! `{model, messages, stream: false}`, reading `choices[0].message.content`.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Errors from the chat call
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat endpoint is not configured (set BOWLER_CHAT_URL or chat.endpoint)")]
    NotConfigured,

    #[error("Chat request failed: {0}. Please try again")]
    Http(#[from] reqwest::Error),

    #[error("Chat service returned {status}: {body}. Please try again")]
    Status { status: u16, body: String },

    #[error("Chat service returned no content")]
    EmptyResponse,
}

impl ChatError {
    /// Whether re-triggering the same action might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Http(_) | ChatError::Status { .. } | ChatError::EmptyResponse)
    }
}

/// Anything that can answer a chat conversation
pub trait ChatClient {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

/// Blocking HTTP client for an OpenAI-style chat completion endpoint
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpChatClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ChatError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(ChatError::NotConfigured);
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            endpoint,
            model: model.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }
}

impl ChatClient for HttpChatClient {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let start = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        debug!(endpoint = %self.endpoint, model = %self.model, messages = messages.len(), "sending chat request");

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            error!("Chat service error {}: {}", status, body);
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json()?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ChatError::EmptyResponse)?;

        info!("Chat reply received in {:?} ({} chars)", start.elapsed(), content.len());
        Ok(content)
    }
}
