//! Pluggable chat-model client.
//!
//! The orchestrator only needs raw completion text (it runs its own JSON
//! recovery over it), so the trait surface is deliberately plain: a list of
//! messages in, a string out.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::retry::with_timeout;

const CHAT_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One completion round trip; returns the raw assistant text.
    async fn chat(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String, ClientError>;

    /// Model ids the provider offers, for caller-side model pickers.
    async fn fetch_models(&self) -> Result<Vec<String>, ClientError>;
}

/// OpenAI-compatible implementation (`/chat/completions` + `/models`).
pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiChatClient {
    /// Missing credentials are a fatal precondition, rejected before any
    /// network call is possible.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ClientError::NoApiKeyConfigured);
        }
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ClientError::NoModelConfigured);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn chat(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens,
        };
        let call = async {
            let response = self
                .http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(ClientError::BackendUnreachable(format!(
                    "chat completion answered {}",
                    response.status()
                )));
            }
            Ok(response.json::<CompletionResponse>().await?)
        };
        let completion = with_timeout(call, CHAT_DEADLINE, "chat completion").await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                ClientError::MalformedBackendResponse("completion had no choices".to_string())
            })?;
        Ok(choice.message.content)
    }

    async fn fetch_models(&self) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::BackendUnreachable(format!(
                "model listing answered {}",
                response.status()
            )));
        }
        let list = response.json::<ModelList>().await?;
        Ok(list.data.into_iter().map(|entry| entry.id).collect())
    }
}
