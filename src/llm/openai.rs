//! OpenAI-compatible chat-completion client.
//!
//! Talks to any endpoint speaking the `/chat/completions` wire format
//! (OpenAI, Ollama, vLLM, Groq, OpenRouter, …). Streaming responses are
//! consumed as server-sent-event lines (`data: {json}` terminated by
//! `data: [DONE]`).

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, ChatThread};
use crate::stream::{ChatCompletionChunk, ChunkChoice, ChunkDelta};

use super::{Completion, GenerateParams, LlmClient, LlmError};

const COMPLETIONS_PATH: &str = "/chat/completions";

/// Client for OpenAI-compatible chat-completion endpoints.
pub struct OpenAiCompatClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    /// Build a client for the given endpoint and model.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    fn request_body(&self, chat: &ChatThread, params: &GenerateParams, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: chat.messages.iter().map(WireMessage::from).collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream,
        }
    }

    async fn post(&self, body: &ChatRequest) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}{COMPLETIONS_PATH}", self.base_url);
        let mut req = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.map_err(|e| LlmError::Request {
            client: self.name().to_string(),
            message: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(LlmError::Request {
                client: self.name().to_string(),
                message: format!("status {}", response.status()),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn generate(
        &self,
        chat: &ChatThread,
        params: &GenerateParams,
    ) -> Result<Completion, LlmError> {
        let body = self.request_body(chat, params, false);
        let response = self.post(&body).await?;
        let parsed: BatchResponse = response.json().await.map_err(|e| LlmError::Request {
            client: self.name().to_string(),
            message: e.to_string(),
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(Completion {
            content,
            model: parsed.model,
        })
    }

    async fn stream_generate(
        &self,
        chat: &ChatThread,
        params: &GenerateParams,
    ) -> Result<BoxStream<'static, Result<ChatCompletionChunk, LlmError>>, LlmError> {
        let body = self.request_body(chat, params, true);
        let response = self.post(&body).await?;
        let client_name = self.name().to_string();

        let stream = try_stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(part) = bytes.next().await {
                let part = part.map_err(|e| LlmError::Stream {
                    client: client_name.clone(),
                    message: e.to_string(),
                })?;
                buffer.push_str(&String::from_utf8_lossy(&part));
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data.is_empty() || data == "[DONE]" {
                        continue;
                    }
                    let wire: StreamChunk =
                        serde_json::from_str(data).map_err(|e| LlmError::Stream {
                            client: client_name.clone(),
                            message: format!("bad chunk: {e}"),
                        })?;
                    yield wire.into_chunk();
                }
            }
        };
        Ok(stream.boxed())
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.clone(),
            content: message.content.clone(),
        }
    }
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<BatchChoice>,
}

#[derive(Deserialize)]
struct BatchChoice {
    message: BatchMessage,
}

#[derive(Deserialize)]
struct BatchMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl StreamChunk {
    fn into_chunk(self) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id,
            model: self.model,
            choices: self
                .choices
                .into_iter()
                .map(|c| ChunkChoice {
                    delta: ChunkDelta {
                        role: c.delta.role,
                        content: c.delta.content,
                    },
                    finish_reason: c.finish_reason,
                })
                .collect(),
            extras: None,
        }
    }
}
