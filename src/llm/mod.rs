//! The LLM client abstraction consumed by `client` and `llm` nodes.
//!
//! The engine only contracts that a client can produce a batch completion or
//! an async stream of [`ChatCompletionChunk`]s for a [`ChatThread`]. Concrete
//! transports live behind this trait; [`openai::OpenAiCompatClient`] talks to
//! any OpenAI-compatible endpoint and [`scripted::ScriptedClient`] replays
//! configured chunks deterministically.

pub mod openai;
pub mod scripted;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::ChatThread;
use crate::stream::ChatCompletionChunk;

pub use openai::OpenAiCompatClient;
pub use scripted::ScriptedClient;

/// Per-request generation parameters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenerateParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A batch completion result.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    #[serde(default)]
    pub model: String,
}

/// Errors raised by LLM clients.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    /// The request could not be issued or returned a non-success status.
    #[error("llm request failed ({client}): {message}")]
    #[diagnostic(code(flowweave::llm::request))]
    Request { client: String, message: String },

    /// The streaming response broke mid-flight.
    #[error("llm stream failed ({client}): {message}")]
    #[diagnostic(code(flowweave::llm::stream))]
    Stream { client: String, message: String },

    /// The client configuration is unusable.
    #[error("llm client misconfigured: {0}")]
    #[diagnostic(
        code(flowweave::llm::config),
        help("Check the client node's engine, model and api_info fields.")
    )]
    Config(String),
}

/// A chat-completion backend.
///
/// Clients are built once by a `client` node and shared read-only by every
/// downstream `llm` node. Implementations must be cheap to share behind an
/// `Arc`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Short identifier used in debug snapshots.
    fn name(&self) -> &str;

    /// Produce a full completion for the thread.
    async fn generate(
        &self,
        chat: &ChatThread,
        params: &GenerateParams,
    ) -> Result<Completion, LlmError>;

    /// Produce a stream of completion chunks for the thread.
    async fn stream_generate(
        &self,
        chat: &ChatThread,
        params: &GenerateParams,
    ) -> Result<BoxStream<'static, Result<ChatCompletionChunk, LlmError>>, LlmError>;
}
