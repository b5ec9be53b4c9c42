//! A deterministic client that replays configured chunks.
//!
//! Selected by `client` nodes with `engine: "fake"` (or `"scripted"`). Used
//! throughout the test suite and useful for dry-running graphs without a
//! network dependency.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::message::ChatThread;
use crate::stream::ChatCompletionChunk;

use super::{Completion, GenerateParams, LlmClient, LlmError};

/// Replays a fixed script of text fragments as completion chunks.
#[derive(Clone, Debug)]
pub struct ScriptedClient {
    model: String,
    script: Vec<String>,
}

impl ScriptedClient {
    /// A client that streams the given fragments in order.
    #[must_use]
    pub fn new(model: impl Into<String>, script: Vec<String>) -> Self {
        Self {
            model: model.into(),
            script,
        }
    }

    /// Default script used when the spec provides none.
    #[must_use]
    pub fn canned(model: impl Into<String>) -> Self {
        Self::new(model, vec!["ok".to_string()])
    }

    fn chunk(&self, fragment: &str) -> ChatCompletionChunk {
        let mut chunk = ChatCompletionChunk::text(fragment);
        chunk.model = self.model.clone();
        chunk
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        _chat: &ChatThread,
        _params: &GenerateParams,
    ) -> Result<Completion, LlmError> {
        Ok(Completion {
            content: self.script.concat(),
            model: self.model.clone(),
        })
    }

    async fn stream_generate(
        &self,
        _chat: &ChatThread,
        _params: &GenerateParams,
    ) -> Result<BoxStream<'static, Result<ChatCompletionChunk, LlmError>>, LlmError> {
        let chunks: Vec<Result<ChatCompletionChunk, LlmError>> = self
            .script
            .iter()
            .map(|fragment| Ok(self.chunk(fragment)))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}
