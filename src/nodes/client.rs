//! LLM client construction.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::event::FlowValue;
use crate::llm::{LlmClient, OpenAiCompatClient, ScriptedClient};
use crate::spec::NodeSpec;

use super::{InputMap, Node, NodeContext, NodeError};

/// Builds a shared [`LlmClient`] from its configuration and publishes it as
/// the terminal event.
///
/// The client is constructed once at node creation and reused across
/// invocations (including loop iterations, where the node replays its cached
/// result). `engine: "fake"`/`"scripted"` selects the deterministic scripted
/// client; every other engine name resolves to the OpenAI-compatible client.
pub struct ClientNode {
    engine: String,
    model: String,
    client: Arc<dyn LlmClient>,
}

impl ClientNode {
    #[must_use]
    pub fn from_spec(spec: &NodeSpec) -> Self {
        let engine = spec.data_str("engine").unwrap_or("openai").to_string();
        let model = spec.data_str("model").unwrap_or_default().to_string();
        let api_info = spec.data.get("api_info").and_then(Value::as_object);
        let api_key = api_info
            .and_then(|info| info.get("api_key"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let base_url = api_info
            .and_then(|info| info.get("base_url"))
            .and_then(Value::as_str)
            .unwrap_or("https://api.openai.com/v1")
            .to_string();

        let client: Arc<dyn LlmClient> = match engine.as_str() {
            "fake" | "scripted" => {
                let script = spec
                    .data
                    .get("script")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect::<Vec<_>>()
                    })
                    .filter(|script| !script.is_empty());
                match script {
                    Some(script) => Arc::new(ScriptedClient::new(&model, script)),
                    None => Arc::new(ScriptedClient::canned(&model)),
                }
            }
            _ => Arc::new(OpenAiCompatClient::new(base_url, api_key, &model)),
        };

        Self {
            engine,
            model,
            client,
        }
    }
}

#[async_trait]
impl Node for ClientNode {
    async fn run(&self, _inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        ctx.emit_end(FlowValue::Client(Arc::clone(&self.client)))
    }

    fn snapshot(&self) -> Value {
        serde_json::json!({ "engine": self.engine, "model": self.model })
    }
}
