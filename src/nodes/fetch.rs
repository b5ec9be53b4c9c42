//! Templated HTTP requests.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value};

use crate::spec::NodeSpec;
use crate::template;

use super::{json_context, InputMap, Node, NodeContext, NodeError};

/// Performs an HTTP request with URL, headers and payload rendered against
/// the node's inputs, emitting the JSON response as the terminal event.
///
/// `json` payloads are serialized, templated, re-parsed and sent as a JSON
/// body; `data` payloads go through the same render pass but are sent as a
/// raw body.
#[derive(Clone, Debug)]
pub struct FetchNode {
    method: Method,
    url: String,
    headers: Map<String, Value>,
    data: Option<Value>,
    json_data: Option<Value>,
}

impl FetchNode {
    /// Build from a spec; an unknown HTTP method is a config error.
    pub fn from_spec(spec: &NodeSpec) -> Result<Self, NodeError> {
        let method_str = spec.data_str("method").unwrap_or("GET").to_uppercase();
        let method = method_str
            .parse::<Method>()
            .map_err(|_| NodeError::Config {
                message: format!("unsupported HTTP method: {method_str}"),
            })?;
        let url = spec
            .data_str("url")
            .ok_or_else(|| NodeError::Config {
                message: "fetch requires a 'url'".to_string(),
            })?
            .to_string();
        let headers = spec
            .data
            .get("headers")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(default_headers);
        Ok(Self {
            method,
            url,
            headers,
            data: spec.data.get("data").cloned().filter(|v| !v.is_null()),
            json_data: spec.data.get("json_data").cloned().filter(|v| !v.is_null()),
        })
    }

    fn render_payload(
        payload: &Value,
        context: &Map<String, Value>,
    ) -> Result<Value, NodeError> {
        let serialized = serde_json::to_string(payload)?;
        let rendered = template::render(&serialized, context)?;
        serde_json::from_str(&rendered).map_err(|e| NodeError::Data {
            message: format!("templated payload is not valid JSON: {e}"),
        })
    }
}

fn default_headers() -> Map<String, Value> {
    let mut headers = Map::new();
    headers.insert("Accept".to_string(), Value::String("application/json".into()));
    headers.insert(
        "Content-Type".to_string(),
        Value::String("application/json".into()),
    );
    headers
}

#[async_trait]
impl Node for FetchNode {
    async fn run(&self, inputs: InputMap, ctx: NodeContext) -> Result<(), NodeError> {
        let context = json_context(&inputs);
        let url = template::render(&self.url, &context)?;

        let client = reqwest::Client::new();
        let mut request = client.request(self.method.clone(), &url);
        for (name, value) in &self.headers {
            if let Some(value) = value.as_str() {
                request = request.header(name.as_str(), value);
            }
        }
        if let Some(json_data) = &self.json_data {
            request = request.json(&Self::render_payload(json_data, &context)?);
        } else if let Some(data) = &self.data {
            let rendered = Self::render_payload(data, &context)?;
            request = request.body(rendered.to_string());
        }

        let response = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(NodeError::Transport {
                    message: "request cancelled".to_string(),
                    status: None,
                })
            }
            result = request.send() => result.map_err(|e| NodeError::Transport {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(NodeError::Transport {
                message: format!("request to {url} failed"),
                status: Some(status.as_u16()),
            });
        }
        let body: Value = response.json().await.map_err(|e| NodeError::Data {
            message: format!("response is not valid JSON: {e}"),
        })?;
        ctx.emit_end(body)
    }

    fn snapshot(&self) -> Value {
        serde_json::json!({
            "method": self.method.as_str(),
            "url": self.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(data: Value) -> NodeSpec {
        serde_json::from_value(json!({"id": "f", "type": "fetch", "data": data})).unwrap()
    }

    #[test]
    fn requires_a_url() {
        assert!(FetchNode::from_spec(&spec(json!({"method": "GET"}))).is_err());
    }

    #[test]
    fn rejects_unknown_methods() {
        let err =
            FetchNode::from_spec(&spec(json!({"url": "http://x", "method": "TELEPORT "})));
        assert!(err.is_err());
    }

    #[test]
    fn defaults_to_json_headers() {
        let node = FetchNode::from_spec(&spec(json!({"url": "http://x"}))).unwrap();
        assert_eq!(node.headers["Accept"], "application/json");
    }

    #[test]
    fn payload_templating_renders_inputs() {
        let mut context = Map::new();
        context.insert("name".to_string(), json!("ada"));
        let rendered =
            FetchNode::render_payload(&json!({"user": "{{ name }}"}), &context).unwrap();
        assert_eq!(rendered["user"], "ada");
    }
}
