//! Core identifier types for the flowweave engine.
//!
//! This module defines the node type tags recognized by the compiler and the
//! reserved handle names shared between nodes, edges and the executors.
//!
//! # Key Types
//!
//! - [`NodeTag`]: identifies the kind of a node in a graph spec
//! - handle constants: the well-known input/output handle names
//!
//! Input handles are hyphenated (`handle-chat`), output and free handles are
//! underscored (`handle_user_message`). `content`, `end`, `default` and
//! `void` are generic event type tags, not handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// System context input of chat and llm nodes.
pub const HANDLE_SYSTEM_CONTEXT: &str = "handle-system-context";
/// Client provider input of llm nodes.
pub const HANDLE_CLIENT_PROVIDER: &str = "handle-client-provider";
/// Assembled chat input of llm nodes.
pub const HANDLE_CHAT: &str = "handle-chat";

/// User message output of the entry node.
pub const HANDLE_USER_MESSAGE: &str = "handle_user_message";
/// File attachment output of the entry node.
pub const HANDLE_USER_FILES: &str = "handle_user_files";
/// Image attachment output of the entry node.
pub const HANDLE_USER_IMAGES: &str = "handle_user_images";
/// Full message-list input of chat nodes.
pub const HANDLE_MESSAGES: &str = "handle_messages";
/// List input of loop nodes.
pub const HANDLE_LIST: &str = "handle_list";
/// Per-iteration feedback input of loop nodes.
pub const HANDLE_LOOP: &str = "handle_loop";
/// Conventional input of parser nodes.
pub const HANDLE_PARSER_INPUT: &str = "handle_parser_input";
/// Extras input of send_message nodes.
pub const HANDLE_SEND_EXTRA: &str = "handle_send_extra";
/// Context input of conditional nodes.
pub const HANDLE_INPUT: &str = "handle_input";
/// Aggregated text output of inner nodes.
pub const HANDLE_EXECUTION_CONTENT: &str = "handle_execution_content";
/// Collected extras output of inner nodes.
pub const HANDLE_EXECUTION_EXTRAS: &str = "handle_execution_extras";

/// Reserved target key on edges rewritten into the sink node.
pub const KEY_VOID: &str = "void";

/// Identifies the type of a node within a graph spec.
///
/// The built-in tags correspond to the node catalog the compiler knows how to
/// instantiate. Any other spec string decodes to [`NodeTag::Unknown`], which
/// the factory turns into a stub node so execution can continue and report
/// the problem as a debug event.
///
/// # Examples
///
/// ```rust
/// use flowweave::types::NodeTag;
///
/// assert_eq!(NodeTag::decode("user_input"), NodeTag::UserInput);
/// assert_eq!(NodeTag::decode("llm").encode(), "llm");
/// assert_eq!(
///     NodeTag::decode("my_custom"),
///     NodeTag::Unknown("my_custom".to_string())
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeTag {
    /// The single entry node carrying the user message.
    UserInput,
    /// Static text output.
    Text,
    /// Template rendering over the node inputs.
    Parser,
    /// Templated HTTP request.
    Fetch,
    /// LLM client construction.
    Client,
    /// LLM generation (batch or streaming).
    Llm,
    /// Chat thread assembly.
    Chat,
    /// Sideband message with structured extras.
    SendMessage,
    /// Terminal node of a branch.
    End,
    /// The auto-inserted sink absorbing unwired outputs (reserved).
    Void,
    /// List expansion with per-item re-execution.
    Loop,
    /// Host of a nested graph.
    Inner,
    /// Template-routed branching.
    Conditional,
    /// Any tag the catalog does not recognize.
    Unknown(String),
}

impl NodeTag {
    /// Encode a tag into its spec string form.
    #[must_use]
    pub fn encode(&self) -> &str {
        match self {
            NodeTag::UserInput => "user_input",
            NodeTag::Text => "text",
            NodeTag::Parser => "parser",
            NodeTag::Fetch => "fetch",
            NodeTag::Client => "client",
            NodeTag::Llm => "llm",
            NodeTag::Chat => "chat",
            NodeTag::SendMessage => "send_message",
            NodeTag::End => "end",
            NodeTag::Void => "void",
            NodeTag::Loop => "loop",
            NodeTag::Inner => "inner",
            NodeTag::Conditional => "conditional",
            NodeTag::Unknown(s) => s.as_str(),
        }
    }

    /// Decode a spec string into a tag, falling back to [`NodeTag::Unknown`].
    pub fn decode(s: &str) -> Self {
        match s {
            "user_input" => NodeTag::UserInput,
            "text" => NodeTag::Text,
            "parser" => NodeTag::Parser,
            "fetch" => NodeTag::Fetch,
            "client" => NodeTag::Client,
            "llm" => NodeTag::Llm,
            "chat" => NodeTag::Chat,
            "send_message" => NodeTag::SendMessage,
            "end" => NodeTag::End,
            "void" => NodeTag::Void,
            "loop" => NodeTag::Loop,
            "inner" => NodeTag::Inner,
            "conditional" => NodeTag::Conditional,
            other => NodeTag::Unknown(other.to_string()),
        }
    }

    /// Returns `true` for the entry node tag.
    #[must_use]
    pub fn is_user_input(&self) -> bool {
        matches!(self, NodeTag::UserInput)
    }

    /// Returns `true` for terminal nodes.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, NodeTag::End)
    }

    /// Returns `true` for the reserved sink tag.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, NodeTag::Void)
    }
}

impl fmt::Display for NodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl From<&str> for NodeTag {
    fn from(s: &str) -> Self {
        NodeTag::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_round_trips_builtin_tags() {
        for tag in [
            "user_input",
            "text",
            "parser",
            "fetch",
            "client",
            "llm",
            "chat",
            "send_message",
            "end",
            "void",
            "loop",
            "inner",
            "conditional",
        ] {
            assert_eq!(NodeTag::decode(tag).encode(), tag);
        }
    }

    #[test]
    fn unknown_tags_preserve_their_name() {
        let tag = NodeTag::decode("telemetry_probe");
        assert_eq!(tag, NodeTag::Unknown("telemetry_probe".to_string()));
        assert_eq!(tag.encode(), "telemetry_probe");
        assert_eq!(tag.to_string(), "telemetry_probe");
    }
}
