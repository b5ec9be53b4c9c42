//! Graph model, compilation and validation.
//!
//! The entry point is [`build`]: it turns a [`FlowSpec`](crate::spec::FlowSpec)
//! plus the initial user message into an executable [`Graph`]. Builds never
//! fail; validation findings travel inside the graph and surface as debug
//! events when execution starts.
//!
//! ```
//! use flowweave::graphs::{build, Attachments};
//! use flowweave::spec::FlowSpec;
//! use serde_json::json;
//!
//! let spec = FlowSpec::from_value(json!({
//!     "type": "chat",
//!     "nodes": [
//!         {"id": "u", "type": "user_input"},
//!         {"id": "e", "type": "end"}
//!     ],
//!     "edges": [
//!         {"source": "u", "sourceHandle": "handle_user_message",
//!          "target": "e", "targetHandle": "handle-1"}
//!     ]
//! })).unwrap();
//!
//! let graph = build(spec, "Hi", Attachments::default());
//! assert!(graph.issues.is_empty());
//! assert_eq!(graph.master, "u");
//! ```

mod build;
pub mod model;
pub mod validate;

pub use build::{build, Attachments};
pub use model::{Edge, Graph, NodeCell, NodeState};
pub use validate::{IssueSeverity, SpecIssue};
