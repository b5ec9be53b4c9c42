//! ```text
//! FlowSpec ──► graphs::build ──► Graph ──► runtime::run_graph
//!                 │                           │
//!                 ├─► Validator               ├─► Scheduler ─► Nodes ─► NodeEvent
//!                 │   (issues embedded)       │                          │
//!                 └─► node factory            │                          ├─► edge routing / bypass
//!                     (inner specs recurse)   │                          └─► DebugPipeline
//!                                             │
//!                                             └─► Stream<FlowMessage>
//!                                                 (content | debug | debug_summary)
//! ```
//!
//! Flowweave compiles a declarative graph of typed nodes and handle-routed
//! edges into an executable dataflow and streams the results back to the
//! caller. The scheduler enforces data dependencies, propagates conditional
//! bypass across fan-in, expands loops per list element and drives nested
//! sub-graphs recursively. No exception escapes the executor: every failure
//! becomes a structured debug record on the output stream.

pub mod debug;
pub mod event;
pub mod graphs;
pub mod llm;
pub mod message;
pub mod nodes;
pub mod runtime;
pub mod spec;
pub mod stream;
pub mod template;
pub mod types;
