//! Graph execution.
//!
//! [`run_graph`] is the caller-facing entry point: it consumes a compiled
//! [`Graph`] and returns a stream of [`FlowMessage`]s. Internally one
//! executor drives the whole run on a single logical thread: nodes execute
//! one at a time, each as a spawned task drained through its event channel so
//! `content` chunks stream through in production order. Graphs containing a
//! loop node are delegated to the loop executor; nested graphs recurse
//! through [`execute_into`] with a fresh debug pipeline.
//!
//! No error escapes the executor. Node failures, validation findings,
//! routing problems and scheduler stalls are all converted into structured
//! debug records on the output stream.

mod bypass;
mod linear;
mod loops;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::debug::config::DebugConfig;
use crate::debug::emit::{LogSink, StreamSink};
use crate::debug::events::DebugSeverity;
use crate::debug::DebugPipeline;
use crate::graphs::model::Graph;
use crate::graphs::IssueSeverity;
use crate::stream::FlowMessage;

/// Per-execution identity record threaded through all nodes.
///
/// Assigned once when execution starts and treated as immutable thereafter.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatLog {
    pub chat_id: Option<String>,
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ChatLog {
    #[must_use]
    pub fn new(
        chat_id: Option<String>,
        thread_id: Option<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            chat_id,
            thread_id,
            user_id,
            started_at: Some(Utc::now()),
        }
    }
}

/// Options for one graph execution.
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub chat_id: Option<String>,
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
    /// Token cancelling the run; a fresh one is created when absent.
    pub cancel: Option<CancellationToken>,
}

/// Execute a compiled graph, streaming results back to the caller.
///
/// Dropping the returned stream cancels the execution: outstanding node I/O
/// is aborted through the cancellation token and no further nodes run.
///
/// ```no_run
/// use flowweave::graphs::{build, Attachments};
/// use flowweave::runtime::{run_graph, RunOptions};
/// use flowweave::spec::FlowSpec;
/// use tokio_stream::StreamExt;
///
/// # async fn example(spec: FlowSpec) {
/// let graph = build(spec, "Hi", Attachments::default());
/// let mut stream = run_graph(graph, RunOptions::default());
/// while let Some(message) = stream.next().await {
///     println!("{}", serde_json::to_string(&message).unwrap());
/// }
/// # }
/// ```
#[must_use]
pub fn run_graph(mut graph: Graph, options: RunOptions) -> UnboundedReceiverStream<FlowMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    let chat_log = ChatLog::new(options.chat_id, options.thread_id, options.user_id);
    let cancel = options.cancel.unwrap_or_default();
    tokio::spawn(async move {
        execute_into(&mut graph, tx, chat_log, cancel).await;
    });
    UnboundedReceiverStream::new(rx)
}

/// Drive a graph to completion, writing every output message to `out`.
/// Nested graph hosts call this recursively with their own channel.
pub(crate) async fn execute_into(
    graph: &mut Graph,
    out: mpsc::UnboundedSender<FlowMessage>,
    chat_log: ChatLog,
    cancel: CancellationToken,
) {
    let config = if graph.debug {
        graph.debug_config.clone().unwrap_or_default()
    } else {
        DebugConfig::errors_only()
    };
    let summary_enabled = graph.debug && config.enabled;

    let mut pipeline = DebugPipeline::new(config.clone(), &graph.kind, summary_enabled);
    pipeline.add_sink(StreamSink::new(out.clone()));
    if config.emit_to_log {
        pipeline.add_sink(LogSink);
    }

    let mut cx = ExecCtx {
        out,
        chat_log,
        cancel,
        pipeline,
        config,
    };

    cx.pipeline
        .graph_start(graph.nodes.len().saturating_sub(1), graph.edges.len());
    for issue in &graph.issues {
        let severity = match issue.severity {
            IssueSeverity::Error => DebugSeverity::Error,
            IssueSeverity::Warning => DebugSeverity::Warn,
        };
        cx.pipeline.validation_issue(severity, issue.payload());
    }

    if graph.loop_index().is_some() {
        loops::run(graph, &mut cx).await;
    } else {
        linear::drive(graph, None, &mut cx).await;
    }

    cx.pipeline.finish();
    tracing::debug!(graph = %graph.kind, "graph execution finished");
}

/// Shared executor state for one run.
pub(crate) struct ExecCtx {
    pub out: mpsc::UnboundedSender<FlowMessage>,
    pub chat_log: ChatLog,
    pub cancel: CancellationToken,
    pub pipeline: DebugPipeline,
    /// Copy of the pipeline's configuration, for node state capture.
    pub config: DebugConfig,
}

impl ExecCtx {
    /// Forward a message to the caller. A dropped receiver cancels the run.
    pub fn send(&self, message: FlowMessage) {
        if self.out.send(message).is_err() {
            self.cancel.cancel();
        }
    }
}
