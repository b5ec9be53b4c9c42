//! The emit stage of the debug pipeline.
//!
//! Transformed events fan out to every registered sink: the caller's output
//! stream, the `tracing` backend, a user callback, or an in-memory buffer for
//! tests. A failing sink never disturbs the others.

use std::io::{self, Result as IoResult};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::stream::FlowMessage;

use super::events::{DebugEvent, DebugSeverity, ExecutionSummary};

/// An output target for debug records.
pub trait DebugSink: Send {
    /// Deliver one transformed event.
    fn emit(&mut self, event: &DebugEvent) -> IoResult<()>;

    /// Deliver the final summary. Sinks that only care about individual
    /// events can ignore it.
    fn emit_summary(&mut self, _summary: &ExecutionSummary) -> IoResult<()> {
        Ok(())
    }
}

/// Forwards records onto the caller-facing output stream.
pub struct StreamSink {
    tx: mpsc::UnboundedSender<FlowMessage>,
}

impl StreamSink {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<FlowMessage>) -> Self {
        Self { tx }
    }
}

impl DebugSink for StreamSink {
    fn emit(&mut self, event: &DebugEvent) -> IoResult<()> {
        self.tx
            .send(FlowMessage::Debug(event.clone()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "output stream dropped"))
    }

    fn emit_summary(&mut self, summary: &ExecutionSummary) -> IoResult<()> {
        self.tx
            .send(FlowMessage::DebugSummary(summary.clone()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "output stream dropped"))
    }
}

/// Mirrors records into the `tracing` backend.
#[derive(Default)]
pub struct LogSink;

impl DebugSink for LogSink {
    fn emit(&mut self, event: &DebugEvent) -> IoResult<()> {
        let rendered = serde_json::to_string(&event.payload).unwrap_or_default();
        match event.severity {
            DebugSeverity::Error => tracing::error!(
                event_type = ?event.event_type,
                node = event.node_id.as_deref(),
                payload = %rendered,
                "debug event"
            ),
            DebugSeverity::Warn => tracing::warn!(
                event_type = ?event.event_type,
                node = event.node_id.as_deref(),
                payload = %rendered,
                "debug event"
            ),
            DebugSeverity::Info => tracing::info!(
                event_type = ?event.event_type,
                node = event.node_id.as_deref(),
                payload = %rendered,
                "debug event"
            ),
            _ => tracing::debug!(
                event_type = ?event.event_type,
                node = event.node_id.as_deref(),
                payload = %rendered,
                "debug event"
            ),
        }
        Ok(())
    }
}

/// Invokes a user callback per record.
pub struct CallbackSink {
    callback: Box<dyn Fn(&DebugEvent) + Send>,
}

impl CallbackSink {
    #[must_use]
    pub fn new(callback: impl Fn(&DebugEvent) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl DebugSink for CallbackSink {
    fn emit(&mut self, event: &DebugEvent) -> IoResult<()> {
        (self.callback)(event);
        Ok(())
    }
}

/// In-memory sink for tests and snapshots.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<DebugEvent>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<DebugEvent> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl DebugSink for MemorySink {
    fn emit(&mut self, event: &DebugEvent) -> IoResult<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(event.clone());
        }
        Ok(())
    }
}
