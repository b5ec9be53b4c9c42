//! The transform stage of the debug pipeline.
//!
//! Events pass through an ordered chain of transformers; any transformer may
//! drop the event by returning `None`. Ordering bands follow the pipeline
//! layout: filtering first, then redaction, then size limits, then sampling.

use rand::Rng;
use regex::Regex;
use serde_json::Value;

use super::config::DebugConfig;
use super::events::{DebugEvent, DebugEventType, DebugSeverity};

/// Key names always treated as sensitive.
const SENSITIVE_KEYS: &str = r"(?i)^(password|passwd|secret|api[-_]?key|private[-_]?key|token|credential|authorization|bearer)$";

/// Replacement for redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// A single stage in the transform chain.
pub trait DebugTransform: Send + Sync {
    /// Stable name, used to deduplicate and remove stages.
    fn name(&self) -> &'static str;
    /// Sort order; lower runs first.
    fn order(&self) -> i32;
    /// Transform the event, or return `None` to drop it.
    fn apply(&self, event: DebugEvent) -> Option<DebugEvent>;
}

/// Ordered chain of transformers.
#[derive(Default)]
pub struct TransformChain {
    stages: Vec<Box<dyn DebugTransform>>,
}

impl TransformChain {
    /// Build the standard chain for a configuration.
    #[must_use]
    pub fn for_config(config: &DebugConfig) -> Self {
        let mut chain = Self::default();
        chain.add(FilterTransform::from_config(config));
        if config.redact_sensitive {
            chain.add(RedactTransform::new(&config.additional_redact_keys));
        }
        chain.add(TruncateTransform {
            max_payload_length: config.max_payload_length,
            max_list_items: config.max_list_items,
        });
        if config.sample_rate < 1.0 {
            chain.add(SampleTransform {
                rate: config.sample_rate,
            });
        }
        chain
    }

    /// Add a stage, keeping the chain ordered.
    pub fn add(&mut self, stage: impl DebugTransform + 'static) {
        self.stages.push(Box::new(stage));
        self.stages.sort_by_key(|s| s.order());
    }

    /// Run an event through every stage; `None` means it was dropped.
    #[must_use]
    pub fn process(&self, event: DebugEvent) -> Option<DebugEvent> {
        let mut current = event;
        for stage in &self.stages {
            current = stage.apply(current)?;
        }
        Some(current)
    }
}

/// Severity, type and node filtering.
pub struct FilterTransform {
    min_severity: DebugSeverity,
    include_event_types: Option<Vec<DebugEventType>>,
    exclude_event_types: Vec<DebugEventType>,
    include_nodes: Option<Vec<String>>,
    exclude_nodes: Vec<String>,
}

impl FilterTransform {
    #[must_use]
    pub fn from_config(config: &DebugConfig) -> Self {
        Self {
            min_severity: config.min_severity,
            include_event_types: config.include_event_types.clone(),
            exclude_event_types: config.exclude_event_types.clone(),
            include_nodes: config.include_nodes.clone(),
            exclude_nodes: config.exclude_nodes.clone(),
        }
    }
}

impl DebugTransform for FilterTransform {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn order(&self) -> i32 {
        20
    }

    fn apply(&self, event: DebugEvent) -> Option<DebugEvent> {
        if event.severity < self.min_severity {
            return None;
        }
        if let Some(include) = &self.include_event_types {
            if !include.contains(&event.event_type) {
                return None;
            }
        }
        if self.exclude_event_types.contains(&event.event_type) {
            return None;
        }
        if let Some(node_id) = &event.node_id {
            if let Some(include) = &self.include_nodes {
                if !include.contains(node_id) {
                    return None;
                }
            }
            if self.exclude_nodes.contains(node_id) {
                return None;
            }
        }
        Some(event)
    }
}

/// Replaces values under sensitive-looking keys anywhere in the payload.
pub struct RedactTransform {
    pattern: Regex,
}

impl RedactTransform {
    /// Build the matcher from the built-in key set plus configured extras.
    #[must_use]
    pub fn new(additional_keys: &[String]) -> Self {
        let pattern = if additional_keys.is_empty() {
            Regex::new(SENSITIVE_KEYS)
        } else {
            let extras: Vec<String> = additional_keys
                .iter()
                .map(|k| regex::escape(k))
                .collect();
            Regex::new(&format!(
                "{SENSITIVE_KEYS}|(?i)^({})$",
                extras.join("|")
            ))
        }
        // The built-in pattern is a constant and escaped extras cannot break it.
        .unwrap_or_else(|_| Regex::new(SENSITIVE_KEYS).unwrap());
        Self { pattern }
    }

    /// Mask sensitive keys anywhere in a value tree.
    pub fn mask(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, nested) in map.iter_mut() {
                    if self.pattern.is_match(key) {
                        *nested = Value::String(REDACTED.to_string());
                    } else {
                        self.mask(nested);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.mask(item);
                }
            }
            _ => {}
        }
    }
}

impl DebugTransform for RedactTransform {
    fn name(&self) -> &'static str {
        "redact"
    }

    fn order(&self) -> i32 {
        10
    }

    fn apply(&self, mut event: DebugEvent) -> Option<DebugEvent> {
        self.mask(&mut event.payload);
        Some(event)
    }
}

/// Caps string lengths and list sizes in payloads.
pub struct TruncateTransform {
    pub max_payload_length: usize,
    pub max_list_items: usize,
}

impl TruncateTransform {
    /// Cap string lengths and list sizes anywhere in a value tree.
    pub fn limit(&self, value: &mut Value) {
        match value {
            Value::String(s) => {
                if s.chars().count() > self.max_payload_length {
                    let mut truncated: String =
                        s.chars().take(self.max_payload_length).collect();
                    truncated.push('…');
                    *s = truncated;
                }
            }
            Value::Array(items) => {
                if items.len() > self.max_list_items {
                    items.truncate(self.max_list_items);
                }
                for item in items {
                    self.limit(item);
                }
            }
            Value::Object(map) => {
                for nested in map.values_mut() {
                    self.limit(nested);
                }
            }
            _ => {}
        }
    }
}

impl DebugTransform for TruncateTransform {
    fn name(&self) -> &'static str {
        "truncate"
    }

    fn order(&self) -> i32 {
        30
    }

    fn apply(&self, mut event: DebugEvent) -> Option<DebugEvent> {
        self.limit(&mut event.payload);
        Some(event)
    }
}

/// Keeps a fraction of non-error events. Errors always pass.
pub struct SampleTransform {
    pub rate: f64,
}

impl DebugTransform for SampleTransform {
    fn name(&self) -> &'static str {
        "sample"
    }

    fn order(&self) -> i32 {
        40
    }

    fn apply(&self, event: DebugEvent) -> Option<DebugEvent> {
        if event.severity >= DebugSeverity::Error {
            return Some(event);
        }
        if rand::thread_rng().gen::<f64>() < self.rate {
            Some(event)
        } else {
            None
        }
    }
}
