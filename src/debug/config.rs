//! Debug pipeline configuration.
//!
//! Specs select behavior either field-by-field or by naming a preset:
//!
//! ```json
//! {"debug": true, "debug_config": {"preset": "production", "max_payload_length": 500}}
//! ```
//!
//! A named preset supplies the base values; explicit fields override it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::events::{DebugEventType, DebugSeverity};

/// Configuration for the capture → transform → emit pipeline.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DebugConfig {
    /// Master switch; `false` disables lifecycle capture entirely
    /// (error-severity events still pass so failures are never silent).
    pub enabled: bool,
    /// Minimum severity to keep.
    pub min_severity: DebugSeverity,
    /// If set, only these event types pass.
    pub include_event_types: Option<Vec<DebugEventType>>,
    /// Event types that never pass.
    pub exclude_event_types: Vec<DebugEventType>,
    /// If set, only events from these nodes pass (graph-level events always do).
    pub include_nodes: Option<Vec<String>>,
    /// Nodes whose events never pass.
    pub exclude_nodes: Vec<String>,
    /// Redact values under sensitive-looking keys.
    pub redact_sensitive: bool,
    /// Extra key names to redact in addition to the built-in set.
    pub additional_redact_keys: Vec<String>,
    /// Maximum length of string values in payloads.
    pub max_payload_length: usize,
    /// Maximum number of items kept in list payloads.
    pub max_list_items: usize,
    /// Capture node inputs on node_end.
    pub capture_inputs: bool,
    /// Capture node outputs on node_end.
    pub capture_outputs: bool,
    /// Capture `Node::snapshot` internal variables on node_end.
    pub capture_internal_state: bool,
    /// Mirror events into the `tracing` backend.
    pub emit_to_log: bool,
    /// Fraction of non-error events to keep (1.0 = all).
    pub sample_rate: f64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_severity: DebugSeverity::Debug,
            include_event_types: None,
            exclude_event_types: Vec::new(),
            include_nodes: None,
            exclude_nodes: Vec::new(),
            redact_sensitive: true,
            additional_redact_keys: Vec::new(),
            max_payload_length: 1000,
            max_list_items: 20,
            capture_inputs: true,
            capture_outputs: true,
            capture_internal_state: true,
            emit_to_log: false,
            sample_rate: 1.0,
        }
    }
}

impl DebugConfig {
    /// Errors and warnings only.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            min_severity: DebugSeverity::Warn,
            capture_inputs: false,
            capture_outputs: false,
            capture_internal_state: false,
            ..Self::default()
        }
    }

    /// Everything, including trace events.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            min_severity: DebugSeverity::Trace,
            max_payload_length: 5000,
            max_list_items: 100,
            ..Self::default()
        }
    }

    /// Sampled and redacted, sized for always-on use.
    #[must_use]
    pub fn production() -> Self {
        Self {
            min_severity: DebugSeverity::Info,
            sample_rate: 0.1,
            max_payload_length: 500,
            max_list_items: 10,
            capture_internal_state: false,
            ..Self::default()
        }
    }

    /// Only error-severity events.
    #[must_use]
    pub fn errors_only() -> Self {
        Self {
            min_severity: DebugSeverity::Error,
            capture_inputs: false,
            capture_outputs: false,
            capture_internal_state: false,
            ..Self::default()
        }
    }

    /// Resolve a preset by name; unknown names fall back to the default.
    #[must_use]
    pub fn preset(name: &str) -> Self {
        match name {
            "minimal" => Self::minimal(),
            "verbose" => Self::verbose(),
            "production" => Self::production(),
            "errors_only" => Self::errors_only(),
            _ => Self::default(),
        }
    }
}

/// Mirror of [`DebugConfig`] carrying per-field defaults for deserialization.
#[derive(Deserialize)]
#[serde(default)]
struct DebugConfigFields {
    enabled: bool,
    min_severity: DebugSeverity,
    include_event_types: Option<Vec<DebugEventType>>,
    exclude_event_types: Vec<DebugEventType>,
    include_nodes: Option<Vec<String>>,
    exclude_nodes: Vec<String>,
    redact_sensitive: bool,
    additional_redact_keys: Vec<String>,
    max_payload_length: usize,
    max_list_items: usize,
    capture_inputs: bool,
    capture_outputs: bool,
    capture_internal_state: bool,
    emit_to_log: bool,
    sample_rate: f64,
}

impl Default for DebugConfigFields {
    fn default() -> Self {
        DebugConfig::default().into()
    }
}

impl From<DebugConfig> for DebugConfigFields {
    fn from(c: DebugConfig) -> Self {
        Self {
            enabled: c.enabled,
            min_severity: c.min_severity,
            include_event_types: c.include_event_types,
            exclude_event_types: c.exclude_event_types,
            include_nodes: c.include_nodes,
            exclude_nodes: c.exclude_nodes,
            redact_sensitive: c.redact_sensitive,
            additional_redact_keys: c.additional_redact_keys,
            max_payload_length: c.max_payload_length,
            max_list_items: c.max_list_items,
            capture_inputs: c.capture_inputs,
            capture_outputs: c.capture_outputs,
            capture_internal_state: c.capture_internal_state,
            emit_to_log: c.emit_to_log,
            sample_rate: c.sample_rate,
        }
    }
}

impl From<DebugConfigFields> for DebugConfig {
    fn from(f: DebugConfigFields) -> Self {
        Self {
            enabled: f.enabled,
            min_severity: f.min_severity,
            include_event_types: f.include_event_types,
            exclude_event_types: f.exclude_event_types,
            include_nodes: f.include_nodes,
            exclude_nodes: f.exclude_nodes,
            redact_sensitive: f.redact_sensitive,
            additional_redact_keys: f.additional_redact_keys,
            max_payload_length: f.max_payload_length,
            max_list_items: f.max_list_items,
            capture_inputs: f.capture_inputs,
            capture_outputs: f.capture_outputs,
            capture_internal_state: f.capture_internal_state,
            emit_to_log: f.emit_to_log,
            sample_rate: f.sample_rate,
        }
    }
}

impl<'de> Deserialize<'de> for DebugConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mut value = Value::deserialize(deserializer)?;
        let preset = value
            .as_object_mut()
            .and_then(|obj| obj.remove("preset"))
            .and_then(|v| v.as_str().map(str::to_string));
        let base = match preset {
            Some(name) => DebugConfig::preset(&name),
            None => DebugConfig::default(),
        };
        let mut merged =
            serde_json::to_value(&base).map_err(serde::de::Error::custom)?;
        if let (Value::Object(target), Value::Object(overrides)) = (&mut merged, &value) {
            for (key, override_value) in overrides {
                target.insert(key.clone(), override_value.clone());
            }
        }
        let fields: DebugConfigFields =
            serde_json::from_value(merged).map_err(serde::de::Error::custom)?;
        Ok(fields.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_preset_from_empty_object() {
        let config: DebugConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, DebugConfig::default());
    }

    #[test]
    fn preset_with_overrides() {
        let config: DebugConfig = serde_json::from_value(json!({
            "preset": "production",
            "max_payload_length": 2000
        }))
        .unwrap();
        assert_eq!(config.sample_rate, 0.1);
        assert_eq!(config.max_payload_length, 2000);
        assert_eq!(config.min_severity, DebugSeverity::Info);
    }

    #[test]
    fn errors_only_filters_below_error() {
        let config = DebugConfig::errors_only();
        assert_eq!(config.min_severity, DebugSeverity::Error);
        assert!(!config.capture_inputs);
    }

    #[test]
    fn unknown_preset_falls_back_to_default() {
        let config: DebugConfig =
            serde_json::from_value(json!({"preset": "mystery"})).unwrap();
        assert_eq!(config, DebugConfig::default());
    }
}
