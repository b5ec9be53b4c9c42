//! Template rendering over JSON contexts.
//!
//! User-supplied templates (conditional routing expressions, parser bodies,
//! fetch URLs and payloads) are treated as opaque programs evaluated by Tera.
//! Compiled templates are cached process-wide, keyed by a hash of the
//! template source. Context values that look like JSON strings are parsed
//! before binding so upstream nodes can pass serialized structures without
//! ceremony.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use miette::Diagnostic;
use serde_json::{Map, Value};
use tera::Tera;
use thiserror::Error;

/// Global cache of compiled templates, keyed by source hash.
static TERA_CACHE: OnceLock<DashMap<u64, Arc<Tera>>> = OnceLock::new();

fn cache() -> &'static DashMap<u64, Arc<Tera>> {
    TERA_CACHE.get_or_init(DashMap::new)
}

fn hash_template(template: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    template.hash(&mut hasher);
    hasher.finish()
}

/// Errors produced while compiling or rendering a template.
#[derive(Debug, Error, Diagnostic)]
pub enum TemplateError {
    /// The template source does not parse.
    #[error("invalid template: {message}")]
    #[diagnostic(code(flowweave::template::compile))]
    Compile { message: String, template: String },

    /// Rendering failed (undefined variable, bad filter input, …).
    #[error("template render failed: {message}")]
    #[diagnostic(
        code(flowweave::template::render),
        help("Check that every variable the template references is wired into the node.")
    )]
    Render {
        message: String,
        template: String,
        available: Vec<String>,
    },
}

impl TemplateError {
    /// The offending template source.
    #[must_use]
    pub fn template(&self) -> &str {
        match self {
            TemplateError::Compile { template, .. } => template,
            TemplateError::Render { template, .. } => template,
        }
    }
}

fn compile(template: &str) -> Result<Arc<Tera>, TemplateError> {
    let key = hash_template(template);
    if let Some(cached) = cache().get(&key) {
        return Ok(Arc::clone(&cached));
    }
    let mut tera = Tera::default();
    tera.add_raw_template("template", template)
        .map_err(|e| TemplateError::Compile {
            message: e.to_string(),
            template: template.to_string(),
        })?;
    let tera = Arc::new(tera);
    cache().insert(key, Arc::clone(&tera));
    Ok(tera)
}

/// Parse a value that looks like a serialized JSON structure.
///
/// Strings whose trimmed form starts with `{` or `[` and parse cleanly are
/// replaced by their parsed value; everything else binds as-is.
#[must_use]
pub fn bind_value(value: &Value) -> Value {
    if let Value::String(s) = value {
        let trimmed = s.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(parsed) = serde_json::from_str::<Value>(s) {
                return parsed;
            }
        }
    }
    value.clone()
}

/// Render `template` against a key/value context.
pub fn render(template: &str, params: &Map<String, Value>) -> Result<String, TemplateError> {
    let tera = compile(template)?;
    let mut bound = Map::with_capacity(params.len());
    for (key, value) in params {
        bound.insert(key.clone(), bind_value(value));
    }
    let context = tera::Context::from_serialize(Value::Object(bound)).map_err(|e| {
        TemplateError::Render {
            message: e.to_string(),
            template: template.to_string(),
            available: params.keys().cloned().collect(),
        }
    })?;
    tera.render("template", &context)
        .map_err(|e| TemplateError::Render {
            message: flatten_tera_error(&e),
            template: template.to_string(),
            available: params.keys().cloned().collect(),
        })
}

/// Render against an arbitrary JSON value. Non-object contexts are exposed
/// under the key `value`, matching how conditionals treat primitive inputs.
pub fn render_with_value(template: &str, context: &Value) -> Result<String, TemplateError> {
    match context {
        Value::Object(map) => render(template, map),
        other => {
            let mut map = Map::with_capacity(1);
            map.insert("value".to_string(), other.clone());
            render(template, &map)
        }
    }
}

fn flatten_tera_error(error: &tera::Error) -> String {
    use std::error::Error as _;
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn renders_simple_substitution() {
        let out = render("Item: {{ item }}", &map(&[("item", json!("a"))])).unwrap();
        assert_eq!(out, "Item: a");
    }

    #[test]
    fn json_looking_strings_are_parsed_before_binding() {
        let params = map(&[("ctx", json!(r#"{"age": 16}"#))]);
        let out = render("{{ ctx.age }}", &params).unwrap();
        assert_eq!(out, "16");
    }

    #[test]
    fn length_filter_works_on_lists() {
        let params = map(&[("results", json!(["a", "b", "c"]))]);
        let out = render("Count: {{ results | length }}", &params).unwrap();
        assert_eq!(out, "Count: 3");
    }

    #[test]
    fn primitive_context_binds_as_value() {
        let out = render_with_value(
            "{% if value >= 18 %}adult{% else %}minor{% endif %}",
            &json!(16),
        )
        .unwrap();
        assert_eq!(out, "minor");
    }

    #[test]
    fn bad_syntax_is_a_compile_error() {
        let err = render("{% if %}", &Map::new()).unwrap_err();
        assert!(matches!(err, TemplateError::Compile { .. }));
    }

    #[test]
    fn render_error_reports_available_keys() {
        let params = map(&[("present", json!(1))]);
        let err = render("{{ missing.field }}", &params).unwrap_err();
        match err {
            TemplateError::Render { available, .. } => {
                assert_eq!(available, vec!["present".to_string()]);
            }
            other => panic!("expected render error, got {other:?}"),
        }
    }

    #[test]
    fn cache_returns_same_compiled_template() {
        let t = "cached: {{ x }}";
        let _ = render(t, &map(&[("x", json!(1))])).unwrap();
        let key = hash_template(t);
        assert!(cache().contains_key(&key));
    }
}
