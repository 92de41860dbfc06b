// Copyright 2026 GPU Autoscaler Working Group

//! Query registry and `{{param}}`-style template rendering.
//!
//! Queries are registered once at startup and live for the process; render
//! is pure and side-effect free (spec §4.1).

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Delimiter sequence a parameter value may not contain — it would let a
/// parameter value close a label matcher or splice in extra query syntax.
const DELIMITER: &str = "{{";

/// Whether a query template is a bare metric name or a full expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QueryKind {
    /// A bare metric name, e.g. `vllm_kv_cache_usage`.
    Metric,
    /// A full templated expression, e.g. `sum(rate(foo{{ns}}[5m]))`.
    Expression,
}

/// An immutable, named, parameterized query template.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueryTemplate {
    /// Unique name used to look the template up by callers.
    pub name: String,
    /// Bare metric or full expression.
    pub kind: QueryKind,
    /// Template body containing `{{param}}` placeholders.
    pub body: String,
    /// Parameters that must be supplied to [`QueryRegistry::render`].
    pub required_params: Vec<String>,
    /// Per-query TTL override for cached results. `None` uses the source default.
    pub ttl: Option<chrono::Duration>,
    /// Human-readable description.
    pub description: String,
}

fn placeholders(body: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        if let Some(end) = after_open.find("}}") {
            found.push(after_open[..end].trim().to_string());
            rest = &after_open[end + 2..];
        } else {
            break;
        }
    }
    found
}

/// Holds named query templates so higher layers can look them up by name.
///
/// Writes only happen at startup; reads are lock-free thereafter (spec §5).
#[derive(Debug, Default)]
pub struct QueryRegistry {
    templates: DashMap<String, QueryTemplate>,
}

impl QueryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    /// Register a template. Fails if the name is already taken or the
    /// required-parameter list doesn't match the placeholders found in the
    /// body.
    pub fn register(&self, template: QueryTemplate) -> Result<()> {
        if self.templates.contains_key(&template.name) {
            return Err(Error::Config(format!(
                "duplicate query template name '{}'",
                template.name
            )));
        }
        let found = placeholders(&template.body);
        let mut found_sorted = found.clone();
        found_sorted.sort();
        found_sorted.dedup();
        let mut required_sorted = template.required_params.clone();
        required_sorted.sort();
        required_sorted.dedup();
        if found_sorted != required_sorted {
            return Err(Error::Template(format!(
                "query '{}': declared required params {:?} do not match placeholders found in body {:?}",
                template.name, required_sorted, found_sorted
            )));
        }
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    /// Render a registered template against a parameter map. Missing required
    /// parameters yield [`Error::ParamMissing`].
    pub fn render(&self, name: &str, params: &BTreeMap<String, String>) -> Result<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| Error::Config(format!("unknown query template '{name}'")))?;
        let mut rendered = template.body.clone();
        for param in &template.required_params {
            let value = params.get(param).ok_or_else(|| Error::ParamMissing {
                query: name.to_string(),
                param: param.clone(),
            })?;
            if value.contains(DELIMITER) {
                return Err(Error::Template(format!(
                    "parameter '{param}' for query '{name}' contains the delimiter sequence '{{{{' and was rejected"
                )));
            }
            let escaped = escape(value);
            rendered = rendered.replace(&format!("{{{{{param}}}}}"), &escaped);
        }
        Ok(rendered)
    }

    /// Look up a registered template by name.
    pub fn get(&self, name: &str) -> Option<QueryTemplate> {
        self.templates.get(name).map(|entry| entry.clone())
    }

    /// Names of all registered templates.
    pub fn names(&self) -> Vec<String> {
        self.templates.iter().map(|e| e.key().clone()).collect()
    }
}

/// Canonical query-template names the reconciliation engine refreshes every
/// cycle (spec §4.6 step 2).
pub const KV_CACHE_PER_POD: &str = "kv-cache-per-pod";
/// Canonical query-template name for per-pod queue depth.
pub const QUEUE_LENGTH_PER_POD: &str = "queue-length-per-pod";

/// Register the two standard vLLM-style PromQL templates the reconciliation
/// engine expects to find on every source: per-pod KV-cache utilization and
/// per-pod queue depth, both grouped by the `pod` label and filtered by
/// `namespace` and `model`.
pub fn register_default_queries(registry: &QueryRegistry) -> Result<()> {
    registry.register(QueryTemplate {
        name: KV_CACHE_PER_POD.to_string(),
        kind: QueryKind::Expression,
        body: "avg by (pod) (vllm:gpu_cache_usage_perc{namespace=\"{{namespace}}\",model_name=\"{{model}}\"})".to_string(),
        required_params: vec!["namespace".to_string(), "model".to_string()],
        ttl: None,
        description: "Per-pod KV-cache utilization ratio in [0, 1]".to_string(),
    })?;
    registry.register(QueryTemplate {
        name: QUEUE_LENGTH_PER_POD.to_string(),
        kind: QueryKind::Expression,
        body: "sum by (pod) (vllm:num_requests_waiting{namespace=\"{{namespace}}\",model_name=\"{{model}}\"})".to_string(),
        required_params: vec!["namespace".to_string(), "model".to_string()],
        ttl: None,
        description: "Per-pod count of requests waiting in the scheduler queue".to_string(),
    })?;
    Ok(())
}

/// Escape a parameter value for safe substitution into a label matcher.
/// Backslashes and double quotes are escaped so a value cannot close a
/// quoted label matcher early.
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
