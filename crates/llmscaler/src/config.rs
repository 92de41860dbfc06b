// Copyright 2026 GPU Autoscaler Working Group

//! Process-wide configuration and per-model saturation threshold resolution.
//!
//! [`AppConfig`] is loaded once at startup from a TOML or YAML file and
//! overridden by a small set of named environment variables. It's a
//! different concern from [`SaturationConfigResolver`], which resolves the
//! business thresholds one model should be judged against — those can
//! change per model and are looked up every cycle.

use crate::error::{Error, Result};
use crate::managed_resource::ManagedResourceSpec;
use crate::types::SaturationConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`AppConfig::metrics_listen_addr`].
pub const ENV_METRICS_LISTEN_ADDR: &str = "LLMSCALER_METRICS_LISTEN_ADDR";
/// Environment variable overriding [`AppConfig::poll_interval_secs`].
pub const ENV_POLL_INTERVAL_SECS: &str = "LLMSCALER_POLL_INTERVAL_SECS";

/// Connection and timing parameters for one telemetry source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfigSpec {
    /// Name the source is registered under.
    pub name: String,
    /// Base URL of the Prometheus-compatible query endpoint.
    pub prometheus_url: String,
    /// Name of an environment variable holding a bearer token, if auth is required.
    pub bearer_token_env: Option<String>,
    /// Per-query timeout, in seconds.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Age below which a sample is considered fresh, in seconds.
    #[serde(default = "default_freshness_floor_secs")]
    pub freshness_floor_secs: i64,
    /// Age beyond which a sample is abandoned rather than used stale, in seconds.
    #[serde(default = "default_abandon_ceiling_secs")]
    pub abandon_ceiling_secs: i64,
}

impl SourceConfigSpec {
    /// Per-query timeout as a [`Duration`].
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Freshness floor as a [`chrono::Duration`].
    pub fn freshness_floor(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.freshness_floor_secs)
    }

    /// Abandon ceiling as a [`chrono::Duration`].
    pub fn abandon_ceiling(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.abandon_ceiling_secs)
    }
}

fn default_query_timeout_secs() -> u64 {
    5
}

fn default_freshness_floor_secs() -> i64 {
    30
}

fn default_abandon_ceiling_secs() -> i64 {
    300
}

fn default_metrics_listen_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_poll_interval_secs() -> u64 {
    15
}

/// One per-model saturation threshold override, filtered by model id and namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaturationOverride {
    /// Model this override applies to.
    pub model_id: String,
    /// Namespace this override applies to.
    pub namespace: String,
    /// The thresholds to use instead of the process-wide default.
    #[serde(flatten)]
    pub config: SaturationConfig,
}

/// Process-wide configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the `/metrics` and `/healthz` server binds to.
    #[serde(default = "default_metrics_listen_addr")]
    pub metrics_listen_addr: String,
    /// How often each managed resource's reconcile loop polls, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Telemetry sources to register at startup.
    #[serde(default)]
    pub sources: Vec<SourceConfigSpec>,
    /// Default saturation thresholds, used when a model has no override.
    pub default_saturation: SaturationConfig,
    /// Per-model saturation threshold overrides, filtered by model id and namespace.
    #[serde(default)]
    pub saturation_overrides: Vec<SaturationOverride>,
    /// Models to reconcile, each polled on its own task.
    #[serde(default)]
    pub managed_resources: Vec<ManagedResourceSpec>,
}

impl AppConfig {
    /// Load configuration from a TOML or YAML file, selected by extension,
    /// then apply environment variable overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {path:?}: {e}")))?;
        let mut config: AppConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("invalid TOML config: {e}")))?,
            Some("yaml") | Some("yml") => serde_yml::from_str(&contents)
                .map_err(|e| Error::Config(format!("invalid YAML config: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config file extension: {other:?}"
                )))
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var(ENV_METRICS_LISTEN_ADDR) {
            self.metrics_listen_addr = addr;
        }
        if let Ok(secs) = std::env::var(ENV_POLL_INTERVAL_SECS) {
            if let Ok(parsed) = secs.parse() {
                self.poll_interval_secs = parsed;
            } else {
                tracing::warn!(value = %secs, "ignoring non-numeric {}", ENV_POLL_INTERVAL_SECS);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        self.default_saturation.validate()?;
        for over in &self.saturation_overrides {
            over.config.validate().map_err(|e| {
                Error::Config(format!(
                    "invalid saturation override for model '{}' namespace '{}': {e}",
                    over.model_id, over.namespace
                ))
            })?;
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Build the [`SaturationConfigResolver`] implied by this configuration.
    pub fn saturation_resolver(&self) -> SaturationConfigResolver {
        SaturationConfigResolver::new(self.default_saturation, self.saturation_overrides.clone())
    }
}

/// Resolves the effective [`SaturationConfig`] for a model: a per-model,
/// per-namespace override if one exists, otherwise the process-wide default.
/// Two models sharing an id across different namespaces resolve
/// independently.
#[derive(Debug, Clone)]
pub struct SaturationConfigResolver {
    default: SaturationConfig,
    overrides: BTreeMap<(String, String), SaturationConfig>,
}

impl SaturationConfigResolver {
    /// Build a resolver from a default and a set of per-model overrides.
    pub fn new(default: SaturationConfig, overrides: Vec<SaturationOverride>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|over| ((over.model_id, over.namespace), over.config))
            .collect();
        Self { default, overrides }
    }

    /// Resolve the effective configuration for `model_id` in `namespace`.
    pub fn resolve(&self, model_id: &str, namespace: &str) -> SaturationConfig {
        self.overrides
            .get(&(model_id.to_string(), namespace.to_string()))
            .copied()
            .unwrap_or(self.default)
    }

    /// Insert or replace the override for a model in a namespace.
    pub fn set_override(
        &mut self,
        model_id: impl Into<String>,
        namespace: impl Into<String>,
        config: SaturationConfig,
    ) {
        self.overrides.insert((model_id.into(), namespace.into()), config);
    }
}
