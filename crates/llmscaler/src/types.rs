// Copyright 2026 GPU Autoscaler Working Group

//! Data model shared across the decision engine.
//!
//! Replica metrics, analyses, and decisions are created fresh every
//! reconcile cycle and dropped at the end of it — nothing here is meant to
//! outlive a single cycle except the values cached in [`crate::cache`].

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Freshness classification for a telemetry sample, per spec §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FreshnessStatus {
    /// `age < freshness_floor`.
    Fresh,
    /// `freshness_floor <= age < abandon_ceiling`.
    Stale,
    /// No entry, expired beyond the ceiling, or no label for this pod.
    Unavailable,
}

/// One sample per replica per cycle.
///
/// Owned by the analyzer's input; created fresh each cycle and never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReplicaMetric {
    /// Pod identifier (e.g. `model-a100-7f9c-abcde`).
    pub pod_name: String,
    /// Deployment/variant name serving this replica.
    pub variant: String,
    /// Logical model identifier served by this variant.
    pub model_id: String,
    /// Kubernetes (or equivalent) namespace.
    pub namespace: String,
    /// Accelerator class, e.g. `a100`, `h100`.
    pub accelerator: String,
    /// Cost per replica per unit time. Always positive.
    pub cost_per_replica: f64,
    /// KV-cache usage in `[0, 1]`.
    pub kv_cache_usage: f64,
    /// Queue length, non-negative.
    pub queue_length: u64,
    /// Timestamp the sample was captured, if known.
    pub sampled_at: Option<DateTime<Utc>>,
    /// Age of the sample at the time it was read from the cache.
    pub age: Option<chrono::Duration>,
    /// Freshness classification at read time.
    pub freshness: Option<FreshnessStatus>,
}

impl ReplicaMetric {
    /// True iff `kv_cache_usage >= config.kv_threshold || queue_length >= config.queue_threshold`.
    pub fn is_saturated(&self, config: &SaturationConfig) -> bool {
        self.kv_cache_usage >= config.kv_threshold
            || (self.queue_length as f64) >= config.queue_threshold
    }
}

/// A label map plus scalar value produced by one query execution.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricSample {
    /// Label set. Includes a `pod` label when the underlying query groups by pod.
    pub labels: BTreeMap<String, String>,
    /// Scalar value for this label set.
    pub value: f64,
}

/// A list of `(labels, value)` pairs returned by one query execution.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricResult {
    /// Samples returned by the query.
    pub samples: Vec<MetricSample>,
}

impl MetricResult {
    /// Look up the sample whose `pod` label equals `pod_name`.
    pub fn sample_for_pod(&self, pod_name: &str) -> Option<&MetricSample> {
        self.samples
            .iter()
            .find(|s| s.labels.get("pod").map(String::as_str) == Some(pod_name))
    }
}

/// Per-variant thresholds governing the saturation predicate and scale-up
/// trigger.
///
/// Invariants (checked by [`SaturationConfig::validate`]):
/// `kv_spare_trigger < kv_threshold` and `queue_spare_trigger < queue_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SaturationConfig {
    /// KV-cache utilization threshold, in `(0, 1]`.
    pub kv_threshold: f64,
    /// Queue-length threshold, positive.
    pub queue_threshold: f64,
    /// Minimum average spare KV-capacity before scale-up triggers, `>= 0`.
    pub kv_spare_trigger: f64,
    /// Minimum average spare queue slots before scale-up triggers, `>= 0`.
    pub queue_spare_trigger: f64,
}

impl SaturationConfig {
    /// Validate the threshold/trigger invariants.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !(self.kv_threshold > 0.0 && self.kv_threshold <= 1.0) {
            return Err(crate::error::Error::Config(format!(
                "kv_threshold must be in (0, 1], got {}",
                self.kv_threshold
            )));
        }
        if self.queue_threshold <= 0.0 {
            return Err(crate::error::Error::Config(format!(
                "queue_threshold must be positive, got {}",
                self.queue_threshold
            )));
        }
        if self.kv_spare_trigger < 0.0 {
            return Err(crate::error::Error::Config(
                "kv_spare_trigger must be >= 0".to_string(),
            ));
        }
        if self.queue_spare_trigger < 0.0 {
            return Err(crate::error::Error::Config(
                "queue_spare_trigger must be >= 0".to_string(),
            ));
        }
        if self.kv_spare_trigger >= self.kv_threshold {
            return Err(crate::error::Error::Config(format!(
                "kv_spare_trigger ({}) must be < kv_threshold ({})",
                self.kv_spare_trigger, self.kv_threshold
            )));
        }
        if self.queue_spare_trigger >= self.queue_threshold {
            return Err(crate::error::Error::Config(format!(
                "queue_spare_trigger ({}) must be < queue_threshold ({})",
                self.queue_spare_trigger, self.queue_threshold
            )));
        }
        Ok(())
    }
}

/// Per-variant spare-capacity and saturation statistics for one cycle.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VariantSaturationAnalysis {
    /// Variant (deployment) name.
    pub variant: String,
    /// Accelerator class shared by all replicas in this variant.
    pub accelerator: String,
    /// Cost per replica shared by all replicas in this variant.
    pub cost_per_replica: f64,
    /// Number of replicas observed this cycle.
    pub replica_count: usize,
    /// Number of replicas that were *not* saturated.
    pub non_saturated_count: usize,
    /// Maximum KV-cache usage observed across all replicas in this variant.
    pub max_kv_cache: f64,
    /// Maximum queue length observed across all replicas in this variant.
    pub max_queue_length: u64,
    /// Average spare KV-capacity over non-saturated replicas (0 if none).
    pub avg_spare_kv: f64,
    /// Average spare queue slots over non-saturated replicas (0 if none).
    pub avg_spare_queue: f64,
    /// Pod names classified saturated this cycle.
    pub saturated_pods: BTreeSet<String>,
}

/// Per-model aggregate analysis produced by [`crate::analyzer::analyze`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelSaturationAnalysis {
    /// Logical model identifier.
    pub model_id: String,
    /// Namespace the model is served in.
    pub namespace: String,
    /// When this analysis was produced.
    pub analyzed_at: DateTime<Utc>,
    /// Total replicas across all variants.
    pub total_replicas: usize,
    /// Total non-saturated replicas across all variants.
    pub non_saturated_count: usize,
    /// Weighted average spare KV-capacity across non-saturated replicas.
    pub avg_spare_kv: f64,
    /// Weighted average spare queue slots across non-saturated replicas.
    pub avg_spare_queue: f64,
    /// Whether the model should scale up this cycle.
    pub should_scale_up: bool,
    /// Human-readable reason for the scale-up verdict.
    pub scale_up_reason: String,
    /// Whether scaling down by one replica is currently safe.
    pub scale_down_safe: bool,
    /// Per-variant analyses, keyed by variant name for deterministic iteration.
    pub variants: BTreeMap<String, VariantSaturationAnalysis>,
}

/// Observed deployment state for one variant, rebuilt each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VariantReplicaState {
    /// Current replica count (spec).
    pub current: u32,
    /// Replicas that are ready and serving traffic.
    pub ready: u32,
    /// Previously published target, or 0 if none has ever been published.
    pub desired: u32,
}

impl VariantReplicaState {
    /// Replicas that exist but are not yet ready: `current - ready`.
    pub fn pending(&self) -> u32 {
        self.current.saturating_sub(self.ready)
    }
}

/// Action selected for one variant in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScaleAction {
    /// Target replicas increased by one.
    ScaleUp,
    /// Target replicas decreased by one.
    ScaleDown,
    /// Target replicas unchanged.
    NoChange,
}

/// The published record for one variant in one cycle.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VariantDecision {
    /// Variant (deployment) name.
    pub variant: String,
    /// Namespace the variant runs in.
    pub namespace: String,
    /// Logical model identifier served by this variant.
    pub model_id: String,
    /// Accelerator class.
    pub accelerator: String,
    /// Cost per replica.
    pub cost_per_replica: f64,
    /// Action taken this cycle.
    pub action: ScaleAction,
    /// Current (spec) replica count before this decision.
    pub current_replicas: u32,
    /// Target replica count published this cycle.
    pub target_replicas: u32,
    /// Previously published target, if any.
    pub previous_desired: u32,
    /// Human-readable reason for the decision.
    pub reason: String,
    /// Whether this decision was driven by the saturation analysis (as
    /// opposed to, e.g., preservation of an in-flight target).
    pub saturation_based: bool,
    /// When the decision was made.
    pub decided_at: DateTime<Utc>,
}
