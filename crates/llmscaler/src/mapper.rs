// Copyright 2026 GPU Autoscaler Working Group

//! Joins known pod identity against raw metric samples to produce
//! [`ReplicaMetric`]s.
//!
//! The mapper holds no telemetry itself — it's handed a pair of
//! [`SourceReading`]s (kv-cache and queue-length) each cycle and combines
//! them with the static pod roster it's been told about. A pod with no
//! roster entry is invisible to the analyzer; a pod with a roster entry but
//! no sample in either reading is reported with `Unavailable` freshness
//! rather than dropped, so the caller can decide what to do with it.

use crate::metrics_source::SourceReading;
use crate::types::{FreshnessStatus, ReplicaMetric};
use dashmap::DashMap;

/// Static identity for one replica pod, independent of any telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct PodInfo {
    /// Deployment/variant name serving this pod.
    pub variant: String,
    /// Logical model identifier served by this variant.
    pub model_id: String,
    /// Namespace the pod runs in.
    pub namespace: String,
    /// Accelerator class.
    pub accelerator: String,
    /// Cost per replica per unit time.
    pub cost_per_replica: f64,
}

/// Worst of two freshness classifications: `Unavailable` dominates `Stale`
/// dominates `Fresh`.
fn worse(a: FreshnessStatus, b: FreshnessStatus) -> FreshnessStatus {
    use FreshnessStatus::*;
    match (a, b) {
        (Unavailable, _) | (_, Unavailable) => Unavailable,
        (Stale, _) | (_, Stale) => Stale,
        (Fresh, Fresh) => Fresh,
    }
}

/// Maps pod names to variant/model identity and joins them against metric
/// readings.
#[derive(Debug, Default)]
pub struct VariantMapper {
    pods: DashMap<String, PodInfo>,
}

impl VariantMapper {
    /// Create an empty mapper.
    pub fn new() -> Self {
        Self {
            pods: DashMap::new(),
        }
    }

    /// Register or update a pod's static identity.
    pub fn upsert_pod(&self, pod_name: impl Into<String>, info: PodInfo) {
        self.pods.insert(pod_name.into(), info);
    }

    /// Remove a pod from the roster, e.g. once it's been torn down.
    pub fn remove_pod(&self, pod_name: &str) {
        self.pods.remove(pod_name);
    }

    /// Number of pods currently on the roster.
    pub fn len(&self) -> usize {
        self.pods.len()
    }

    /// Whether the roster is currently empty.
    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }

    /// Build one [`ReplicaMetric`] per rostered pod, joining it against the
    /// kv-cache and queue-length readings for this cycle.
    pub fn build_replica_metrics(
        &self,
        kv: &SourceReading,
        queue: &SourceReading,
    ) -> Vec<ReplicaMetric> {
        self.pods
            .iter()
            .map(|entry| {
                let pod_name = entry.key().clone();
                let info = entry.value().clone();

                let kv_sample = kv
                    .result
                    .as_ref()
                    .and_then(|r| r.sample_for_pod(&pod_name));
                let queue_sample = queue
                    .result
                    .as_ref()
                    .and_then(|r| r.sample_for_pod(&pod_name));

                let kv_freshness = if kv_sample.is_some() {
                    kv.freshness
                } else {
                    FreshnessStatus::Unavailable
                };
                let queue_freshness = if queue_sample.is_some() {
                    queue.freshness
                } else {
                    FreshnessStatus::Unavailable
                };
                let freshness = worse(kv_freshness, queue_freshness);

                let age = match (kv.age, queue.age) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (Some(a), None) => Some(a),
                    (None, Some(b)) => Some(b),
                    (None, None) => None,
                };

                ReplicaMetric {
                    pod_name,
                    variant: info.variant,
                    model_id: info.model_id,
                    namespace: info.namespace,
                    accelerator: info.accelerator,
                    cost_per_replica: info.cost_per_replica,
                    kv_cache_usage: kv_sample.map(|s| s.value).unwrap_or(0.0),
                    queue_length: queue_sample.map(|s| s.value.max(0.0) as u64).unwrap_or(0),
                    sampled_at: kv.captured_at.or(queue.captured_at),
                    age,
                    freshness: Some(freshness),
                }
            })
            .collect()
    }
}
