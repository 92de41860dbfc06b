// Copyright 2026 GPU Autoscaler Working Group

//! Pure saturation analysis: turns a batch of [`ReplicaMetric`]s into a
//! [`ModelSaturationAnalysis`]. No I/O, no clock reads beyond stamping
//! `analyzed_at`.
//!
//! Model-level spare capacity is the replica-count-weighted average of each
//! variant's spare capacity, not a simple mean across variants. A variant
//! with many non-saturated replicas dominates the average even when another
//! variant is fully saturated — this makes the scale-up verdict
//! conservative rather than trigger-happy when only one of several variants
//! is under pressure.

use crate::types::{
    ModelSaturationAnalysis, ReplicaMetric, SaturationConfig, VariantSaturationAnalysis,
};
use chrono::Utc;
use std::collections::BTreeMap;

/// A hypothetical scale-down must leave at least this many non-saturated
/// replicas standing for the simulation in [`scale_down_safety`] to even be
/// attempted.
const MIN_NON_SATURATED_AFTER_SCALE_DOWN: usize = 2;

/// Analyze one model's replicas against a shared saturation configuration.
pub fn analyze(
    model_id: &str,
    namespace: &str,
    metrics: &[ReplicaMetric],
    config: &SaturationConfig,
) -> ModelSaturationAnalysis {
    let mut by_variant: BTreeMap<String, Vec<&ReplicaMetric>> = BTreeMap::new();
    for metric in metrics {
        by_variant.entry(metric.variant.clone()).or_default().push(metric);
    }

    let mut variants = BTreeMap::new();
    for (variant, replicas) in &by_variant {
        variants.insert(variant.clone(), analyze_variant(variant, replicas, config));
    }

    let total_replicas = metrics.len();
    let non_saturated_count: usize = variants.values().map(|v| v.non_saturated_count).sum();

    let (avg_spare_kv, avg_spare_queue) = weighted_model_spare(&variants);

    let (should_scale_up, scale_up_reason) = scale_up_verdict(
        total_replicas,
        non_saturated_count,
        avg_spare_kv,
        avg_spare_queue,
        config,
    );

    let scale_down_safe = scale_down_safety(metrics, config);

    ModelSaturationAnalysis {
        model_id: model_id.to_string(),
        namespace: namespace.to_string(),
        analyzed_at: Utc::now(),
        total_replicas,
        non_saturated_count,
        avg_spare_kv,
        avg_spare_queue,
        should_scale_up,
        scale_up_reason,
        scale_down_safe,
        variants,
    }
}

fn analyze_variant(
    variant: &str,
    replicas: &[&ReplicaMetric],
    config: &SaturationConfig,
) -> VariantSaturationAnalysis {
    let replica_count = replicas.len();
    let mut non_saturated_count = 0usize;
    let mut max_kv_cache = 0.0f64;
    let mut max_queue_length = 0u64;
    let mut spare_kv_sum = 0.0f64;
    let mut spare_queue_sum = 0.0f64;
    let mut saturated_pods = std::collections::BTreeSet::new();

    let accelerator = replicas
        .first()
        .map(|r| r.accelerator.clone())
        .unwrap_or_default();
    let cost_per_replica = replicas.first().map(|r| r.cost_per_replica).unwrap_or(0.0);

    for replica in replicas {
        max_kv_cache = max_kv_cache.max(replica.kv_cache_usage);
        max_queue_length = max_queue_length.max(replica.queue_length);
        if replica.is_saturated(config) {
            saturated_pods.insert(replica.pod_name.clone());
        } else {
            non_saturated_count += 1;
            spare_kv_sum += config.kv_threshold - replica.kv_cache_usage;
            spare_queue_sum += config.queue_threshold - replica.queue_length as f64;
        }
    }

    let avg_spare_kv = if non_saturated_count > 0 {
        spare_kv_sum / non_saturated_count as f64
    } else {
        0.0
    };
    let avg_spare_queue = if non_saturated_count > 0 {
        spare_queue_sum / non_saturated_count as f64
    } else {
        0.0
    };

    VariantSaturationAnalysis {
        variant: variant.to_string(),
        accelerator,
        cost_per_replica,
        replica_count,
        non_saturated_count,
        max_kv_cache,
        max_queue_length,
        avg_spare_kv,
        avg_spare_queue,
        saturated_pods,
    }
}

/// Weight each variant's spare-capacity figures by its non-saturated replica
/// count, so variants contribute in proportion to how much headroom they
/// actually have to report.
fn weighted_model_spare(variants: &BTreeMap<String, VariantSaturationAnalysis>) -> (f64, f64) {
    let total_weight: usize = variants.values().map(|v| v.non_saturated_count).sum();
    if total_weight == 0 {
        return (0.0, 0.0);
    }
    let kv_sum: f64 = variants
        .values()
        .map(|v| v.avg_spare_kv * v.non_saturated_count as f64)
        .sum();
    let queue_sum: f64 = variants
        .values()
        .map(|v| v.avg_spare_queue * v.non_saturated_count as f64)
        .sum();
    (kv_sum / total_weight as f64, queue_sum / total_weight as f64)
}

/// Simulate removing one replica's worth of load from the non-saturated pool
/// and check whether the resulting average would still clear both spare
/// triggers.
///
/// The simulation pools load across the whole model rather than per variant:
/// total KV and queue load across every non-saturated replica, divided by
/// one fewer replica than are currently carrying it.
fn scale_down_safety(metrics: &[ReplicaMetric], config: &SaturationConfig) -> bool {
    let non_saturated: Vec<&ReplicaMetric> = metrics.iter().filter(|m| !m.is_saturated(config)).collect();
    let remaining_after = non_saturated.len().saturating_sub(1);
    if non_saturated.is_empty() || remaining_after < MIN_NON_SATURATED_AFTER_SCALE_DOWN {
        return false;
    }

    let total_kv: f64 = non_saturated.iter().map(|m| m.kv_cache_usage).sum();
    let total_queue: f64 = non_saturated.iter().map(|m| m.queue_length as f64).sum();
    let new_avg_kv = total_kv / remaining_after as f64;
    let new_avg_queue = total_queue / remaining_after as f64;

    (config.kv_threshold - new_avg_kv) >= config.kv_spare_trigger
        && (config.queue_threshold - new_avg_queue) >= config.queue_spare_trigger
}

fn scale_up_verdict(
    total_replicas: usize,
    non_saturated_count: usize,
    avg_spare_kv: f64,
    avg_spare_queue: f64,
    config: &SaturationConfig,
) -> (bool, String) {
    if total_replicas == 0 {
        return (false, "no replicas observed".to_string());
    }
    if non_saturated_count == 0 {
        return (true, "all replicas saturated".to_string());
    }
    if avg_spare_kv < config.kv_spare_trigger {
        return (
            true,
            format!(
                "average spare kv-cache {avg_spare_kv:.3} below trigger {:.3}",
                config.kv_spare_trigger
            ),
        );
    }
    if avg_spare_queue < config.queue_spare_trigger {
        return (
            true,
            format!(
                "average spare queue capacity {avg_spare_queue:.3} below trigger {:.3}",
                config.queue_spare_trigger
            ),
        );
    }
    (false, "sufficient spare capacity".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SaturationConfig {
        SaturationConfig {
            kv_threshold: 0.8,
            queue_threshold: 10.0,
            kv_spare_trigger: 0.1,
            queue_spare_trigger: 1.0,
        }
    }

    fn replica(variant: &str, pod: &str, kv: f64, queue: u64, cost: f64) -> ReplicaMetric {
        ReplicaMetric {
            pod_name: pod.to_string(),
            variant: variant.to_string(),
            model_id: "m1".to_string(),
            namespace: "ns".to_string(),
            accelerator: "a100".to_string(),
            cost_per_replica: cost,
            kv_cache_usage: kv,
            queue_length: queue,
            sampled_at: None,
            age: None,
            freshness: None,
        }
    }

    #[test]
    fn empty_metrics_never_scale_up() {
        let analysis = analyze("m1", "ns", &[], &config());
        assert!(!analysis.should_scale_up);
        assert_eq!(analysis.total_replicas, 0);
    }

    #[test]
    fn all_saturated_triggers_scale_up() {
        let metrics = vec![
            replica("v1", "p1", 0.9, 1, 10.0),
            replica("v1", "p2", 0.95, 0, 10.0),
        ];
        let analysis = analyze("m1", "ns", &metrics, &config());
        assert!(analysis.should_scale_up);
        assert_eq!(analysis.non_saturated_count, 0);
    }

    #[test]
    fn low_spare_capacity_triggers_scale_up() {
        let metrics = vec![replica("v1", "p1", 0.75, 0, 10.0)];
        let analysis = analyze("m1", "ns", &metrics, &config());
        // spare_kv = 0.8 - 0.75 = 0.05 < trigger 0.1
        assert!(analysis.should_scale_up);
    }

    #[test]
    fn ample_spare_capacity_does_not_scale_up() {
        let metrics = vec![replica("v1", "p1", 0.1, 0, 10.0)];
        let analysis = analyze("m1", "ns", &metrics, &config());
        assert!(!analysis.should_scale_up);
    }

    #[test]
    fn weighted_aggregation_is_conservative_when_one_variant_saturates() {
        // v1 has 9 comfortable replicas, v2 has 1 fully saturated replica.
        // The saturated variant shouldn't dominate the model-level average.
        let mut metrics: Vec<ReplicaMetric> = (0..9)
            .map(|i| replica("v1", &format!("v1-{i}"), 0.1, 0, 10.0))
            .collect();
        metrics.push(replica("v2", "v2-0", 0.95, 0, 20.0));
        let analysis = analyze("m1", "ns", &metrics, &config());
        assert!(!analysis.should_scale_up, "{:?}", analysis.scale_up_reason);
        assert_eq!(analysis.variants.len(), 2);
        assert_eq!(analysis.variants["v2"].non_saturated_count, 0);
    }

    #[test]
    fn scale_down_unsafe_with_too_few_non_saturated_replicas() {
        let metrics = vec![replica("v1", "p1", 0.1, 0, 10.0)];
        let analysis = analyze("m1", "ns", &metrics, &config());
        assert!(!analysis.scale_down_safe);
    }

    #[test]
    fn scale_down_safe_with_enough_non_saturated_replicas() {
        let metrics: Vec<ReplicaMetric> = (0..4)
            .map(|i| replica("v1", &format!("p{i}"), 0.1, 0, 10.0))
            .collect();
        let analysis = analyze("m1", "ns", &metrics, &config());
        assert!(analysis.scale_down_safe);
    }

    #[test]
    fn scale_down_blocked_by_minimum_replica_count() {
        // Scenario B: two non-saturated replicas, simulation would leave
        // only one standing, below the minimum of two.
        let scenario_config = SaturationConfig {
            kv_threshold: 0.8,
            queue_threshold: 5.0,
            kv_spare_trigger: 0.1,
            queue_spare_trigger: 2.0,
        };
        let metrics = vec![
            replica("v1", "p1", 0.3, 0, 10.0),
            replica("v1", "p2", 0.3, 0, 10.0),
        ];
        let analysis = analyze("m1", "ns", &metrics, &scenario_config);
        assert!(!analysis.scale_down_safe);
    }

    #[test]
    fn analyze_is_idempotent_over_identical_input() {
        let metrics = vec![
            replica("v1", "p1", 0.75, 1, 10.0),
            replica("v1", "p2", 0.72, 0, 10.0),
        ];
        let cfg = config();
        let first = analyze("m1", "ns", &metrics, &cfg);
        let second = analyze("m1", "ns", &metrics, &cfg);
        assert_eq!(first.should_scale_up, second.should_scale_up);
        assert_eq!(first.scale_down_safe, second.scale_down_safe);
        assert_eq!(first.avg_spare_kv, second.avg_spare_kv);
        assert_eq!(first.avg_spare_queue, second.avg_spare_queue);
        assert_eq!(first.variants, second.variants);
    }

    #[test]
    fn saturation_predicate_is_monotonic_in_kv_cache() {
        let cfg = config();
        let low = replica("v1", "p1", 0.5, 0, 10.0);
        assert!(!low.is_saturated(&cfg));
        let mut raised = low.clone();
        raised.kv_cache_usage = 0.95;
        assert!(raised.is_saturated(&cfg));
        // Once saturated, raising the metric further must never flip back.
        raised.kv_cache_usage = 1.0;
        assert!(raised.is_saturated(&cfg));
    }

    #[test]
    fn saturation_predicate_is_monotonic_in_queue_length() {
        let cfg = config();
        let low = replica("v1", "p1", 0.1, 2, 10.0);
        assert!(!low.is_saturated(&cfg));
        let mut raised = low.clone();
        raised.queue_length = 10;
        assert!(raised.is_saturated(&cfg));
        raised.queue_length = 50;
        assert!(raised.is_saturated(&cfg));
    }

    #[test]
    fn scale_down_blocked_when_remaining_average_would_cross_trigger() {
        // Enough replicas to pass the minimum-count gate, but the simulated
        // post-removal average leaves too little spare capacity.
        let metrics = vec![
            replica("v1", "p1", 0.78, 0, 10.0),
            replica("v1", "p2", 0.78, 0, 10.0),
            replica("v1", "p3", 0.78, 0, 10.0),
        ];
        let analysis = analyze("m1", "ns", &metrics, &config());
        // total_kv = 2.34, remaining_after = 2 -> new_avg_kv = 1.17, way over threshold.
        assert!(!analysis.scale_down_safe);
    }
}
