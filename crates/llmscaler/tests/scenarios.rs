// Copyright 2026 GPU Autoscaler Working Group

//! End-to-end coverage of the analyzer + selector pipeline against the
//! worked scenarios used to validate the saturation-driven decision engine.
//! Each test builds replica metrics and deployment state by hand, runs them
//! through `analyzer::analyze` and `selector::select_targets` together, and
//! checks the resulting target replica counts.

#![allow(clippy::unwrap_used)]

use llmscaler::analyzer::analyze;
use llmscaler::selector::select_targets;
use llmscaler::types::{ReplicaMetric, SaturationConfig, ScaleAction, VariantReplicaState};
use std::collections::BTreeMap;

fn replica(variant: &str, pod: &str, accelerator: &str, cost: f64, kv: f64, queue: u64) -> ReplicaMetric {
    ReplicaMetric {
        pod_name: pod.to_string(),
        variant: variant.to_string(),
        model_id: "llama-70b".to_string(),
        namespace: "inference".to_string(),
        accelerator: accelerator.to_string(),
        cost_per_replica: cost,
        kv_cache_usage: kv,
        queue_length: queue,
        sampled_at: None,
        age: None,
        freshness: None,
    }
}

fn state(current: u32, ready: u32, desired: u32) -> VariantReplicaState {
    VariantReplicaState { current, ready, desired }
}

fn states(pairs: &[(&str, VariantReplicaState)]) -> BTreeMap<String, VariantReplicaState> {
    pairs.iter().map(|(name, s)| (name.to_string(), *s)).collect()
}

#[test]
fn scenario_a_scale_up_on_kv_pressure() {
    let config = SaturationConfig {
        kv_threshold: 0.8,
        queue_threshold: 5.0,
        kv_spare_trigger: 0.1,
        queue_spare_trigger: 2.0,
    };
    let metrics = vec![
        replica("v1", "v1-0", "a100", 10.0, 0.75, 1),
        replica("v1", "v1-1", "a100", 10.0, 0.72, 0),
    ];
    let analysis = analyze("llama-70b", "inference", &metrics, &config);

    assert!(analysis.should_scale_up);
    assert!((analysis.avg_spare_kv - 0.065).abs() < 1e-9);

    let decisions = select_targets(&analysis, &states(&[("v1", state(2, 2, 0))]));
    assert_eq!(decisions["v1"].action, ScaleAction::ScaleUp);
    assert_eq!(decisions["v1"].target_replicas, 3);
}

#[test]
fn scenario_b_scale_down_blocked_by_minimum() {
    let config = SaturationConfig {
        kv_threshold: 0.8,
        queue_threshold: 5.0,
        kv_spare_trigger: 0.1,
        queue_spare_trigger: 2.0,
    };
    let metrics = vec![
        replica("v1", "v1-0", "a100", 10.0, 0.3, 0),
        replica("v1", "v1-1", "a100", 10.0, 0.3, 0),
    ];
    let analysis = analyze("llama-70b", "inference", &metrics, &config);
    assert!(!analysis.should_scale_up);
    assert!(!analysis.scale_down_safe);

    let decisions = select_targets(&analysis, &states(&[("v1", state(2, 2, 0))]));
    assert_eq!(decisions["v1"].action, ScaleAction::NoChange);
    assert_eq!(decisions["v1"].target_replicas, 2);
}

#[test]
fn scenario_c_partial_saturation_does_not_force_scale_up() {
    let config = SaturationConfig {
        kv_threshold: 0.8,
        queue_threshold: 5.0,
        kv_spare_trigger: 0.1,
        queue_spare_trigger: 2.0,
    };
    let metrics = vec![
        replica("a100", "a100-0", "a100", 30.0, 0.9, 6),
        replica("h100", "h100-0", "h100", 50.0, 0.5, 1),
    ];
    let analysis = analyze("llama-70b", "inference", &metrics, &config);

    // Only the h100 replica is non-saturated, so it alone sets the weighted
    // average; the saturated a100 contributes zero weight rather than
    // forcing a scale-up on its own.
    assert!((analysis.avg_spare_kv - 0.3).abs() < 1e-9);
    assert!((analysis.avg_spare_queue - 4.0).abs() < 1e-9);
    assert!(!analysis.should_scale_up, "{}", analysis.scale_up_reason);
}

#[test]
fn scenario_d_in_flight_target_is_preserved() {
    let config = SaturationConfig {
        kv_threshold: 0.8,
        queue_threshold: 5.0,
        kv_spare_trigger: 0.1,
        queue_spare_trigger: 2.0,
    };
    let metrics = vec![replica("v1", "v1-0", "a100", 10.0, 0.75, 1)];
    let analysis = analyze("llama-70b", "inference", &metrics, &config);

    let decisions = select_targets(&analysis, &states(&[("v1", state(2, 1, 3))]));
    assert_eq!(decisions["v1"].action, ScaleAction::NoChange);
    assert_eq!(decisions["v1"].target_replicas, 3);
    assert!(!decisions["v1"].saturation_based);
}

#[test]
fn scenario_e_pending_pod_gating_blocks_cascade() {
    let config = SaturationConfig {
        kv_threshold: 0.8,
        queue_threshold: 5.0,
        kv_spare_trigger: 0.1,
        queue_spare_trigger: 2.0,
    };
    let metrics = vec![
        replica("a1", "a1-0", "a10", 30.0, 0.75, 1),
        replica("a2", "a2-0", "a10", 40.0, 0.75, 1),
    ];
    let analysis = analyze("llama-70b", "inference", &metrics, &config);
    assert!(analysis.should_scale_up);

    // a1 has a pending pod (current=2, ready=1); a2 has none.
    let decisions = select_targets(
        &analysis,
        &states(&[("a1", state(2, 1, 0)), ("a2", state(2, 2, 0))]),
    );
    assert_eq!(decisions["a1"].action, ScaleAction::NoChange);
    assert_eq!(decisions["a2"].action, ScaleAction::ScaleUp);
    assert_eq!(decisions["a2"].target_replicas, 3);
}

#[test]
fn scenario_f_scale_down_chooses_highest_cost() {
    let config = SaturationConfig {
        kv_threshold: 0.8,
        queue_threshold: 5.0,
        kv_spare_trigger: 0.1,
        queue_spare_trigger: 2.0,
    };
    let metrics: Vec<ReplicaMetric> = (0..3)
        .map(|i| replica("v-cheap", &format!("v-cheap-{i}"), "a10", 30.0, 0.1, 0))
        .chain((0..3).map(|i| replica("v-expensive", &format!("v-expensive-{i}"), "h100", 50.0, 0.1, 0)))
        .collect();
    let analysis = analyze("llama-70b", "inference", &metrics, &config);
    assert!(!analysis.should_scale_up);
    assert!(analysis.scale_down_safe);

    let decisions = select_targets(
        &analysis,
        &states(&[("v-cheap", state(3, 3, 0)), ("v-expensive", state(3, 3, 0))]),
    );
    assert_eq!(decisions["v-expensive"].action, ScaleAction::ScaleDown);
    assert_eq!(decisions["v-expensive"].target_replicas, 2);
    assert_eq!(decisions["v-cheap"].action, ScaleAction::NoChange);
    assert_eq!(decisions["v-cheap"].target_replicas, 3);
}
