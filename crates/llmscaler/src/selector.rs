// Copyright 2026 GPU Autoscaler Working Group

//! Turns one model's saturation analysis into per-variant replica targets.
//!
//! At most one variant's target changes per cycle. A variant whose
//! previously published target hasn't been honored yet (`desired != current`)
//! is left alone this cycle rather than layered with a second decision —
//! the platform needs to catch up first. Among variants eligible to grow,
//! the cheapest one is picked; among variants eligible to shrink, the most
//! expensive one is picked, so scale-down actively sheds the priciest idle
//! capacity. Ties are broken alphabetically: first name wins for scale-up,
//! last name wins for scale-down.

use crate::types::{ModelSaturationAnalysis, ScaleAction, VariantDecision, VariantReplicaState};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// The replica floor below which a variant is never scaled down.
const MIN_REPLICAS: u32 = 1;

/// Compute target replica counts for every variant known to `states`.
pub fn select_targets(
    analysis: &ModelSaturationAnalysis,
    states: &BTreeMap<String, VariantReplicaState>,
) -> BTreeMap<String, VariantDecision> {
    let now = Utc::now();
    let mut decisions = BTreeMap::new();
    let mut eligible: Vec<&String> = Vec::new();

    for (variant, state) in states {
        let in_flight = state.desired != 0 && state.desired != state.current;
        if in_flight {
            decisions.insert(
                variant.clone(),
                no_change(analysis, variant, state, state.desired, "preserving in-flight target", false, now),
            );
        } else {
            eligible.push(variant);
        }
    }

    if eligible.is_empty() {
        return decisions;
    }

    if analysis.should_scale_up {
        let scale_up_candidates: Vec<&String> = eligible
            .iter()
            .filter(|v| states[**v].pending() == 0)
            .copied()
            .collect();

        if let Some(chosen) = pick_cheapest(&scale_up_candidates, analysis) {
            for variant in &eligible {
                let state = &states[*variant];
                if *variant == chosen {
                    decisions.insert(
                        (*variant).clone(),
                        VariantDecision {
                            variant: (*variant).clone(),
                            namespace: analysis.namespace.clone(),
                            model_id: analysis.model_id.clone(),
                            accelerator: analysis.variants.get(*variant).map(|v| v.accelerator.clone()).unwrap_or_default(),
                            cost_per_replica: analysis.variants.get(*variant).map(|v| v.cost_per_replica).unwrap_or(0.0),
                            action: ScaleAction::ScaleUp,
                            current_replicas: state.current,
                            target_replicas: state.current + 1,
                            previous_desired: state.desired,
                            reason: analysis.scale_up_reason.clone(),
                            saturation_based: true,
                            decided_at: now,
                        },
                    );
                } else {
                    decisions.insert(
                        (*variant).clone(),
                        no_change(analysis, variant, state, current_or_desired(state), "another variant was selected for scale-up this cycle", false, now),
                    );
                }
            }
            return decisions;
        }

        for variant in &eligible {
            let state = &states[*variant];
            decisions.insert(
                (*variant).clone(),
                no_change(
                    analysis,
                    variant,
                    state,
                    current_or_desired(state),
                    "all eligible variants have pending pods, skipping scale-up to avoid cascading",
                    false,
                    now,
                ),
            );
        }
        return decisions;
    }

    if analysis.scale_down_safe {
        let scale_down_candidates: Vec<&String> = eligible
            .iter()
            .filter(|v| states[**v].current > MIN_REPLICAS)
            .copied()
            .collect();

        if let Some(chosen) = pick_priciest(&scale_down_candidates, analysis) {
            for variant in &eligible {
                let state = &states[*variant];
                if *variant == chosen {
                    decisions.insert(
                        (*variant).clone(),
                        VariantDecision {
                            variant: (*variant).clone(),
                            namespace: analysis.namespace.clone(),
                            model_id: analysis.model_id.clone(),
                            accelerator: analysis.variants.get(*variant).map(|v| v.accelerator.clone()).unwrap_or_default(),
                            cost_per_replica: analysis.variants.get(*variant).map(|v| v.cost_per_replica).unwrap_or(0.0),
                            action: ScaleAction::ScaleDown,
                            current_replicas: state.current,
                            target_replicas: state.current - 1,
                            previous_desired: state.desired,
                            reason: "model has ample spare capacity across replicas".to_string(),
                            saturation_based: true,
                            decided_at: now,
                        },
                    );
                } else {
                    decisions.insert(
                        (*variant).clone(),
                        no_change(analysis, variant, state, current_or_desired(state), "another variant was selected for scale-down this cycle", false, now),
                    );
                }
            }
            return decisions;
        }
    }

    for variant in &eligible {
        let state = &states[*variant];
        decisions.insert(
            (*variant).clone(),
            no_change(analysis, variant, state, current_or_desired(state), "no scaling needed this cycle", false, now),
        );
    }
    decisions
}

fn current_or_desired(state: &VariantReplicaState) -> u32 {
    if state.desired != 0 {
        state.desired
    } else {
        state.current
    }
}

fn no_change(
    analysis: &ModelSaturationAnalysis,
    variant: &str,
    state: &VariantReplicaState,
    target: u32,
    reason: &str,
    saturation_based: bool,
    now: chrono::DateTime<Utc>,
) -> VariantDecision {
    VariantDecision {
        variant: variant.to_string(),
        namespace: analysis.namespace.clone(),
        model_id: analysis.model_id.clone(),
        accelerator: analysis.variants.get(variant).map(|v| v.accelerator.clone()).unwrap_or_default(),
        cost_per_replica: analysis.variants.get(variant).map(|v| v.cost_per_replica).unwrap_or(0.0),
        action: ScaleAction::NoChange,
        current_replicas: state.current,
        target_replicas: target.max(MIN_REPLICAS),
        previous_desired: state.desired,
        reason: reason.to_string(),
        saturation_based,
        decided_at: now,
    }
}

fn cost_of(analysis: &ModelSaturationAnalysis, variant: &str) -> f64 {
    analysis.variants.get(variant).map(|v| v.cost_per_replica).unwrap_or(0.0)
}

/// Lowest cost wins; ties go to the alphabetically first name.
fn pick_cheapest<'a>(candidates: &[&'a String], analysis: &ModelSaturationAnalysis) -> Option<&'a String> {
    candidates
        .iter()
        .copied()
        .min_by(|a, b| {
            cost_of(analysis, a.as_str())
                .partial_cmp(&cost_of(analysis, b.as_str()))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(b))
        })
}

/// Highest cost wins; ties go to the alphabetically last name.
fn pick_priciest<'a>(candidates: &[&'a String], analysis: &ModelSaturationAnalysis) -> Option<&'a String> {
    candidates
        .iter()
        .copied()
        .max_by(|a, b| {
            cost_of(analysis, a.as_str())
                .partial_cmp(&cost_of(analysis, b.as_str()))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(b))
        })
}
