// Copyright 2026 GPU Autoscaler Working Group

//! Publishes reconciliation outcomes as Prometheus metrics.
//!
//! Gauge labels are `variant_name`, `namespace`, `accelerator_type` (plus
//! `model_id` so a dashboard can group variants back into one model without
//! a join) — `variant_name` is always the deployment name, since that's what
//! the external autoscaler's selector matches against (spec §4.7). An
//! optional `controller_instance` label is added only when configured, for
//! deployments running more than one instance of this controller.

use crate::error::{Error, Result};
use crate::types::{ScaleAction, VariantDecision};
use prometheus::{GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};

const GAUGE_LABELS: &[&str] = &["variant_name", "namespace", "accelerator_type", "model_id"];
const COUNTER_LABELS: &[&str] = &["variant_name", "namespace", "accelerator_type", "model_id", "direction", "reason"];

/// Holds the Prometheus metric families this crate publishes and the
/// registry they're bound to.
#[derive(Debug, Clone)]
pub struct Publisher {
    registry: Registry,
    desired_replicas: GaugeVec,
    current_replicas: GaugeVec,
    desired_ratio: GaugeVec,
    scaling_total: IntCounterVec,
    controller_instance: Option<String>,
}

impl Publisher {
    /// Create a publisher with a fresh registry and register all metric
    /// families against it.
    pub fn new() -> Result<Self> {
        Self::with_controller_instance(None)
    }

    /// Create a publisher that additionally stamps every series with a
    /// `controller_instance` label, for deployments running more than one
    /// instance of this controller against the same backend.
    pub fn with_controller_instance(controller_instance: Option<String>) -> Result<Self> {
        let registry = Registry::new();

        let gauge_labels: Vec<&str> = if controller_instance.is_some() {
            GAUGE_LABELS.iter().copied().chain(["controller_instance"]).collect()
        } else {
            GAUGE_LABELS.to_vec()
        };
        let counter_labels: Vec<&str> = if controller_instance.is_some() {
            COUNTER_LABELS.iter().copied().chain(["controller_instance"]).collect()
        } else {
            COUNTER_LABELS.to_vec()
        };

        let desired_replicas = GaugeVec::new(
            Opts::new(
                "llmscaler_desired_replicas",
                "Target replica count published for a variant this cycle",
            ),
            &gauge_labels,
        )
        .map_err(|e| Error::Other(e.into()))?;

        let current_replicas = GaugeVec::new(
            Opts::new(
                "llmscaler_current_replicas",
                "Observed replica count for a variant before this cycle's decision",
            ),
            &gauge_labels,
        )
        .map_err(|e| Error::Other(e.into()))?;

        let desired_ratio = GaugeVec::new(
            Opts::new(
                "llmscaler_desired_ratio",
                "Ratio of target to current replicas; equals target when current is zero",
            ),
            &gauge_labels,
        )
        .map_err(|e| Error::Other(e.into()))?;

        let scaling_total = IntCounterVec::new(
            Opts::new(
                "llmscaler_scaling_total",
                "Count of scale-up and scale-down actions taken, by direction and reason",
            ),
            &counter_labels,
        )
        .map_err(|e| Error::Other(e.into()))?;

        registry
            .register(Box::new(desired_replicas.clone()))
            .map_err(|e| Error::Other(e.into()))?;
        registry
            .register(Box::new(current_replicas.clone()))
            .map_err(|e| Error::Other(e.into()))?;
        registry
            .register(Box::new(desired_ratio.clone()))
            .map_err(|e| Error::Other(e.into()))?;
        registry
            .register(Box::new(scaling_total.clone()))
            .map_err(|e| Error::Other(e.into()))?;

        Ok(Self {
            registry,
            desired_replicas,
            current_replicas,
            desired_ratio,
            scaling_total,
            controller_instance,
        })
    }

    /// The registry backing this publisher, for mounting on an HTTP handler.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one variant's decision for this cycle.
    pub fn record_decision(&self, decision: &VariantDecision) {
        let mut labels = vec![
            decision.variant.as_str(),
            decision.namespace.as_str(),
            decision.accelerator.as_str(),
            decision.model_id.as_str(),
        ];
        if let Some(instance) = &self.controller_instance {
            labels.push(instance.as_str());
        }

        self.desired_replicas.with_label_values(&labels).set(decision.target_replicas as f64);
        self.current_replicas.with_label_values(&labels).set(decision.current_replicas as f64);

        // current=0 has no meaningful ratio; publish the target itself so
        // the series still reflects "how much are we asking for" (spec §4.6
        // step 6: "when current = 0, set ratio = desired").
        let ratio = if decision.current_replicas == 0 {
            decision.target_replicas as f64
        } else {
            decision.target_replicas as f64 / decision.current_replicas as f64
        };
        self.desired_ratio.with_label_values(&labels).set(ratio);

        let direction = match decision.action {
            ScaleAction::ScaleUp => Some("up"),
            ScaleAction::ScaleDown => Some("down"),
            ScaleAction::NoChange => None,
        };
        if let Some(direction) = direction {
            let mut counter_labels = vec![
                decision.variant.as_str(),
                decision.namespace.as_str(),
                decision.accelerator.as_str(),
                decision.model_id.as_str(),
                direction,
                decision.reason.as_str(),
            ];
            if let Some(instance) = &self.controller_instance {
                counter_labels.push(instance.as_str());
            }
            self.scaling_total.with_label_values(&counter_labels).inc();
        }
    }

    /// Render the current state of all registered metrics in the Prometheus
    /// text exposition format.
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .map_err(|e| Error::Other(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn decision(action: ScaleAction, current: u32, target: u32) -> VariantDecision {
        VariantDecision {
            variant: "v1".to_string(),
            namespace: "ns".to_string(),
            model_id: "m1".to_string(),
            accelerator: "a100".to_string(),
            cost_per_replica: 10.0,
            action,
            current_replicas: current,
            target_replicas: target,
            previous_desired: current,
            reason: "test".to_string(),
            saturation_based: true,
            decided_at: Utc::now(),
        }
    }

    #[test]
    fn gather_includes_recorded_metrics() {
        let publisher = Publisher::new().unwrap();
        publisher.record_decision(&decision(ScaleAction::ScaleUp, 2, 3));
        let text = publisher.gather().unwrap();
        assert!(text.contains("llmscaler_desired_replicas"));
        assert!(text.contains("llmscaler_scaling_total"));
        assert!(text.contains("variant_name=\"v1\""));
        assert!(text.contains("accelerator_type=\"a100\""));
    }

    #[test]
    fn no_change_does_not_increment_scaling_counter() {
        let publisher = Publisher::new().unwrap();
        publisher.record_decision(&decision(ScaleAction::NoChange, 2, 2));
        let text = publisher.gather().unwrap();
        assert!(!text.contains("llmscaler_scaling_total{"));
    }

    #[test]
    fn zero_current_ratio_equals_target() {
        let publisher = Publisher::new().unwrap();
        publisher.record_decision(&decision(ScaleAction::ScaleUp, 0, 1));
        let text = publisher.gather().unwrap();
        assert!(text.contains("llmscaler_desired_ratio"));
    }

    #[test]
    fn controller_instance_label_is_included_when_configured() {
        let publisher = Publisher::with_controller_instance(Some("ctrl-a".to_string())).unwrap();
        publisher.record_decision(&decision(ScaleAction::ScaleDown, 3, 2));
        let text = publisher.gather().unwrap();
        assert!(text.contains("controller_instance=\"ctrl-a\""));
    }
}
