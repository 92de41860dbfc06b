// Copyright 2026 GPU Autoscaler Working Group

//! Per-decision events attached to a managed resource (spec §6 "Events
//! (produced)").
//!
//! One [`ScalingEvent`] is recorded per variant per cycle, alongside the
//! metric publication and status update the reconcile loop already performs.
//! Like [`crate::managed_resource::StatusSink`], this crate only specifies
//! the shape and a sink trait — attaching an event to a platform object
//! (e.g. a Kubernetes `Event`) is the hosting application's job.

use crate::types::{ScaleAction, VariantDecision};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One recorded decision for one variant in one cycle.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScalingEvent {
    /// Unique id for this event.
    pub id: Uuid,
    /// Logical model identifier.
    pub model_id: String,
    /// Namespace the variant runs in.
    pub namespace: String,
    /// Variant (deployment) name this event describes.
    pub variant: String,
    /// Action taken for this variant this cycle.
    pub action: ScaleAction,
    /// Human-readable reason, copied from the decision.
    pub reason: String,
    /// When the event was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl ScalingEvent {
    /// Build an event from a decision, stamping a fresh id and timestamp.
    pub fn from_decision(decision: &VariantDecision) -> Self {
        Self {
            id: Uuid::new_v4(),
            model_id: decision.model_id.clone(),
            namespace: decision.namespace.clone(),
            variant: decision.variant.clone(),
            action: decision.action,
            reason: decision.reason.clone(),
            recorded_at: Utc::now(),
        }
    }
}

/// Sink for scaling events. Implementations attach the event to whatever the
/// hosting platform uses to record history against a managed resource (a
/// Kubernetes `Event`, an audit log, ...).
pub trait EventRecorder: Send + Sync + std::fmt::Debug {
    /// Record one event.
    fn record(&self, event: ScalingEvent);
}

/// An in-memory [`EventRecorder`] for tests and local development. Events are
/// appended, never overwritten, and kept in recording order per resource.
#[derive(Debug, Clone, Default)]
pub struct StaticEventRecorder {
    events: Arc<DashMap<(String, String), Vec<ScalingEvent>>>,
}

impl StaticEventRecorder {
    /// Create a recorder with no recorded events.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far for one managed resource, oldest first.
    pub fn events_for(&self, model_id: &str, namespace: &str) -> Vec<ScalingEvent> {
        self.events
            .get(&(model_id.to_string(), namespace.to_string()))
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }
}

impl EventRecorder for StaticEventRecorder {
    fn record(&self, event: ScalingEvent) {
        self.events
            .entry((event.model_id.clone(), event.namespace.clone()))
            .or_default()
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariantDecision;

    fn decision(action: ScaleAction) -> VariantDecision {
        VariantDecision {
            variant: "v1".to_string(),
            namespace: "ns".to_string(),
            model_id: "m1".to_string(),
            accelerator: "a100".to_string(),
            cost_per_replica: 10.0,
            action,
            current_replicas: 2,
            target_replicas: 3,
            previous_desired: 2,
            reason: "low spare capacity".to_string(),
            saturation_based: true,
            decided_at: Utc::now(),
        }
    }

    #[test]
    fn record_appends_rather_than_overwrites() {
        let recorder = StaticEventRecorder::new();
        recorder.record(ScalingEvent::from_decision(&decision(ScaleAction::ScaleUp)));
        recorder.record(ScalingEvent::from_decision(&decision(ScaleAction::NoChange)));
        let events = recorder.events_for("m1", "ns");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, ScaleAction::ScaleUp);
        assert_eq!(events[1].action, ScaleAction::NoChange);
    }

    #[test]
    fn events_for_unknown_resource_is_empty() {
        let recorder = StaticEventRecorder::new();
        assert!(recorder.events_for("missing", "ns").is_empty());
    }

    #[test]
    fn each_event_gets_a_distinct_id() {
        let a = ScalingEvent::from_decision(&decision(ScaleAction::ScaleUp));
        let b = ScalingEvent::from_decision(&decision(ScaleAction::ScaleUp));
        assert_ne!(a.id, b.id);
    }
}
