// Copyright 2026 GPU Autoscaler Working Group

//! The shape of one autoscaled model and the interface this crate expects
//! the hosting platform to provide.
//!
//! This crate never talks to Kubernetes (or any other orchestrator)
//! directly — that integration is the host application's job. What it
//! needs from the platform is captured in [`ReplicaStateProvider`]: given a
//! model id, return each of its variants' current/ready/desired replica
//! counts. A real deployment implements this against its CRD or Deployment
//! objects; [`StaticReplicaStateProvider`] is the in-memory stand-in used
//! in tests.

use crate::error::Result;
use crate::types::VariantReplicaState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Static description of one model to keep saturated.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ManagedResourceSpec {
    /// Logical model identifier.
    pub model_id: String,
    /// Namespace the model's variants run in.
    pub namespace: String,
    /// Name of the registered [`crate::metrics_source::MetricsSource`] to query.
    pub source_name: String,
    /// Name of the registered kv-cache-usage query template.
    #[serde(default = "default_kv_query")]
    pub kv_query: String,
    /// Name of the registered queue-length query template.
    #[serde(default = "default_queue_query")]
    pub queue_query: String,
    /// Parameters passed when rendering both queries.
    pub query_params: BTreeMap<String, String>,
}

fn default_kv_query() -> String {
    crate::query::KV_CACHE_PER_POD.to_string()
}

fn default_queue_query() -> String {
    crate::query::QUEUE_LENGTH_PER_POD.to_string()
}

/// A single status condition, in the style of the Kubernetes conditions
/// convention: a type, a boolean status, and a human-readable reason.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Condition {
    /// Condition type, e.g. `"MetricsAvailable"`, `"Reconciled"`.
    pub condition_type: String,
    /// Current status of the condition.
    pub status: bool,
    /// Short machine-readable reason.
    pub reason: String,
    /// Human-readable detail.
    pub message: String,
    /// When this condition last changed.
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Build a condition stamped with the current time.
    pub fn new(condition_type: impl Into<String>, status: bool, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Observed state of one managed resource, refreshed every reconcile cycle.
#[derive(Debug, Clone, Default)]
pub struct ManagedResourceStatus {
    /// When this resource was last reconciled.
    pub last_reconciled_at: Option<DateTime<Utc>>,
    /// Status conditions, most recent transition last.
    pub conditions: Vec<Condition>,
}

impl ManagedResourceStatus {
    /// Replace the condition of the given type, or append it if none exists yet.
    pub fn set_condition(&mut self, condition: Condition) {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            if existing.status != condition.status {
                *existing = condition;
            } else {
                existing.message = condition.message;
            }
        } else {
            self.conditions.push(condition);
        }
    }
}

/// Sink for a managed resource's reconciliation status.
///
/// Implementations write to whatever the hosting platform exposes as the
/// resource's status subresource (a CRD's `.status`, a ConfigMap, whatever).
/// The reconcile loop calls this at most once per cycle (spec §4.6 step 7).
pub trait StatusSink: Send + Sync + std::fmt::Debug {
    /// Replace the full status for one managed resource.
    fn update_status(&self, model_id: &str, namespace: &str, status: ManagedResourceStatus);

    /// Read back the current status, if any has been recorded.
    fn get_status(&self, model_id: &str, namespace: &str) -> Option<ManagedResourceStatus>;
}

/// An in-memory [`StatusSink`] for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct StaticStatusSink {
    statuses: Arc<DashMap<(String, String), ManagedResourceStatus>>,
}

impl StaticStatusSink {
    /// Create a sink with no recorded status.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusSink for StaticStatusSink {
    fn update_status(&self, model_id: &str, namespace: &str, status: ManagedResourceStatus) {
        self.statuses.insert((model_id.to_string(), namespace.to_string()), status);
    }

    fn get_status(&self, model_id: &str, namespace: &str) -> Option<ManagedResourceStatus> {
        self.statuses
            .get(&(model_id.to_string(), namespace.to_string()))
            .map(|entry| entry.clone())
    }
}

/// What the hosting platform must provide: per-variant replica state for a
/// model, and a sink for newly decided targets.
#[async_trait]
pub trait ReplicaStateProvider: Send + Sync + std::fmt::Debug {
    /// Fetch current replica state for every variant of `model_id`.
    async fn get_states(&self, model_id: &str) -> Result<BTreeMap<String, VariantReplicaState>>;

    /// Apply a newly decided target for one variant. Implementations own
    /// whatever retry/queueing semantics their platform needs; this call is
    /// fire-and-forget from the reconcile loop's perspective.
    async fn apply_target(&self, model_id: &str, variant: &str, target_replicas: u32) -> Result<()>;
}

/// An in-memory [`ReplicaStateProvider`] for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct StaticReplicaStateProvider {
    states: Arc<DashMap<(String, String), VariantReplicaState>>,
}

impl StaticReplicaStateProvider {
    /// Create a provider with no registered state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the state for one variant of one model.
    pub fn set_state(&self, model_id: impl Into<String>, variant: impl Into<String>, state: VariantReplicaState) {
        self.states.insert((model_id.into(), variant.into()), state);
    }
}

#[async_trait]
impl ReplicaStateProvider for StaticReplicaStateProvider {
    async fn get_states(&self, model_id: &str) -> Result<BTreeMap<String, VariantReplicaState>> {
        Ok(self
            .states
            .iter()
            .filter(|entry| entry.key().0 == model_id)
            .map(|entry| (entry.key().1.clone(), *entry.value()))
            .collect())
    }

    async fn apply_target(&self, model_id: &str, variant: &str, target_replicas: u32) -> Result<()> {
        if let Some(mut state) = self.states.get_mut(&(model_id.to_string(), variant.to_string())) {
            state.desired = target_replicas;
        }
        Ok(())
    }
}
