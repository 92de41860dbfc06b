// Copyright 2026 GPU Autoscaler Working Group

//! Ties the query/cache/analyzer/selector stack together into one
//! reconcile cycle per managed resource, and drives that cycle on a timer.
//!
//! Each managed resource gets its own `tokio::task`. The loop wakes on
//! whichever comes first: the poll interval, an external "resource
//! changed" notification, or shutdown. Each cycle is wrapped in a timeout
//! equal to the poll interval so a wedged backend can't starve the next
//! resource's turn on a shared runtime.

use crate::analyzer;
use crate::config::SaturationConfigResolver;
use crate::events::{EventRecorder, ScalingEvent};
use crate::managed_resource::{Condition, ManagedResourceSpec, ReplicaStateProvider, StatusSink};
use crate::mapper::VariantMapper;
use crate::publisher::Publisher;
use crate::selector;
use crate::source_registry::SourceRegistry;
use crate::types::{FreshnessStatus, ModelSaturationAnalysis, ScaleAction, VariantDecision};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Result of one successful reconcile cycle.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// The saturation analysis computed this cycle.
    pub analysis: ModelSaturationAnalysis,
    /// Per-variant decisions made this cycle.
    pub decisions: BTreeMap<String, VariantDecision>,
}

/// Everything a reconcile cycle needs that's shared across every managed
/// resource: the telemetry sources, the pod roster, threshold resolution,
/// the platform adapter, and the metric publisher.
#[derive(Clone)]
pub struct ReconcileEngine {
    sources: Arc<SourceRegistry>,
    mapper: Arc<VariantMapper>,
    saturation_resolver: Arc<SaturationConfigResolver>,
    state_provider: Arc<dyn ReplicaStateProvider>,
    publisher: Arc<Publisher>,
    status_sink: Arc<dyn StatusSink>,
    event_recorder: Arc<dyn EventRecorder>,
}

impl ReconcileEngine {
    /// Build an engine from its components.
    pub fn new(
        sources: Arc<SourceRegistry>,
        mapper: Arc<VariantMapper>,
        saturation_resolver: Arc<SaturationConfigResolver>,
        state_provider: Arc<dyn ReplicaStateProvider>,
        publisher: Arc<Publisher>,
        status_sink: Arc<dyn StatusSink>,
        event_recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            sources,
            mapper,
            saturation_resolver,
            state_provider,
            publisher,
            status_sink,
            event_recorder,
        }
    }

    /// Run one full reconcile cycle for `resource`.
    pub async fn run_cycle(&self, resource: &ManagedResourceSpec) -> Result<CycleOutcome> {
        let source = self.sources.get(&resource.source_name).ok_or_else(|| {
            Error::Config(format!(
                "unknown metrics source '{}' for model '{}'",
                resource.source_name, resource.model_id
            ))
        })?;

        // A failure on one of the two queries doesn't abort the cycle; only
        // when both fail do we treat the source as unreachable (spec §4.3).
        source
            .refresh_all(
                &[resource.kv_query.clone(), resource.queue_query.clone()],
                &resource.query_params,
            )
            .await?;

        let kv_reading = source.get(&resource.kv_query, &resource.query_params);
        let queue_reading = source.get(&resource.queue_query, &resource.query_params);

        // Drop samples classified unavailable rather than let a pod with no
        // usable telemetry masquerade as an idle (kv=0, queue=0) replica.
        let replica_metrics: Vec<_> = self
            .mapper
            .build_replica_metrics(&kv_reading, &queue_reading)
            .into_iter()
            .filter(|m| m.freshness != Some(FreshnessStatus::Unavailable))
            .collect();
        let config = self.saturation_resolver.resolve(&resource.model_id, &resource.namespace);
        let analysis = analyzer::analyze(&resource.model_id, &resource.namespace, &replica_metrics, &config);

        let states = self.state_provider.get_states(&resource.model_id).await?;
        let decisions = selector::select_targets(&analysis, &states);

        for decision in decisions.values() {
            if decision.action != ScaleAction::NoChange {
                self.state_provider
                    .apply_target(&resource.model_id, &decision.variant, decision.target_replicas)
                    .await?;
            }
            self.publisher.record_decision(decision);
            self.event_recorder.record(ScalingEvent::from_decision(decision));
        }

        Ok(CycleOutcome { analysis, decisions })
    }

    /// Merge `conditions` into the resource's recorded status and stamp the
    /// reconciliation time. One call per cycle, regardless of outcome.
    fn apply_cycle_status(&self, resource: &ManagedResourceSpec, conditions: Vec<Condition>) {
        let mut status = self
            .status_sink
            .get_status(&resource.model_id, &resource.namespace)
            .unwrap_or_default();
        for condition in conditions {
            status.set_condition(condition);
        }
        status.last_reconciled_at = Some(chrono::Utc::now());
        self.status_sink
            .update_status(&resource.model_id, &resource.namespace, status);
    }
}

/// Translate a cycle failure into the condition transitions it implies,
/// per spec §6's `{TargetResolved, MetricsAvailable, Ready}` condition set.
fn conditions_for_error(err: &Error) -> Vec<Condition> {
    let ready_false = Condition::new("Ready", false, "CycleFailed", err.to_string());
    match err {
        Error::TargetNotFound(_) => vec![
            Condition::new("TargetResolved", false, "TargetNotFound", err.to_string()),
            ready_false,
        ],
        Error::MetricsUnavailable(_) | Error::BackendTransient { .. } | Error::BackendPermanent { .. } | Error::StaleMetrics(_) => {
            vec![
                Condition::new("MetricsAvailable", false, "MetricsUnavailable", err.to_string()),
                ready_false,
            ]
        }
        Error::Config(_) | Error::ParamMissing { .. } | Error::Template(_) => vec![
            Condition::new("TargetResolved", false, "ConfigInvalid", err.to_string()),
            ready_false,
        ],
        Error::Other(_) => vec![ready_false],
    }
}

/// Spawn the poll loop for one managed resource. Runs until `shutdown`
/// carries `true`, or the returned handle is aborted.
pub fn spawn_reconcile_loop(
    engine: ReconcileEngine,
    resource: ManagedResourceSpec,
    poll_interval: Duration,
    mut wake: watch::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = wake.changed() => {}
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }

            match tokio::time::timeout(poll_interval, engine.run_cycle(&resource)).await {
                Ok(Ok(outcome)) => {
                    tracing::info!(
                        model_id = %resource.model_id,
                        namespace = %resource.namespace,
                        should_scale_up = outcome.analysis.should_scale_up,
                        "reconcile cycle complete"
                    );
                    engine.apply_cycle_status(
                        &resource,
                        vec![
                            Condition::new("TargetResolved", true, "Resolved", "scale target resolved"),
                            Condition::new("MetricsAvailable", true, "Fresh", "telemetry refreshed this cycle"),
                            Condition::new("Ready", true, "CycleSucceeded", outcome.analysis.scale_up_reason.clone()),
                        ],
                    );
                }
                Ok(Err(err)) => {
                    tracing::error!(
                        model_id = %resource.model_id,
                        namespace = %resource.namespace,
                        error = %err,
                        "reconcile cycle failed"
                    );
                    engine.apply_cycle_status(&resource, conditions_for_error(&err));
                }
                Err(_) => {
                    tracing::error!(
                        model_id = %resource.model_id,
                        namespace = %resource.namespace,
                        "reconcile cycle timed out"
                    );
                    engine.apply_cycle_status(
                        &resource,
                        vec![Condition::new(
                            "Ready",
                            false,
                            "CycleTimedOut",
                            format!("cycle exceeded poll interval of {poll_interval:?}"),
                        )],
                    );
                }
            }
        }
    })
}
