// Copyright 2026 GPU Autoscaler Working Group

//! Process entry point: loads configuration, wires up telemetry sources and
//! the reconcile loop for each managed model, and serves `/metrics` +
//! `/healthz` until shutdown.
//!
//! Pod-to-variant roster population and the platform adapters
//! ([`llmscaler::managed_resource::ReplicaStateProvider`] and
//! [`llmscaler::managed_resource::StatusSink`]) are left as integration
//! points: this binary wires in the static in-memory stand-ins so the
//! reconcile loop runs end to end, but a real deployment supplies its own
//! implementations backed by its orchestrator's CRD or Deployment objects.

use anyhow::Context;
use llmscaler::backend::PrometheusBackend;
use llmscaler::config::AppConfig;
use llmscaler::events::StaticEventRecorder;
use llmscaler::managed_resource::{StaticReplicaStateProvider, StaticStatusSink};
use llmscaler::mapper::VariantMapper;
use llmscaler::metrics_source::MetricsSource;
use llmscaler::publisher::Publisher;
use llmscaler::query::QueryRegistry;
use llmscaler::reconcile::{spawn_reconcile_loop, ReconcileEngine};
use llmscaler::source_registry::SourceRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    llmscaler_observability::init_tracing();

    let config_path = std::env::var("LLMSCALER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("llmscaler.toml"));
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path:?}"))?;

    let sources = Arc::new(SourceRegistry::new());
    for spec in &config.sources {
        let backend: Arc<dyn llmscaler::backend::Backend> = {
            let mut backend = PrometheusBackend::new(spec.prometheus_url.clone());
            if let Some(env_name) = &spec.bearer_token_env {
                if let Ok(token) = std::env::var(env_name) {
                    backend = backend.with_bearer_token(token);
                } else {
                    tracing::warn!(env = %env_name, "bearer token env var not set, querying without auth");
                }
            }
            Arc::new(backend)
        };
        let query_registry = QueryRegistry::new();
        llmscaler::query::register_default_queries(&query_registry)
            .context("registering default query templates")?;
        let source = MetricsSource::new(
            Arc::new(query_registry),
            backend,
            llmscaler::cache::TelemetryCache::default(),
            spec.query_timeout(),
            spec.freshness_floor(),
            spec.abandon_ceiling(),
        );
        sources
            .register(spec.name.clone(), source)
            .with_context(|| format!("registering metrics source '{}'", spec.name))?;
    }

    let mapper = Arc::new(VariantMapper::new());
    let state_provider = Arc::new(StaticReplicaStateProvider::new());
    let status_sink = Arc::new(StaticStatusSink::new());
    let event_recorder = Arc::new(StaticEventRecorder::new());
    let publisher = Arc::new(Publisher::new()?);
    let saturation_resolver = Arc::new(config.saturation_resolver());

    let engine = ReconcileEngine::new(
        sources,
        mapper,
        saturation_resolver,
        state_provider,
        Arc::clone(&publisher),
        status_sink,
        event_recorder,
    );

    let (_wake_tx, wake_rx) = watch::channel(());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::new();
    for resource in &config.managed_resources {
        let handle = spawn_reconcile_loop(
            engine.clone(),
            resource.clone(),
            config.poll_interval(),
            wake_rx.clone(),
            shutdown_rx.clone(),
        );
        handles.push(handle);
    }
    tracing::info!(count = handles.len(), "reconcile loops started");

    let serve_addr = config.metrics_listen_addr.clone();
    let serve_publisher = publisher;
    let server = tokio::spawn(async move {
        if let Err(err) = llmscaler_observability::serve(&serve_addr, serve_publisher).await {
            tracing::error!(error = %err, "metrics server exited");
        }
    });

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    server.abort();
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
