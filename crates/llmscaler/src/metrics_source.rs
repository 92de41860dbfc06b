// Copyright 2026 GPU Autoscaler Working Group

//! A single telemetry source: query templates, a backend, and a cache.
//!
//! `refresh` pulls fresh data from the backend with bounded retry and
//! stores it in the cache. `get` never talks to the backend — it reads
//! whatever is cached and classifies its freshness. Reconciliation calls
//! `refresh` once per cycle and `get` as many times as needed while
//! building an analysis.

use crate::backend::Backend;
use crate::cache::{CacheKey, TelemetryCache};
use crate::error::{Error, Result};
use crate::query::QueryRegistry;
use crate::types::{FreshnessStatus, MetricResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Number of backend attempts per refresh before the cycle gives up on a query.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for the bounded exponential backoff between attempts.
const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// A cache read, reclassified by age against this source's freshness bounds.
#[derive(Debug, Clone)]
pub struct SourceReading {
    /// The last cached result, if any has ever been captured.
    pub result: Option<MetricResult>,
    /// When the result was captured.
    pub captured_at: Option<DateTime<Utc>>,
    /// Age of the result at read time.
    pub age: Option<chrono::Duration>,
    /// Freshness classification.
    pub freshness: FreshnessStatus,
}

/// One telemetry source: query templates, a backend, and a cache.
#[derive(Debug)]
pub struct MetricsSource {
    query_registry: Arc<QueryRegistry>,
    backend: Arc<dyn Backend>,
    cache: TelemetryCache,
    query_timeout: Duration,
    freshness_floor: chrono::Duration,
    abandon_ceiling: chrono::Duration,
    default_ttl: chrono::Duration,
}

impl MetricsSource {
    /// Build a source from its components.
    pub fn new(
        query_registry: Arc<QueryRegistry>,
        backend: Arc<dyn Backend>,
        cache: TelemetryCache,
        query_timeout: Duration,
        freshness_floor: chrono::Duration,
        abandon_ceiling: chrono::Duration,
    ) -> Self {
        Self {
            query_registry,
            backend,
            cache,
            query_timeout,
            freshness_floor,
            abandon_ceiling,
            default_ttl: chrono::Duration::seconds(15),
        }
    }

    /// Override the TTL applied to results whose query template doesn't
    /// specify its own.
    pub fn with_default_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Names of all query templates this source understands.
    pub fn query_list(&self) -> Vec<String> {
        self.query_registry.names()
    }

    /// Render and execute every query in `query_names` (all registered
    /// queries if empty) against the backend, caching each result under its
    /// own key. Each query's outcome is reported individually; a failure on
    /// one query does not prevent the others from being attempted.
    ///
    /// Returns `Err` only when every query failed — callers should treat
    /// that as a source-wide connectivity failure and skip the cycle
    /// (spec §4.3 "Failure semantics"). Otherwise returns the per-query
    /// outcomes, successes and failures side by side.
    pub async fn refresh_all(
        &self,
        query_names: &[String],
        params: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, Result<MetricResult>>> {
        let names: Vec<String> = if query_names.is_empty() {
            self.query_list()
        } else {
            query_names.to_vec()
        };

        let mut results = BTreeMap::new();
        for name in &names {
            results.insert(name.clone(), self.refresh(name, params).await);
        }

        if !results.is_empty() && results.values().all(|r| r.is_err()) {
            return Err(Error::MetricsUnavailable(format!(
                "all queries failed during refresh: {}",
                names.join(", ")
            )));
        }
        Ok(results)
    }

    /// Render and execute `query_name` against the backend, with bounded
    /// exponential backoff across transient failures, then cache the result.
    ///
    /// A permanent backend error aborts immediately without retry.
    pub async fn refresh(
        &self,
        query_name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<MetricResult> {
        let rendered = self.query_registry.render(query_name, params)?;
        let template = self
            .query_registry
            .get(query_name)
            .ok_or_else(|| Error::Config(format!("unknown query template '{query_name}'")))?;

        let mut attempt = 0;
        let mut delay = BACKOFF_BASE;
        let result = loop {
            attempt += 1;
            match self.backend.query(&rendered, self.query_timeout).await {
                Ok(result) => break result,
                Err(err @ Error::BackendPermanent { .. }) => return Err(err),
                Err(err) if attempt >= MAX_ATTEMPTS => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        query = query_name,
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %err,
                        "transient backend error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        };

        let ttl = template.ttl.unwrap_or(self.default_ttl);
        let key = CacheKey::new(query_name, params);
        self.cache.put(key, result.clone(), ttl);
        Ok(result)
    }

    /// Read the cached value for `query_name` without contacting the
    /// backend, classifying its freshness against this source's bounds.
    pub fn get(&self, query_name: &str, params: &BTreeMap<String, String>) -> SourceReading {
        let key = CacheKey::new(query_name, params);
        match self.cache.get(&key) {
            None => SourceReading {
                result: None,
                captured_at: None,
                age: None,
                freshness: FreshnessStatus::Unavailable,
            },
            Some(read) => {
                let age = Utc::now() - read.value.captured_at;
                let freshness = if age < self.freshness_floor {
                    FreshnessStatus::Fresh
                } else if age < self.abandon_ceiling {
                    FreshnessStatus::Stale
                } else {
                    FreshnessStatus::Unavailable
                };
                SourceReading {
                    result: Some(read.value.result),
                    captured_at: Some(read.value.captured_at),
                    age: Some(age),
                    freshness,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NoopBackend;
    use crate::query::{QueryKind, QueryTemplate};
    use crate::types::MetricSample;

    fn registry_with_kv_query() -> Arc<QueryRegistry> {
        let registry = QueryRegistry::new();
        registry
            .register(QueryTemplate {
                name: "kv".into(),
                kind: QueryKind::Expression,
                body: "vllm_kv_cache{namespace=\"{{namespace}}\"}".into(),
                required_params: vec!["namespace".into()],
                ttl: None,
                description: "kv cache".into(),
            })
            .unwrap();
        Arc::new(registry)
    }

    fn params() -> BTreeMap<String, String> {
        let mut p = BTreeMap::new();
        p.insert("namespace".to_string(), "prod".to_string());
        p
    }

    #[tokio::test]
    async fn refresh_then_get_returns_fresh() {
        let backend = Arc::new(NoopBackend::new());
        backend.set_response(
            "vllm_kv_cache{namespace=\"prod\"}",
            MetricResult {
                samples: vec![MetricSample {
                    labels: BTreeMap::new(),
                    value: 0.5,
                }],
            },
        );
        let source = MetricsSource::new(
            registry_with_kv_query(),
            backend,
            TelemetryCache::default(),
            Duration::from_secs(1),
            chrono::Duration::seconds(60),
            chrono::Duration::seconds(300),
        );
        source.refresh("kv", &params()).await.unwrap();
        let reading = source.get("kv", &params());
        assert_eq!(reading.freshness, FreshnessStatus::Fresh);
        assert_eq!(reading.result.unwrap().samples.len(), 1);
    }

    #[tokio::test]
    async fn get_on_uncached_query_is_unavailable() {
        let source = MetricsSource::new(
            registry_with_kv_query(),
            Arc::new(NoopBackend::new()),
            TelemetryCache::default(),
            Duration::from_secs(1),
            chrono::Duration::seconds(60),
            chrono::Duration::seconds(300),
        );
        let reading = source.get("kv", &params());
        assert_eq!(reading.freshness, FreshnessStatus::Unavailable);
        assert!(reading.result.is_none());
    }

    #[tokio::test]
    async fn refresh_propagates_permanent_error_without_retry() {
        let backend = Arc::new(NoopBackend::new());
        backend.set_error("vllm_kv_cache{namespace=\"prod\"}", || {
            Error::BackendPermanent {
                query: "kv".into(),
                source: anyhow::anyhow!("unauthorized"),
            }
        });
        let source = MetricsSource::new(
            registry_with_kv_query(),
            backend,
            TelemetryCache::default(),
            Duration::from_secs(1),
            chrono::Duration::seconds(60),
            chrono::Duration::seconds(300),
        );
        let err = source.refresh("kv", &params()).await.unwrap_err();
        assert!(matches!(err, Error::BackendPermanent { .. }));
    }

    #[tokio::test]
    async fn refresh_retries_transient_errors_up_to_the_limit() {
        let backend = Arc::new(NoopBackend::new());
        // Only one error is programmed; NoopBackend consumes it on first read
        // and falls back to the default empty response on the retry.
        backend.set_error("vllm_kv_cache{namespace=\"prod\"}", || Error::BackendTransient {
            query: "kv".into(),
            source: anyhow::anyhow!("timeout"),
        });
        let source = MetricsSource::new(
            registry_with_kv_query(),
            backend,
            TelemetryCache::default(),
            Duration::from_secs(1),
            chrono::Duration::seconds(60),
            chrono::Duration::seconds(300),
        );
        let result = source.refresh("kv", &params()).await.unwrap();
        assert!(result.samples.is_empty());
    }

    #[tokio::test]
    async fn refresh_all_succeeds_when_only_some_queries_fail() {
        let registry = QueryRegistry::new();
        registry
            .register(QueryTemplate {
                name: "kv".into(),
                kind: QueryKind::Expression,
                body: "kv{ns=\"{{namespace}}\"}".into(),
                required_params: vec!["namespace".into()],
                ttl: None,
                description: "kv".into(),
            })
            .unwrap();
        registry
            .register(QueryTemplate {
                name: "queue".into(),
                kind: QueryKind::Expression,
                body: "queue{ns=\"{{namespace}}\"}".into(),
                required_params: vec!["namespace".into()],
                ttl: None,
                description: "queue".into(),
            })
            .unwrap();

        let backend = Arc::new(NoopBackend::new());
        backend.set_response(
            "kv{ns=\"prod\"}",
            MetricResult { samples: vec![] },
        );
        backend.set_error("queue{ns=\"prod\"}", || Error::BackendPermanent {
            query: "queue".into(),
            source: anyhow::anyhow!("unknown metric"),
        });

        let source = MetricsSource::new(
            Arc::new(registry),
            backend,
            TelemetryCache::default(),
            Duration::from_secs(1),
            chrono::Duration::seconds(60),
            chrono::Duration::seconds(300),
        );

        let results = source
            .refresh_all(&["kv".to_string(), "queue".to_string()], &params())
            .await
            .unwrap();
        assert!(results["kv"].is_ok());
        assert!(results["queue"].is_err());
    }

    #[tokio::test]
    async fn refresh_all_fails_when_every_query_fails() {
        let registry = QueryRegistry::new();
        registry
            .register(QueryTemplate {
                name: "kv".into(),
                kind: QueryKind::Expression,
                body: "kv{ns=\"{{namespace}}\"}".into(),
                required_params: vec!["namespace".into()],
                ttl: None,
                description: "kv".into(),
            })
            .unwrap();

        let backend = Arc::new(NoopBackend::new());
        backend.set_error("kv{ns=\"prod\"}", || Error::BackendPermanent {
            query: "kv".into(),
            source: anyhow::anyhow!("unknown metric"),
        });

        let source = MetricsSource::new(
            Arc::new(registry),
            backend,
            TelemetryCache::default(),
            Duration::from_secs(1),
            chrono::Duration::seconds(60),
            chrono::Duration::seconds(300),
        );

        let err = source
            .refresh_all(&["kv".to_string()], &params())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MetricsUnavailable(_)));
    }
}
