// Copyright 2026 GPU Autoscaler Working Group

//! Backend that queries a Prometheus-compatible HTTP query endpoint.

use super::Backend;
use crate::error::{Error, Result};
use crate::types::{MetricResult, MetricSample};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Queries a Prometheus-compatible instant-query endpoint
/// (`GET {base_url}/api/v1/query?query=...`).
#[derive(Debug, Clone)]
pub struct PrometheusBackend {
    base_url: String,
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl PrometheusBackend {
    /// Build a backend pointed at `base_url` (e.g. `http://prometheus:9090`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            bearer_token: None,
        }
    }

    /// Attach a bearer token sent with every query.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct PromQueryResponse {
    status: String,
    data: Option<PromQueryData>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromQueryData {
    result: Vec<PromSample>,
}

#[derive(Debug, Deserialize)]
struct PromSample {
    metric: BTreeMap<String, String>,
    /// `[timestamp, value_as_string]`, per the Prometheus HTTP API.
    value: (f64, String),
}

#[async_trait]
impl Backend for PrometheusBackend {
    async fn query(&self, rendered_expr: &str, timeout: Duration) -> Result<MetricResult> {
        let url = format!("{}/api/v1/query", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("query", rendered_expr)])
            .timeout(timeout);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                Error::BackendTransient {
                    query: rendered_expr.to_string(),
                    source: e.into(),
                }
            } else {
                Error::BackendPermanent {
                    query: rendered_expr.to_string(),
                    source: e.into(),
                }
            }
        })?;

        if response.status().is_server_error() {
            return Err(Error::BackendTransient {
                query: rendered_expr.to_string(),
                source: anyhow::anyhow!("server error: {}", response.status()),
            });
        }
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::BackendPermanent {
                query: rendered_expr.to_string(),
                source: anyhow::anyhow!("authentication failed: {}", response.status()),
            });
        }
        if !response.status().is_success() {
            return Err(Error::BackendPermanent {
                query: rendered_expr.to_string(),
                source: anyhow::anyhow!("unexpected status: {}", response.status()),
            });
        }

        let parsed: PromQueryResponse = response.json().await.map_err(|e| Error::BackendTransient {
            query: rendered_expr.to_string(),
            source: e.into(),
        })?;

        if parsed.status != "success" {
            return Err(Error::BackendPermanent {
                query: rendered_expr.to_string(),
                source: anyhow::anyhow!(
                    "query failed: {}",
                    parsed.error.unwrap_or_else(|| "unknown error".to_string())
                ),
            });
        }

        let data = parsed.data.unwrap_or(PromQueryData { result: vec![] });
        let samples = data
            .result
            .into_iter()
            .filter_map(|s| {
                s.value.1.parse::<f64>().ok().map(|value| MetricSample {
                    labels: s.metric,
                    value,
                })
            })
            .collect();

        Ok(MetricResult { samples })
    }
}
