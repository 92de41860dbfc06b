// Copyright 2026 GPU Autoscaler Working Group

//! The capability set a telemetry backend must provide.
//!
//! Two implementations exist today per spec §9 ("Polymorphism"):
//! [`prometheus_backend::PrometheusBackend`] for production use and
//! [`noop::NoopBackend`] for tests. Further backends are future work.

pub mod noop;
pub mod prometheus_backend;

use crate::error::Result;
use crate::types::MetricResult;
use async_trait::async_trait;
use std::time::Duration;

/// A telemetry backend capable of executing a single rendered query.
///
/// Implementors issue only read queries and make no assumption about the
/// authentication scheme beyond what's passed through as configuration
/// (spec §6).
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Execute `rendered_expr` against the backend with a bounded timeout,
    /// returning a normalized [`MetricResult`].
    async fn query(&self, rendered_expr: &str, timeout: Duration) -> Result<MetricResult>;
}

pub use noop::NoopBackend;
pub use prometheus_backend::PrometheusBackend;
