// Copyright 2026 GPU Autoscaler Working Group

//! In-memory backend used by tests. Never performs I/O.

use super::Backend;
use crate::error::Result;
use crate::types::MetricResult;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A fake backend that returns pre-programmed results keyed by the rendered
/// expression, or an error if programmed to fail.
#[derive(Debug, Clone, Default)]
pub struct NoopBackend {
    responses: Arc<RwLock<HashMap<String, Result<MetricResult>>>>,
}

impl NoopBackend {
    /// Create a backend with no programmed responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Program the result returned for a given rendered expression.
    pub fn set_response(&self, rendered_expr: impl Into<String>, result: MetricResult) {
        self.responses
            .write()
            .insert(rendered_expr.into(), Ok(result));
    }

    /// Program an error to be returned for a given rendered expression.
    pub fn set_error(&self, rendered_expr: impl Into<String>, make_err: impl Fn() -> crate::error::Error) {
        // Errors aren't `Clone`, so store a factory result lazily isn't possible through
        // the same map; callers that need repeatable failures should call this once per
        // expected invocation, or prefer `set_response` for steady-state behavior.
        self.responses
            .write()
            .insert(rendered_expr.into(), Err(make_err()));
    }
}

#[async_trait]
impl Backend for NoopBackend {
    async fn query(&self, rendered_expr: &str, _timeout: Duration) -> Result<MetricResult> {
        match self.responses.write().remove(rendered_expr) {
            Some(result) => result,
            None => Ok(MetricResult::default()),
        }
    }
}
