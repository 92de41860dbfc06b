// Copyright 2026 GPU Autoscaler Working Group

//! Registry of named metrics sources.
//!
//! A source bundles everything needed to answer a query against one
//! telemetry backend: the query templates it understands, the backend that
//! executes them, and the cache that holds results between polls. Most
//! deployments register exactly one source; multiple sources let different
//! model families point at different Prometheus instances.

use crate::error::{Error, Result};
use crate::metrics_source::MetricsSource;
use dashmap::DashMap;
use std::sync::Arc;

/// Holds named [`MetricsSource`]s.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: DashMap<String, Arc<MetricsSource>>,
}

impl SourceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: DashMap::new(),
        }
    }

    /// Register a source under `name`. Fails if the name is already taken.
    pub fn register(&self, name: impl Into<String>, source: MetricsSource) -> Result<()> {
        let name = name.into();
        if self.sources.contains_key(&name) {
            return Err(Error::Config(format!(
                "duplicate metrics source name '{name}'"
            )));
        }
        self.sources.insert(name, Arc::new(source));
        Ok(())
    }

    /// Look up a source by name.
    pub fn get(&self, name: &str) -> Option<Arc<MetricsSource>> {
        self.sources.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Names of all registered sources.
    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|e| e.key().clone()).collect()
    }
}
