// Copyright 2026 GPU Autoscaler Working Group

//! Error types for the saturation-driven replica decision engine.

use thiserror::Error;

/// Error type for `llmscaler` operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A threshold invariant was violated, a required field was missing, or a
    /// model id reference could not be resolved. Not retried; surfaced via a
    /// status condition.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A query template was rendered with a required parameter missing.
    #[error("missing required parameter '{param}' for query '{query}'")]
    ParamMissing {
        /// Name of the query template being rendered.
        query: String,
        /// Name of the missing parameter.
        param: String,
    },

    /// A query template failed to register or render (duplicate name,
    /// placeholder/parameter-list mismatch, disallowed delimiter sequence in
    /// a parameter value).
    #[error("template error: {0}")]
    Template(String),

    /// Timeout, 5xx, or partial result from the telemetry backend. Retried
    /// internally with bounded backoff; on exhaustion the cycle aborts with
    /// `MetricsUnavailable`.
    #[error("transient backend error for query '{query}': {source}")]
    BackendTransient {
        /// Name of the query that failed.
        query: String,
        /// Underlying transport/parse error.
        #[source]
        source: anyhow::Error,
    },

    /// Authentication failure or unknown metric. Not retried within a cycle;
    /// surfaced once and the next poll retries fresh.
    #[error("permanent backend error for query '{query}': {source}")]
    BackendPermanent {
        /// Name of the query that failed.
        query: String,
        /// Underlying transport/parse error.
        #[source]
        source: anyhow::Error,
    },

    /// The deployment referenced by a managed resource could not be found.
    #[error("scale target not found: {0}")]
    TargetNotFound(String),

    /// Every query in a `refresh_all` batch failed; treated as a
    /// source-wide connectivity failure so the cycle is skipped entirely
    /// rather than acting on empty data.
    #[error("metrics unavailable: {0}")]
    MetricsUnavailable(String),

    /// A cached value's age exceeded the abandon ceiling.
    #[error("metrics for '{0}' are stale beyond the abandon ceiling")]
    StaleMetrics(String),

    /// Catch-all for I/O, transport, or other infrastructure failures that
    /// don't warrant their own variant.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for `llmscaler` operations.
pub type Result<T> = std::result::Result<T, Error>;
