// Copyright 2026 GPU Autoscaler Working Group

//! Span-instrumentation helpers for reconcile-loop operations.

use async_trait::async_trait;
use std::future::Future;

/// Wraps an async operation in a tracing span with caller-supplied attributes.
///
/// Implemented by the reconcile engine so each cycle, source refresh, or
/// backend query carries a span named after the operation without every
/// call site hand-building one.
#[async_trait]
pub trait Traceable {
    async fn execute_traced<F, T>(&self, operation: &str, f: F) -> T
    where
        F: Future<Output = T> + Send,
        T: Send;
}

/// Runs `$body` inside an `info_span!($name, ...)`, instrumenting the future.
///
/// ```ignore
/// use llmscaler_observability::traced_span;
///
/// let outcome = traced_span!("reconcile_cycle", model_id = %resource.model_id, {
///     engine.run_cycle(&resource).await
/// });
/// ```
#[macro_export]
macro_rules! traced_span {
    ($name:expr, $body:expr) => {{
        use tracing::Instrument;
        let span = tracing::info_span!($name);
        async move { $body }.instrument(span).await
    }};
    ($name:expr, $($key:ident = $value:expr),+ , $body:expr) => {{
        use tracing::Instrument;
        let span = tracing::info_span!($name, $($key = $value),+);
        async move { $body }.instrument(span).await
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Instrument;

    struct TracedResource {
        name: String,
    }

    #[async_trait]
    impl Traceable for TracedResource {
        async fn execute_traced<F, T>(&self, operation: &str, f: F) -> T
        where
            F: Future<Output = T> + Send,
            T: Send,
        {
            let span = tracing::info_span!(
                "resource.execute",
                resource.name = %self.name,
                operation = operation
            );
            f.instrument(span).await
        }
    }

    #[tokio::test]
    async fn execute_traced_returns_the_wrapped_future_output() {
        let resource = TracedResource { name: "m1".to_string() };
        let result = resource.execute_traced("refresh", async { 7 }).await;
        assert_eq!(result, 7);
    }

    #[tokio::test]
    async fn traced_span_macro_returns_body_value() {
        let result = traced_span!("test_span", 100);
        assert_eq!(result, 100);
    }
}
