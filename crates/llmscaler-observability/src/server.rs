// Copyright 2026 GPU Autoscaler Working Group

//! `/metrics` and `/healthz` endpoints served over HTTP.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use llmscaler::publisher::Publisher;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    publisher: Arc<Publisher>,
}

impl AppState {
    /// Build the state wrapping a publisher.
    pub fn new(publisher: Arc<Publisher>) -> Self {
        Self { publisher }
    }
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.publisher.gather() {
        Ok(body) => (StatusCode::OK, body),
        Err(err) => {
            tracing::error!(error = %err, "failed to gather metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve `/metrics` + `/healthz` on `addr` until the process exits.
pub async fn serve(addr: &str, publisher: Arc<Publisher>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics server listening");
    axum::serve(listener, router(AppState::new(publisher))).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_returns_ok() {
        let state = AppState::new(Arc::new(Publisher::new().unwrap()));
        let response = router(state)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_returns_prometheus_text() {
        let state = AppState::new(Arc::new(Publisher::new().unwrap()));
        let response = router(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
