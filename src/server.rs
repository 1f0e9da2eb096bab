//! Metrics exposition endpoint.
//!
//! Serves the shared [`Registry`] in the Prometheus text format on
//! `GET /metrics`, plus a `/healthz` liveness probe. The listener runs on its
//! own task and never blocks (or is blocked by) the polling loop; registry
//! reads interleave safely with the sink's writes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Metrics server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the configured port. Fatal at startup.
    #[error("failed to bind metrics endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed after startup.
    #[error("metrics server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Registry written by the polling loop and read by `/metrics`.
    pub registry: Registry,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Bind the metrics listener on all interfaces.
pub async fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Serve the router until the shutdown token fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Text exposition of every registered metric family.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&state.registry.gather()) {
        Ok(body) => ([(header::CONTENT_TYPE, encoder.format_type())], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::metrics::PingMetrics;
    use crate::poller::ProbeResult;

    fn router_with_one_result() -> Router {
        let registry = Registry::new();
        let metrics = PingMetrics::new(&registry).unwrap();
        metrics.record(&ProbeResult::failure("10.0.0.1", None));
        create_router(AppState { registry })
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = router_with_one_result();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let app = router_with_one_result();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("text/plain"), "{content_type}");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8_lossy(&bytes);
        assert!(body.contains("ping_success{destination=\"10.0.0.1\"} 0"));
        assert!(body.contains("ping_rtt_avg_ms{destination=\"10.0.0.1\"} NaN"));
        assert!(body.contains("ping_packet_transmit_total{destination=\"10.0.0.1\"} 0"));
    }

    #[tokio::test]
    async fn test_bind_rejects_port_in_use() {
        let first = bind(0).await.unwrap();
        let port = first.local_addr().unwrap().port();

        let result = bind(port).await;
        assert!(matches!(result, Err(ServerError::Bind { .. })));
    }
}
