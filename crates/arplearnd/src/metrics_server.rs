//! HTTP metrics server for Prometheus scraping

use crate::metrics::MetricsCollector;
use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use prometheus::{Encoder, TextEncoder};
use std::net::{Ipv6Addr, SocketAddr};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
struct MetricsServerState {
    collector: MetricsCollector,
}

fn router(collector: MetricsCollector) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(MetricsServerState { collector })
}

/// Serve `/metrics` and `/health` on localhost until `shutdown` fires
pub async fn start_metrics_server(
    collector: MetricsCollector,
    port: u16,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = SocketAddr::from((Ipv6Addr::LOCALHOST, port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Starting metrics server on http://[::1]:{}/metrics", port);

    axum::serve(listener, router(collector))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Handle /metrics endpoint - Prometheus text format
async fn metrics_handler(State(state): State<MetricsServerState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.collector.registry.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

/// Handle /health endpoint
async fn health_handler(State(state): State<MetricsServerState>) -> impl IntoResponse {
    let running = state.collector.health_status.get() >= 1.0;
    let (code, status) = if running {
        (StatusCode::OK, "running")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "terminated")
    };

    let body = format!(r#"{{"status": "{}"}}"#, status);
    (code, [("content-type", "application/json")], body)
}
