//! Local HTTP exporter for the scanner metrics.
//!
//! `/metrics` serves the Prometheus text format. `/health` reports the
//! session state and fails when more than one camera stream is held.

use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

/// Errors from the metrics exporter.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind metrics listener: {0}")]
    Bind(#[from] std::io::Error),

    /// The server stopped with an error.
    #[error("metrics server error: {0}")]
    Server(String),
}

/// Latest scanner state as seen by the exporter.
pub struct MetricsState {
    registry: MetricsRegistry,
    last: MetricsSnapshot,
}

impl MetricsState {
    /// Records a new snapshot.
    pub fn update(&mut self, snapshot: &MetricsSnapshot) {
        self.registry.update(snapshot);
        self.last = snapshot.clone();
    }

    fn open_streams(&self) -> u64 {
        self.last
            .stream_acquisitions
            .saturating_sub(self.last.stream_releases)
    }

    fn health(&self) -> (StatusCode, String) {
        let open = self.open_streams();
        if open > 1 {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("LEAK {} camera streams held", open),
            );
        }
        let state = match self.last.session_state {
            0 => "idle",
            1 => "requesting",
            2 => "scanning",
            _ => "stopping",
        };
        (StatusCode::OK, format!("OK {}", state))
    }
}

/// Exporter bound to a loopback port.
pub struct MetricsServer {
    addr: SocketAddr,
    state: Arc<RwLock<MetricsState>>,
}

impl MetricsServer {
    /// Creates an exporter for `127.0.0.1:<port>`.
    pub fn localhost(port: u16, registry: MetricsRegistry) -> Self {
        Self {
            addr: ([127, 0, 0, 1], port).into(),
            state: Arc::new(RwLock::new(MetricsState {
                registry,
                last: MetricsSnapshot::default(),
            })),
        }
    }

    /// Address the exporter listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared state; push snapshots through it.
    pub fn state(&self) -> Arc<RwLock<MetricsState>> {
        Arc::clone(&self.state)
    }

    /// Serves until the runtime shuts down.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "Metrics exporter listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

async fn metrics_handler(State(state): State<Arc<RwLock<MetricsState>>>) -> impl IntoResponse {
    match state.read().await.registry.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

async fn health_handler(State(state): State<Arc<RwLock<MetricsState>>>) -> impl IntoResponse {
    state.read().await.health()
}
