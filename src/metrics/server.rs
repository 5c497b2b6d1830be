//! HTTP server for the metrics and status endpoints.

use crate::controller::ControllerSnapshot;
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 9090).into(),
        }
    }
}

impl MetricsServerConfig {
    /// Creates a config with a custom port.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// Shared state for the handlers.
pub struct MetricsState {
    registry: MetricsRegistry,
    snapshots: watch::Receiver<ControllerSnapshot>,
}

impl MetricsState {
    /// Latest controller snapshot.
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Pulls the latest snapshot into the registry.
    pub fn refresh(&self) {
        let snapshot = MetricsSnapshot::from_controller(&self.snapshots.borrow());
        self.registry.update(&snapshot);
    }
}

/// Serves `/metrics` (Prometheus), `/health` and `/status` (JSON
/// controller snapshot).
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: Arc<MetricsState>,
}

impl MetricsServer {
    /// Creates a new metrics server fed by the controller's watch channel.
    pub fn new(
        config: MetricsServerConfig,
        registry: MetricsRegistry,
        snapshots: watch::Receiver<ControllerSnapshot>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(MetricsState {
                registry,
                snapshots,
            }),
        }
    }

    /// Returns the shared state.
    pub fn state(&self) -> Arc<MetricsState> {
        Arc::clone(&self.state)
    }

    /// Builds the router without binding.
    pub fn router(&self) -> Router {
        // Station screens poll /status from a browser
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE])
            .max_age(Duration::from_secs(60 * 60));

        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Starts the HTTP server and runs it until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(
            addr = %self.config.bind_addr,
            "Metrics server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        Ok(())
    }
}

/// Handler for the /metrics endpoint.
async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    state.refresh();

    match state.registry.encode() {
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

/// Handler for the /health endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Handler for the /status endpoint.
async fn status_handler(State(state): State<Arc<MetricsState>>) -> Json<ControllerSnapshot> {
    Json(state.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{LoopState, Status};

    #[test]
    fn test_config_default() {
        let config = MetricsServerConfig::default();
        assert_eq!(config.bind_addr.port(), 9090);
    }

    #[test]
    fn test_config_with_port() {
        let config = MetricsServerConfig::with_port(8080);
        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[tokio::test]
    async fn test_endpoints_reflect_latest_snapshot() {
        let (tx, rx) = watch::channel(ControllerSnapshot::default());
        let server = MetricsServer::new(
            MetricsServerConfig::default(),
            MetricsRegistry::new().unwrap(),
            rx,
        );
        let app = server.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        tx.send_modify(|s| {
            s.state = LoopState::Active;
            s.status = Status::UnknownFace;
            s.counters.ticks = 5;
        });

        let client = reqwest::Client::new();
        let status: serde_json::Value = client
            .get(format!("http://{addr}/status"))
            .header("origin", "http://station.local")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["state"], "active");
        assert_eq!(status["status"], "unknown_face");

        let metrics = client
            .get(format!("http://{addr}/metrics"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(metrics.contains("face_attendance_ticks_total 5"));

        let cors = client
            .get(format!("http://{addr}/health"))
            .header("origin", "http://station.local")
            .send()
            .await
            .unwrap();
        assert_eq!(
            cors.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
