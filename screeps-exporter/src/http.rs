//! HTTP server for the scrape endpoints.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde_json::json;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::cycle::{CycleError, SharedExporter};
use crate::exposition::CONTENT_TYPE;
use crate::families::{MetricGroup, Scope};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    exporter: SharedExporter,
}

/// Create the HTTP router.
fn create_router(exporter: SharedExporter, metrics_path: &str) -> Router {
    let state = AppState { exporter };

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/users/detail", get(users_handler))
        .route("/room", get(rooms_handler))
        .route(metrics_path, get(metrics_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A cycle that could not produce a scrape body.
struct ScrapeFailure(CycleError);

impl IntoResponse for ScrapeFailure {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Scrape failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

async fn scrape(state: &AppState, scope: Scope) -> Result<Response, ScrapeFailure> {
    let body = state.exporter.scrape(scope).await.map_err(ScrapeFailure)?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response())
}

/// Handler for the / endpoint.
async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Screeps Prometheus exporter",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Handler for the /health endpoint.
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": screeps_common::current_timestamp_millis(),
    }))
}

/// Handler for the /ready endpoint.
async fn ready_handler(State(state): State<AppState>) -> Response {
    match state.exporter.ping().await {
        Ok(()) => (StatusCode::OK, "ready\n").into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("not ready - {}\n", e),
        )
            .into_response(),
    }
}

/// Handler for the /users/detail endpoint.
async fn users_handler(State(state): State<AppState>) -> Result<Response, ScrapeFailure> {
    scrape(&state, Scope::Only(MetricGroup::Users)).await
}

/// Handler for the /room endpoint.
async fn rooms_handler(State(state): State<AppState>) -> Result<Response, ScrapeFailure> {
    scrape(&state, Scope::Only(MetricGroup::Rooms)).await
}

/// Handler for the combined metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Result<Response, ScrapeFailure> {
    scrape(&state, Scope::All).await
}

/// HTTP server configuration.
pub struct HttpServer {
    exporter: SharedExporter,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(exporter: SharedExporter, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            exporter,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.exporter, &self.metrics_path);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::Exporter;
    use crate::families::ALL_FAMILIES;
    use crate::repository::InMemoryRepository;
    use crate::sink::MetricSink;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use screeps_common::{ResourceStore, UserRecord, WorldObject};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_repository() -> Arc<InMemoryRepository> {
        Arc::new(InMemoryRepository::new(
            vec![
                UserRecord::new("u1")
                    .with_contact("alice@example.com")
                    .with_name("Alice")
                    .with_rooms(["W1N1"]),
            ],
            vec![
                WorldObject::new("u1", "W1N1", "spawn")
                    .with_store(ResourceStore::new().with("energy", 300.0)),
            ],
        ))
    }

    fn make_router(repository: Arc<InMemoryRepository>, path: &str) -> Router {
        let sink = Arc::new(MetricSink::with_families(ALL_FAMILIES.iter()));
        let exporter = Arc::new(Exporter::new(repository, sink, "Unknown"));
        create_router(exporter, path)
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let router = make_router(make_repository(), "/metrics");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(
            content_type
                .to_str()
                .unwrap()
                .contains("application/openmetrics-text")
        );
    }

    #[tokio::test]
    async fn test_room_endpoint() {
        let (status, body) = get_body(make_router(make_repository(), "/metrics"), "/room").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("screep_users_energy{userName=\"Alice\",room=\"W1N1\"} 300"));
        assert!(!body.contains("screep_users_GCL"));
    }

    #[tokio::test]
    async fn test_users_endpoint() {
        let (status, body) =
            get_body(make_router(make_repository(), "/metrics"), "/users/detail").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("screep_users_total_room_count{userName=\"Alice\"} 1"));
        assert!(!body.contains("screep_users_energy"));
    }

    #[tokio::test]
    async fn test_failed_cycle_returns_500() {
        let repository = make_repository();
        repository.set_failure(Some("connection refused"));

        let (status, body) = get_body(make_router(repository, "/metrics"), "/room").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Internal Server Error");
    }

    #[tokio::test]
    async fn test_root_and_health_endpoints() {
        let router = make_router(make_repository(), "/metrics");

        let (status, body) = get_body(router.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        let root: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(root["version"], env!("CARGO_PKG_VERSION"));

        let (status, body) = get_body(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert!(health["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_ready_endpoint() {
        let repository = make_repository();
        let router = make_router(Arc::clone(&repository), "/metrics");

        let (status, _) = get_body(router.clone(), "/ready").await;
        assert_eq!(status, StatusCode::OK);

        repository.set_failure(Some("down"));
        let (status, _) = get_body(router, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let router = make_router(make_repository(), "/prometheus/metrics");

        let (status, _) = get_body(router.clone(), "/prometheus/metrics").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = get_body(router, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
