//! HTTP surface of the control panel.
//!
//! JSON API under /api plus static frontend assets at the root. The API
//! only ever reports external-tool failures through the polled record:
//! a download request that was accepted stays a 200 no matter what the
//! tool does later.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::core::config;
use crate::core::stats::collect_stats;
use crate::core::validation::validate_download_url;
use crate::download::ytdlp::{probe_url, ProbeOutcome};
use crate::download::DownloadManager;
use crate::storage::{DownloadId, DownloadStore, NewDownload};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<DownloadManager>,
    pub store: Arc<dyn DownloadStore>,
}

/// Body of POST /api/test-url.
#[derive(Debug, Deserialize)]
struct TestUrlRequest {
    url: Option<String>,
}

/// Build the panel router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/downloads", get(list_downloads).post(create_download))
        .route("/api/downloads/active", get(list_active_downloads))
        .route("/api/downloads/{id}/stop", post(stop_download))
        .route("/api/downloads/{id}", delete(delete_download))
        .route("/api/test-url", post(test_url))
        .route("/api/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .fallback_service(ServeDir::new(&*config::STATIC_DIR))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server and serve until shutdown.
pub async fn start_web_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = build_router(state);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  GET    /api/downloads          - all downloads");
    log::info!("  GET    /api/downloads/active   - active downloads");
    log::info!("  POST   /api/downloads          - start a download");
    log::info!("  POST   /api/downloads/:id/stop - stop a download");
    log::info!("  DELETE /api/downloads/:id      - delete a download");
    log::info!("  POST   /api/test-url           - probe a URL");
    log::info!("  GET    /api/stats              - aggregate stats");
    log::info!("  GET    /health                 - health check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    log::info!("Shutdown signal received");
}

/// GET /api/downloads: all records, newest first.
async fn list_downloads(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.list_all().await)
}

/// GET /api/downloads/active: pending and downloading records.
async fn list_active_downloads(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.list_active().await)
}

/// POST /api/downloads: create a record and start its lifecycle.
async fn create_download(
    State(state): State<AppState>,
    payload: Result<Json<NewDownload>, JsonRejection>,
) -> Response {
    let Ok(Json(request)) = payload else {
        return invalid_download_data();
    };

    if let Err(e) = validate_download_url(&request.url) {
        log::debug!("Rejected download request: {}", e);
        return invalid_download_data();
    }

    let record = state.manager.start(request).await;
    Json(record).into_response()
}

fn invalid_download_data() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "message": "Invalid download data" })),
    )
        .into_response()
}

/// POST /api/downloads/{id}/stop
async fn stop_download(State(state): State<AppState>, Path(id): Path<DownloadId>) -> Response {
    match state.manager.stop(id).await {
        Some(download) => Json(download).into_response(),
        None => not_found(),
    }
}

/// DELETE /api/downloads/{id}
async fn delete_download(State(state): State<AppState>, Path(id): Path<DownloadId>) -> Response {
    match state.manager.delete(id).await {
        Ok(true) => Json(json!({ "success": true })).into_response(),
        Ok(false) => not_found(),
        Err(e) => {
            log::error!("Failed to delete download {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Failed to delete download" })),
            )
                .into_response()
        }
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Download not found" })),
    )
        .into_response()
}

/// POST /api/test-url: pre-flight probe, no record involved.
///
/// Probe failure is a 200 with `success: false`; only a missing URL is a
/// client error.
async fn test_url(
    State(_state): State<AppState>,
    payload: Result<Json<TestUrlRequest>, JsonRejection>,
) -> Response {
    let url = match payload {
        Ok(Json(TestUrlRequest { url: Some(url) })) if !url.trim().is_empty() => url,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": "URL is required" })),
            )
                .into_response();
        }
    };

    match probe_url(&url).await {
        ProbeOutcome::Resolved { title, duration } => Json(json!({
            "success": true,
            "title": title,
            "duration": duration,
            "message": "URL is valid and available for download",
        }))
        .into_response(),
        ProbeOutcome::Unresolved { detail } => Json(json!({
            "success": false,
            "message": "URL is not available or invalid",
            "error": detail,
        }))
        .into_response(),
    }
}

/// GET /api/stats: recomputed projection over the store.
async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(collect_stats(state.store.as_ref()).await)
}

/// GET /health: simple health check.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
