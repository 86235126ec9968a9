//! HTTP JSON API.
//!
//! Endpoints:
//! - GET    /health                        - Liveness
//! - POST   /images/generate               - Prompt-first pipeline
//! - POST   /images/sketch                 - Sketch-first pipeline (multipart)
//! - POST   /images/preview-first          - Preview-first pipeline
//! - POST   /images/{id}/extract-stamp     - Recover the stamp of a preview
//! - POST   /images/remove-background      - Background removal (multipart)
//! - POST   /images/upscale                - Upscale (multipart)
//! - GET    /images, /images/{id}          - Query artifacts
//! - DELETE /images, /images/{id}          - Delete artifacts
//! - POST   /payments/image/{id}           - Attach a checkout session
//! - GET    /payments/image/{id}           - Payment info
//! - POST   /payments/image/{id}/deliver   - Re-send an approved stamp
//! - PATCH  /payments/{id}/status          - Manual status correction
//! - POST   /payments/notification         - Gateway webhook

mod error;
mod images;
mod payments;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tracing::info;

use crate::application::catalog::ArtifactCatalog;
use crate::application::payments::PaymentStateMachine;
use crate::application::pipeline::PipelineOrchestrator;
use crate::error::Result;

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub pipeline: PipelineOrchestrator,
    pub catalog: ArtifactCatalog,
    pub payments: PaymentStateMachine,
}

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({ "error": message })))
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/images",
            get(images::handle_list).delete(images::handle_delete_all),
        )
        .route("/images/generate", post(images::handle_generate))
        .route("/images/sketch", post(images::handle_sketch))
        .route("/images/preview-first", post(images::handle_preview_first))
        .route(
            "/images/remove-background",
            post(images::handle_remove_background),
        )
        .route("/images/upscale", post(images::handle_upscale))
        .route(
            "/images/{id}",
            get(images::handle_get).delete(images::handle_delete),
        )
        .route(
            "/images/{id}/extract-stamp",
            post(images::handle_extract_stamp),
        )
        .route(
            "/payments/image/{id}",
            post(payments::handle_attach).get(payments::handle_info),
        )
        .route(
            "/payments/image/{id}/deliver",
            post(payments::handle_redeliver),
        )
        .route(
            "/payments/{id}/status",
            patch(payments::handle_update_status),
        )
        .route(
            "/payments/notification",
            post(payments::handle_notification),
        )
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Serve the API until Ctrl+C.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}
