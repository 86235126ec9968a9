//! Payment routes under `/payments`, including the gateway webhook.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::info;

use super::AppState;
use super::error::WebhookError;
use crate::domain::artifact::PaymentStatus;
use crate::domain::payment::{InboundNotification, Notification, PaymentRequest};
use crate::error::Result;

pub(crate) const SIGNATURE_HEADER: &str = "x-signature";
pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    #[serde(default)]
    status: String,
}

/// POST /payments/image/{id}
pub(crate) async fn handle_attach(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> Result<impl IntoResponse> {
    let artifact = state.payments.attach_payment(&id, request).await?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// GET /payments/image/{id}
pub(crate) async fn handle_info(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.payments.payment_info(&id).await?))
}

/// PATCH /payments/{id}/status
pub(crate) async fn handle_update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<impl IntoResponse> {
    let status: PaymentStatus = body.status.parse()?;
    Ok(Json(state.payments.update_payment_status(&id, status).await?))
}

/// POST /payments/image/{id}/deliver
pub(crate) async fn handle_redeliver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.payments.redeliver(&id).await?;
    Ok(Json(serde_json::json!({ "message": "Delivery sent" })))
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// POST /payments/notification
///
/// The body is parsed leniently: a body that is not JSON is still
/// authenticated first, so a forged request is refused before its shape is
/// judged.
pub(crate) async fn handle_notification(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<impl IntoResponse, WebhookError> {
    let notification = InboundNotification {
        body: serde_json::from_slice::<Notification>(&body).ok(),
        signature: header(&headers, SIGNATURE_HEADER),
        request_id: header(&headers, REQUEST_ID_HEADER),
        query_data_id: query.get("data.id").cloned(),
    };

    let outcome = state.payments.handle_notification(notification).await?;
    info!(outcome = %outcome.message(), "notification handled");
    Ok((StatusCode::OK, outcome.message()))
}
