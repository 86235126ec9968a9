use super::json_error;
use crate::error::StudioError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

impl StudioError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StudioError::ValidationError(_) | StudioError::BadRequest(_) => StatusCode::BAD_REQUEST,
            StudioError::ProviderError { .. } | StudioError::GatewayError(_) => {
                StatusCode::BAD_GATEWAY
            }
            StudioError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            StudioError::NotFound(_) => StatusCode::NOT_FOUND,
            StudioError::Forbidden(_) => StatusCode::FORBIDDEN,
            StudioError::Conflict(_) => StatusCode::CONFLICT,
            StudioError::DeliveryError(_)
            | StudioError::Misconfiguration(_)
            | StudioError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StudioError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }
        match self {
            StudioError::ProviderError {
                status: upstream,
                name,
                details,
            } => (
                status,
                Json(serde_json::json!({
                    "error": format!("Image provider returned {}", upstream),
                    "provider": { "status": upstream, "name": name, "errors": details },
                })),
            )
                .into_response(),
            // Internal detail stays in the log.
            StudioError::InternalError(_) => {
                json_error(status, "Internal server error").into_response()
            }
            other => json_error(status, &other.to_string()).into_response(),
        }
    }
}

/// Error wrapper for the webhook route.
///
/// Gateway failures answer 503 so the gateway redelivers the notification
/// later instead of treating it as handled.
pub struct WebhookError(pub StudioError);

impl From<StudioError> for WebhookError {
    fn from(err: StudioError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self.0 {
            StudioError::GatewayError(message) => {
                error!(error = %message, "payment detail fetch failed");
                json_error(StatusCode::SERVICE_UNAVAILABLE, &message).into_response()
            }
            other => other.into_response(),
        }
    }
}
