use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudioError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Malformed request: {0}")]
    BadRequest(String),
    #[error("Provider error {status} ({name}): {}", details.join("; "))]
    ProviderError {
        status: u16,
        name: String,
        details: Vec<String>,
    },
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },
    #[error("Payment gateway error: {0}")]
    GatewayError(String),
    #[error("Artifact not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Delivery error: {0}")]
    DeliveryError(String),
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),
    #[error("Internal error: {0}")]
    InternalError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StudioError {
    pub fn not_found(id: &str) -> Self {
        Self::NotFound(id.to_string())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(Box::new(std::io::Error::other(message.into())))
    }
}

impl From<std::io::Error> for StudioError {
    fn from(err: std::io::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

impl From<base64::DecodeError> for StudioError {
    fn from(err: base64::DecodeError) -> Self {
        Self::InternalError(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for StudioError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::InternalError(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for StudioError {
    fn from(err: rocksdb::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
