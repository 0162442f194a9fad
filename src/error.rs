use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("No camera found for room {0}")]
    NoSuchCamera(String),

    #[error("Target connection {0} is not connected")]
    NoSuchTarget(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many login attempts, try again later")]
    TooManyAttempts,

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Redis error: {0}")]
    RedisError(String),
}

impl AppError {
    /// Numeric code carried in WebSocket `error` envelopes; same mapping as
    /// the HTTP status below.
    pub fn code(&self) -> u16 {
        match self {
            AppError::AuthRequired => 401,
            AppError::AccessDenied(_) => 403,
            AppError::NoSuchCamera(_) => 404,
            AppError::NoSuchTarget(_) => 404,
            AppError::InvalidMessage(_) => 400,
            AppError::BadRequest(_) => 400,
            AppError::TooManyAttempts => 429,
            AppError::InternalError(_) => 500,
            AppError::RedisError(_) => 500,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": self.to_string(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::RedisError(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for AppError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        AppError::RedisError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidMessage(format!("JSON error: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        // Missing, malformed, expired and bad-signature tokens all collapse
        // into one failure kind so callers cannot tell which check failed.
        AppError::AuthRequired
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
