use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::queue::QueueError;
use crate::registry::RegistryError;
use crate::screen::ScreenError;
use crate::store::StoreError;

/// Structured error type for all API handlers.
///
/// Each variant maps to an HTTP status code, a machine-readable code string,
/// and a human-readable message. Implements [`IntoResponse`] so handlers can
/// return `Result<T, ApiError>` directly.
///
/// Internal faults carry their detail for the server log only; the wire
/// response is always the generic message, so store-layer errors are never
/// leaked to clients.
#[derive(Debug)]
pub enum ApiError {
    /// 400 - Malformed or invalid request.
    InvalidRequest(String),
    /// 404 - The target never pushed a frame.
    NoScreenData,
    /// 404 - A frame existed but aged past the TTL.
    ScreenExpired,
    /// 404 - Unmatched route.
    NotFound,
    /// 500 - Store or serialization fault. Detail is logged, not returned.
    Internal(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error variant.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NoScreenData => StatusCode::NOT_FOUND,
            ApiError::ScreenExpired => StatusCode::NOT_FOUND,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a machine-readable error code string.
    ///
    /// `no_screen_data` and `screen_expired` share a 404 status but stay
    /// distinguishable here, so the controller can render "never streamed"
    /// and "stream stalled" differently.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::NoScreenData => "no_screen_data",
            ApiError::ScreenExpired => "screen_expired",
            ApiError::NotFound => "not_found",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Returns the human-readable message sent to the client.
    pub fn message(&self) -> String {
        match self {
            ApiError::InvalidRequest(detail) => format!("Invalid request: {detail}"),
            ApiError::NoScreenData => "No screen data".to_string(),
            ApiError::ScreenExpired => "Screen data expired".to_string(),
            ApiError::NotFound => "Not found".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(%detail, "internal fault reported to client");
        }
        let body = serde_json::json!({
            "error": self.message(),
            "code": self.code(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::EmptyTargetId => ApiError::InvalidRequest(err.to_string()),
            RegistryError::Store(e) => e.into(),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::EmptyTargetId => ApiError::InvalidRequest(err.to_string()),
            QueueError::Store(e) => e.into(),
        }
    }
}

impl From<ScreenError> for ApiError {
    fn from(err: ScreenError) -> Self {
        match err {
            ScreenError::FrameTooSmall(_) => ApiError::InvalidRequest(err.to_string()),
            ScreenError::NotFound => ApiError::NoScreenData,
            ScreenError::Expired => ApiError::ScreenExpired,
            ScreenError::Store(e) => e.into(),
        }
    }
}
