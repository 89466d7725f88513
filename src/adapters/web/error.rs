//! HTTP error responses for the API adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::admission::Rejection;
use crate::domain::error::PinerankError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<PinerankError> for ApiError {
    fn from(err: PinerankError) -> Self {
        let status = match &err {
            PinerankError::SourceNotFound { .. } => StatusCode::NOT_FOUND,
            PinerankError::SourceAccessDenied { .. } | PinerankError::Transform { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PinerankError::SourceTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            PinerankError::TooManyConcurrent { .. } | PinerankError::RateLimited { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            PinerankError::ConfigParse { .. }
            | PinerankError::ConfigMissing { .. }
            | PinerankError::ConfigInvalid { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        let message = match rejection {
            Rejection::Concurrent { max } => {
                format!("too many concurrent requests (max {max}), try again shortly")
            }
            Rejection::RateWindow { max } => {
                format!("rate limit exceeded ({max} per hour), try again later")
            }
        };
        Self::new(StatusCode::TOO_MANY_REQUESTS, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
