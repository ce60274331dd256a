//! Error responses for API handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::types::ErrorResponse;
use crate::hardware::HardwareError;

/// Failures that abort a request with HTTP 500
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Hardware(#[from] HardwareError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self);
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
