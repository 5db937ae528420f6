//! HTTP error mapping.
//!
//! Every [`DeskError`] maps to a status and a stable code; the body is always
//! `{ "code": ..., "message": ... }`. Internal details are logged, not sent.

use crate::error::DeskError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<DeskError> for ApiError {
    fn from(err: DeskError) -> Self {
        let status = match &err {
            DeskError::ValidationError(_) => StatusCode::BAD_REQUEST,
            DeskError::InvalidAmount | DeskError::UnsupportedMethod(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DeskError::NotFound { .. } => StatusCode::NOT_FOUND,
            DeskError::InvalidStateTransition { .. } | DeskError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            DeskError::Unauthenticated => StatusCode::UNAUTHORIZED,
            DeskError::Forbidden(_) => StatusCode::FORBIDDEN,
            DeskError::ProviderRejected { .. } => StatusCode::BAD_GATEWAY,
            DeskError::ProviderUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            DeskError::ReconciliationMismatch(_)
            | DeskError::CsvError(_)
            | DeskError::IoError(_)
            | DeskError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() && !matches!(status, StatusCode::SERVICE_UNAVAILABLE) {
            tracing::error!(code = err.code(), error = %err, "Internal server error");
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                return Self::new(status, err.code(), "An internal error occurred");
            }
        }
        Self::new(status, err.code(), err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
