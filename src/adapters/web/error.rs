//! JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::error::CipherquantError;

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

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

pub fn status_from_error(err: &CipherquantError) -> StatusCode {
    match err {
        CipherquantError::InvalidStrategy { .. } => StatusCode::NOT_FOUND,
        CipherquantError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        CipherquantError::MissingColumns { .. } | CipherquantError::InsufficientData { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CipherquantError::DataIntegrity { .. }
        | CipherquantError::Database { .. }
        | CipherquantError::DatabaseQuery { .. }
        | CipherquantError::ConfigParse { .. }
        | CipherquantError::ConfigMissing { .. }
        | CipherquantError::ConfigInvalid { .. }
        | CipherquantError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CipherquantError> for ApiError {
    fn from(err: CipherquantError) -> Self {
        let status = status_from_error(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "evaluation task failed");
        Self::internal("evaluation task failed")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
