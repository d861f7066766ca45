//! Error types for the server

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::PredictError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Missing form field '{0}'")]
    MissingField(&'static str),

    #[error("Form field '{field}' must be a boolean, got '{value}'")]
    InvalidOption { field: &'static str, value: String },

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Machine-readable kind reported in the response body
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "bad_request",
            ServerError::MissingField(_) => "missing_field",
            ServerError::InvalidOption { .. } => "invalid_option",
            ServerError::PayloadTooLarge(_) => "payload_too_large",
            ServerError::Predict(e) => e.kind(),
            ServerError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_)
            | ServerError::MissingField(_)
            | ServerError::InvalidOption { .. } => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Predict(PredictError::Decode(_))
            | ServerError::Predict(PredictError::Shape(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Predict(PredictError::Inference(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Predict(PredictError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for ServerError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(err.body_text())
        } else {
            ServerError::BadRequest(err.body_text())
        }
    }
}

impl From<MultipartRejection> for ServerError {
    fn from(rejection: MultipartRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::Predict(e @ PredictError::Inference(_)) => {
                tracing::error!(detail = %e, "Inference failure");
                "Inference failed. Check server logs for details.".to_string()
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": true,
            "kind": self.kind(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
