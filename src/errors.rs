use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::registry::RegistryError;
use crate::slack::client::SlackError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid slack signature")]
    InvalidSignature,

    #[error("access request not found")]
    RequestNotFound,

    #[error("missing or invalid token")]
    Unauthenticated,

    #[error("missing required role")]
    Forbidden,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("slack error: {0}")]
    Slack(#[from] SlackError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound => AppError::RequestNotFound,
            // Ids are v4 UUIDs generated at submission; a collision is a bug.
            RegistryError::DuplicateKey => {
                AppError::Internal(anyhow::anyhow!("duplicate request id"))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::InvalidSignature => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_signature",
                "request signature verification failed".to_string(),
            ),
            AppError::RequestNotFound => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "request_not_found",
                "access request not found".to_string(),
            ),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "token_invalid",
                "missing or invalid token".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "missing_role",
                "caller lacks a required role".to_string(),
            ),
            AppError::InvalidRequest(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_request_error",
                "validation_failed",
                reason.clone(),
            ),
            AppError::Slack(e) => {
                tracing::error!("Slack error: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "slack_failed",
                    "failed to reach Slack".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
