//! API error types and conversions

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use vimg_refresh::{CommandError, RefreshError, RegistryError};

/// API error type that converts to HTTP responses
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request
    BadRequest(String),
    /// 401 Unauthorized - account needs new credentials
    ReauthRequired(String),
    /// 404 Not Found
    NotFound(String),
    /// Credential form errors, keyed for display (`invalid_auth`, ...)
    Form {
        status: StatusCode,
        key: &'static str,
        message: String,
    },
    /// 503 Service Unavailable - remote account unreachable
    ServiceUnavailable(String),
}

/// Standard error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::ReauthRequired(msg) => (StatusCode::UNAUTHORIZED, "reauth_required", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Form {
                status,
                key,
                message,
            } => (status, key, message),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        if status.is_server_error() {
            tracing::warn!(error = error_type, %message, "API error");
        } else if status.is_client_error() {
            tracing::debug!(error = error_type, %message, "API client error");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<RefreshError> for ApiError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Auth(msg) => ApiError::ReauthRequired(msg),
            RefreshError::Transient(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let key = err.key();
        match err {
            RegistryError::UnknownEntry(id) => {
                ApiError::NotFound(format!("Account entry not found: {}", id))
            }
            RegistryError::AlreadyConfigured(msg) => ApiError::Form {
                status: StatusCode::CONFLICT,
                key,
                message: msg,
            },
            RegistryError::InvalidAuth(msg) | RegistryError::CannotConnect(msg) => {
                ApiError::Form {
                    status: StatusCode::BAD_REQUEST,
                    key,
                    message: msg,
                }
            }
        }
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
