// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown user, disabled user or wrong password. Always reported identically.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, expired, superseded or logged-out session
    #[error("Session invalid")]
    SessionInvalid,

    /// Missing or mismatched anti-forgery token on a state-changing request
    #[error("CSRF token rejected")]
    CsrfRejected,

    /// Authenticated, but the route policy still denies access
    #[error("Access denied")]
    AccessDenied,

    /// Malformed configuration or route policy. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::SessionInvalid => StatusCode::UNAUTHORIZED,
            AppError::CsrfRejected | AppError::AccessDenied => StatusCode::FORBIDDEN,
            AppError::AuthRateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Configuration(_)
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "AUTH_001",
            AppError::SessionInvalid => "AUTH_002",
            AppError::AuthRateLimited => "AUTH_003",
            AppError::CsrfRejected => "CSRF_001",
            AppError::AccessDenied => "ACL_001",
            AppError::Configuration(_) => "CFG_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Internal(_) => "INT_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::InvalidCredentials | AppError::SessionInvalid => {
                "Authentication failed".to_string()
            },
            AppError::AuthRateLimited => {
                "Too many authentication attempts, please try again later".to_string()
            },
            AppError::CsrfRejected => "Request could not be verified".to_string(),
            AppError::AccessDenied => "Access denied".to_string(),
            AppError::InvalidInput(_) => "Invalid input provided".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::Configuration(_)
            | AppError::Internal(_)
            | AppError::Io(_)
            | AppError::Json(_) => "An internal server error occurred".to_string(),
        }
    }

    /// True for the outcomes a login attempt may legitimately end in
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, AppError::InvalidCredentials | AppError::AuthRateLimited)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = serde_json::json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<axum::http::header::InvalidHeaderValue> for AppError {
    fn from(err: axum::http::header::InvalidHeaderValue) -> Self {
        AppError::Internal(format!("invalid header value: {err}"))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {err}"))
    }
}
