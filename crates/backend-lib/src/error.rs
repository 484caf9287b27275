// crates/backend-lib/src/error.rs

//! Central error type + Axum integration.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use toolroom_common::{ErrorBody, ErrorDetail};

/// Why a login attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No account with that email
    NotFound,
    /// Account exists but the password does not match
    BadPassword,
    /// Password matches but the email was never confirmed
    Unconfirmed,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::NotFound => f.write_str("account not found"),
            AuthFailure::BadPassword => f.write_str("wrong password"),
            AuthFailure::Unconfirmed => f.write_str("email not confirmed"),
        }
    }
}

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Authentication failed: {0}")]
    Auth(AuthFailure),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Could not process image: {0}")]
    Encode(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication rate limit exceeded")]
    AuthRateLimited,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::Auth(AuthFailure::Unconfirmed) => StatusCode::FORBIDDEN,
            AppError::Auth(_) | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Encode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidInput(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::AuthRateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(AuthFailure::NotFound | AuthFailure::BadPassword) => "AUTH_001",
            AppError::Auth(AuthFailure::Unconfirmed) => "AUTH_002",
            AppError::AuthRateLimited => "AUTH_003",
            AppError::Unauthenticated => "AUTH_004",
            AppError::DuplicateEmail => "ACCT_001",
            AppError::InvalidToken => "TOKEN_001",
            AppError::NotFound(_) => "NF_001",
            AppError::Encode(_) => "IMG_001",
            AppError::InvalidInput(_) => "VAL_001",
            AppError::Json(_) => "JSON_001",
            AppError::Database(_) => "DB_001",
            AppError::Io(_) => "IO_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            // Same text for both so responses do not reveal which emails exist.
            AppError::Auth(AuthFailure::NotFound | AuthFailure::BadPassword) => {
                "Invalid email or password".to_string()
            },
            AppError::Auth(AuthFailure::Unconfirmed) => {
                "Please confirm your email address first".to_string()
            },
            AppError::AuthRateLimited => {
                "Too many authentication attempts, please try again later".to_string()
            },
            AppError::Unauthenticated => "Please log in".to_string(),
            AppError::DuplicateEmail => "An account with this email already exists".to_string(),
            AppError::InvalidToken => "Invalid or expired link".to_string(),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::Encode(_) => "The uploaded image could not be read".to_string(),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::Json(_) => "Invalid request format".to_string(),
            AppError::Database(_) | AppError::Io(_) | AppError::Internal(_) => {
                "An internal server error occurred".to_string()
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        // Use detailed messages in development, sanitized in production
        let message = if cfg!(debug_assertions) {
            self.to_string()
        } else {
            self.sanitized_message()
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message,
            },
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Encode(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::InvalidInput(format!("Malformed upload: {}", err.body_text()))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Background task failed: {err}"))
    }
}
