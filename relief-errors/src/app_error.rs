use serde::{Deserialize, Serialize};

pub type AppResult<T> = Result<T, AppError>;

/// Coarse classification callers branch on instead of message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Unauthorized,
    Validation,
    Conflict,
    RateLimited,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests, retry in {0}s")]
    RateLimited(u64),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Identity provider error: {0}")]
    Identity(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Database(_) | Self::Identity(_) | Self::Config(_) | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Identity(_) => "IDENTITY_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn user_message(&self) -> &str {
        match self {
            Self::NotFound(_) => "The requested station or user does not exist.",
            Self::Forbidden(_) => "You are not allowed to perform this action.",
            Self::Unauthorized => "Please sign in to continue.",
            Self::Validation(_) => "Some of the submitted fields are invalid.",
            Self::Conflict(_) => "Someone else changed this record. Reload and try again.",
            Self::RateLimited(_) => "Too many votes in a short time. Try again shortly.",
            Self::Database(_) | Self::Identity(_) | Self::Config(_) | Self::Internal(_) => {
                "Something went wrong on our side. Please try again."
            }
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

#[cfg(feature = "http")]
mod http_impl {
    use super::AppError;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::Json;
    use serde_json::json;

    impl AppError {
        pub fn status_code(&self) -> StatusCode {
            match self {
                AppError::NotFound(_) => StatusCode::NOT_FOUND,
                AppError::Forbidden(_) => StatusCode::FORBIDDEN,
                AppError::Unauthorized => StatusCode::UNAUTHORIZED,
                AppError::Validation(_) => StatusCode::BAD_REQUEST,
                AppError::Conflict(_) => StatusCode::CONFLICT,
                AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                AppError::Database(_)
                | AppError::Identity(_)
                | AppError::Config(_)
                | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status = self.status_code();
            let code = self.error_code();

            if self.is_server_error() {
                tracing::error!(error = %self, code, "Server error occurred");
            } else {
                tracing::debug!(error = %self, code, "Client error occurred");
            }

            let body = Json(json!({
                "error": {
                    "code": code,
                    "message": self.to_string(),
                }
            }));
            (status, body).into_response()
        }
    }
}
