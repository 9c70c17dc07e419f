use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    InvalidCredentials,
    /// No valid access or refresh token was presented.
    Unauthenticated,
    /// The caller is known but lacks the role the operation requires.
    Unauthorized(String),
    NotFound(String),
    InvalidArgument(String),
    AlreadyExists(String),
    /// Roster at capacity.
    Full(String),
    /// Operation not valid in the entity's current state.
    InvalidOperation(String),
    Internal(String),
    Database(sqlx::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Full(_) => "FULL",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::Internal(_) | Self::Database(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyExists(_) | Self::Full(_) | Self::InvalidOperation(_) => {
                StatusCode::CONFLICT
            }
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "Invalid email or password"),
            Self::Unauthenticated => write!(f, "Authentication required"),
            Self::Unauthorized(msg)
            | Self::NotFound(msg)
            | Self::InvalidArgument(msg)
            | Self::AlreadyExists(msg)
            | Self::Full(msg)
            | Self::InvalidOperation(msg) => write!(f, "{msg}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
            Self::Database(e) => write!(f, "Database error: {e}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("{self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), code = self.code(), "{message}");
        }

        (
            status,
            Json(json!({ "error": message, "code": self.code() })),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e)
    }
}

/// Maps a unique-constraint violation to `AlreadyExists`, everything else to `Database`.
pub fn unique_violation_as(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::AlreadyExists(message.to_string())
        }
        _ => AppError::Database(e),
    }
}
