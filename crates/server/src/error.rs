//! Unified error handling for HTTP handlers and the command consumer.
//!
//! All route handlers return `Result<T, AppError>`; the consumer converts
//! the same errors into `{"error": ...}` replies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::filters::FilterError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request payload or parameters failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Write conflicts with existing state (e.g. missing foreign key target).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound | RepositoryError::MissingReference(_) => {
                    StatusCode::NOT_FOUND
                }
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to expose to clients.
    ///
    /// Raw database errors are collapsed to a generic message.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => "Not found".to_owned(),
                RepositoryError::MissingReference(msg) => msg.clone(),
                RepositoryError::Conflict(msg) => msg.clone(),
                RepositoryError::Database(_) => "Internal server error".to_owned(),
            },
            Self::Internal(_) => "Internal server error".to_owned(),
            Self::NotFound(msg) | Self::Validation(msg) | Self::Conflict(msg) => msg.clone(),
        }
    }
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(error = %self, "Request error");
        }

        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404_with_message() {
        let err = AppError::NotFound("Product with ID 42 not found".to_owned());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.public_message(), "Product with ID 42 not found");
    }

    #[test]
    fn validation_maps_to_400() {
        let err = AppError::Validation("Order must contain at least one item".to_owned());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn repository_variants_map_through() {
        assert_eq!(
            AppError::from(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(RepositoryError::Conflict("user does not exist".to_owned())).status(),
            StatusCode::CONFLICT
        );
        let db = AppError::from(RepositoryError::Database(sqlx::Error::PoolClosed));
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // raw database detail must not leak to clients
        assert_eq!(db.public_message(), "Internal server error");
    }
}
