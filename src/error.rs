//! Error types for InvoicePay
//!
//! Each layer owns a `thiserror` enum; everything converges on [`Error`],
//! which knows how to render itself as the JSON response envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::handlers::envelope::ApiResponse;
use crate::invoice::repository::RepositoryError;

/// The main error type for InvoicePay operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Caller is not authenticated
    #[error("{0}")]
    Unauthorized(String),

    /// Owner has no usable business profile yet
    #[error("{message}")]
    SetupRequired {
        /// Human-readable explanation
        message: String,
        /// Profile fields that still need a value (empty when the profile is absent)
        missing: Vec<&'static str>,
    },

    /// Entity absent or owned by someone else
    #[error("{0}")]
    NotFound(String),

    /// Operation not allowed in the entity's current state
    #[error("{0}")]
    Conflict(String),

    /// Payment link could not be issued; the partial invoice was already removed
    #[error("Payment link generation failed: {0}")]
    PaymentLink(String),

    /// Persistence failure
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result type alias for InvoicePay operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a validation error from a string
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a not-found error from a string
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Error::NotFound(msg.into())
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::Conflict(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::SetupRequired { .. } => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::PaymentLink(_) | Error::Repository(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            Error::SetupRequired { message, missing } => ApiResponse::failure_with(
                message.clone(),
                json!({ "setupRequired": true, "missingFields": missing }),
            ),
            Error::PaymentLink(detail) => ApiResponse::failure_with(
                "Failed to generate payment link. Please try again later.",
                json!({ "error": detail }),
            ),
            Error::Repository(_) => {
                tracing::error!(error = %self, "Request failed");
                ApiResponse::failure("Internal server error")
            }
            other => ApiResponse::failure(other.to_string()),
        };

        crate::metrics::global_metrics().record_error(self.kind());
        (status, Json(body)).into_response()
    }
}

impl Error {
    fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Unauthorized(_) => "unauthorized",
            Error::SetupRequired { .. } => "setup_required",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::PaymentLink(_) => "payment_link",
            Error::Repository(_) => "repository",
        }
    }
}
