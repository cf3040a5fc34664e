//! Stripe integration errors

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors raised while receiving a webhook
#[derive(Error, Debug)]
pub enum StripeWebhookError {
    /// `Stripe-Signature` header absent
    #[error("No signature")]
    MissingSignature,

    /// Header present but not `t=...,v1=...`
    #[error("Malformed signature header: {0}")]
    MalformedSignature(String),

    /// No `v1` signature matched the payload
    #[error("Signature mismatch")]
    SignatureMismatch,

    /// Signed timestamp too far from now
    #[error("Signature timestamp outside tolerance ({0}s)")]
    TimestampOutOfTolerance(u64),

    /// Verified body is not a usable event
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Reconciliation failed after verification
    #[error("Webhook processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result type for webhook handling
pub type StripeWebhookResult<T> = std::result::Result<T, StripeWebhookError>;

impl StripeWebhookError {
    /// Verification and parse failures are the caller's fault
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::ProcessingFailed(_))
    }
}

impl IntoResponse for StripeWebhookError {
    fn into_response(self) -> Response {
        if self.is_client_error() {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": format!("Webhook Error: {self}") })),
            )
                .into_response()
        } else {
            tracing::error!(error = %self, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": "Webhook processing failed" })),
            )
                .into_response()
        }
    }
}

/// Errors raised by outbound gateway calls
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with an error status
    #[error("Gateway error {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Gateway's error message
        message: String,
    },

    /// Gateway answered 2xx with an unusable body
    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),

    /// Call exceeded its time bound
    #[error("Gateway call timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
