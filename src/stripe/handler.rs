//! Webhook HTTP endpoint
//!
//! The body is taken as raw [`Bytes`] so the signature is checked over exactly
//! what Stripe sent. Nothing is parsed until verification succeeds.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{field, instrument};

use crate::metrics::global_metrics;
use crate::stripe::error::{StripeWebhookError, StripeWebhookResult};
use crate::stripe::events::StripeEvent;
use crate::stripe::processor::EventProcessor;
use crate::stripe::signature::{SignatureVerifier, SIGNATURE_HEADER};

/// State shared by webhook requests
#[derive(Clone)]
pub struct StripeWebhookState {
    verifier: SignatureVerifier,
    processor: EventProcessor,
}

impl StripeWebhookState {
    pub fn new(verifier: SignatureVerifier, processor: EventProcessor) -> Self {
        Self {
            verifier,
            processor,
        }
    }
}

/// `POST /webhook`
#[instrument(skip_all, fields(event_id = field::Empty, event_type = field::Empty))]
pub async fn stripe_webhook_handler(
    State(state): State<Arc<StripeWebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StripeWebhookResult<Json<Value>> {
    let result = receive(&state, &headers, &body).await;

    let label = match &result {
        Ok(label) => *label,
        Err(e) if e.is_client_error() => {
            tracing::warn!(error = %e, "Rejected webhook");
            "rejected"
        }
        Err(_) => "failed",
    };
    global_metrics().record_webhook(label);

    result.map(|_| Json(json!({ "received": true })))
}

async fn receive(
    state: &StripeWebhookState,
    headers: &HeaderMap,
    body: &[u8],
) -> StripeWebhookResult<&'static str> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .ok_or(StripeWebhookError::MissingSignature)?
        .to_str()
        .map_err(|_| StripeWebhookError::MalformedSignature("header is not ASCII".into()))?;

    state.verifier.verify(body, signature)?;

    let event = StripeEvent::from_bytes(body)?;
    let span = tracing::Span::current();
    span.record("event_id", event.id.as_str());
    span.record("event_type", event.event_type.as_str());

    let outcome = state.processor.process(&event).await?;
    Ok(outcome.label())
}

/// Router exposing the webhook endpoint
pub fn stripe_webhook_router(state: Arc<StripeWebhookState>) -> Router {
    Router::new()
        .route("/webhook", post(stripe_webhook_handler))
        .with_state(state)
}
