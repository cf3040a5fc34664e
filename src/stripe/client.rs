//! Hosted checkout gateway
//!
//! [`PaymentGateway`] is the outbound port the invoice flow talks to.
//! [`StripeClient`] implements it over Stripe's form-encoded REST API.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::config::StripeConfig;
use crate::invoice::model::minor_units;
use crate::stripe::error::{GatewayError, GatewayResult};
use crate::stripe::events::{INVOICE_ID_METADATA_KEY, INVOICE_NUMBER_METADATA_KEY};

/// Product name shown on the hosted checkout page
pub const CHECKOUT_PRODUCT_NAME: &str = "Invoice Payment";

/// Parameters for one hosted checkout
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    /// Invoice the session pays
    pub invoice_id: Uuid,
    /// Display number, stored in session metadata
    pub invoice_number: String,
    /// Amount in major units
    pub amount: Decimal,
    /// ISO currency code
    pub currency: String,
    /// Payer email, prefilled on the checkout page
    pub customer_email: String,
}

/// A created checkout session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLink {
    /// Hosted page URL
    pub url: String,
    /// Session id (cs_...)
    pub session_id: String,
}

/// Outbound payment operations
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Create a hosted checkout session for an invoice
    async fn create_checkout_session(&self, request: &CheckoutRequest)
        -> GatewayResult<CheckoutLink>;

    /// Expire an open checkout session so it can no longer be paid
    async fn expire_checkout_session(&self, session_id: &str) -> GatewayResult<()>;

    /// First payment method type recorded on a payment intent
    async fn payment_method_type(&self, payment_intent_id: &str) -> GatewayResult<Option<String>>;
}

/// Convert a major-unit amount to the integer minor units Stripe expects
pub fn to_minor_units(amount: Decimal) -> GatewayResult<i64> {
    minor_units(amount)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("amount {amount} out of range")))
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentResponse {
    #[serde(default)]
    payment_method_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Stripe REST client
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: Url,
    secret_key: String,
    success_url: String,
    cancel_url: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base.as_str())
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Build a client; every request is bounded by the configured timeout
    pub fn new(config: &StripeConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("invoicepay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            secret_key: config.secret_key.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> GatewayResult<Url> {
        self.api_base
            .join(path)
            .map_err(|e| GatewayError::InvalidResponse(format!("bad endpoint {path}: {e}")))
    }

    fn checkout_form(&self, request: &CheckoutRequest) -> GatewayResult<Vec<(String, String)>> {
        let unit_amount = to_minor_units(request.amount)?;

        Ok(vec![
            ("payment_method_types[0]".into(), "card".into()),
            ("mode".into(), "payment".into()),
            (
                "line_items[0][price_data][currency]".into(),
                request.currency.to_ascii_lowercase(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                CHECKOUT_PRODUCT_NAME.into(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                unit_amount.to_string(),
            ),
            ("line_items[0][quantity]".into(), "1".into()),
            ("customer_email".into(), request.customer_email.clone()),
            (
                format!("metadata[{INVOICE_ID_METADATA_KEY}]"),
                request.invoice_id.to_string(),
            ),
            (
                format!("metadata[{INVOICE_NUMBER_METADATA_KEY}]"),
                request.invoice_number.clone(),
            ),
            ("success_url".into(), self.success_url.clone()),
            ("cancel_url".into(), self.cancel_url.clone()),
        ])
    }

    async fn read<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> GatewayResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> GatewayResult<CheckoutLink> {
        let form = self.checkout_form(request)?;
        let response = self
            .http
            .post(self.endpoint("/v1/checkout/sessions")?)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let session: SessionResponse = Self::read(response).await?;
        let url = session
            .url
            .ok_or_else(|| GatewayError::InvalidResponse("session has no url".into()))?;

        tracing::debug!(
            invoice_id = %request.invoice_id,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CheckoutLink {
            url,
            session_id: session.id,
        })
    }

    async fn expire_checkout_session(&self, session_id: &str) -> GatewayResult<()> {
        let response = self
            .http
            .post(self.endpoint(&format!("/v1/checkout/sessions/{session_id}/expire"))?)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let _: SessionResponse = Self::read(response).await?;
        Ok(())
    }

    async fn payment_method_type(&self, payment_intent_id: &str) -> GatewayResult<Option<String>> {
        let response = self
            .http
            .get(self.endpoint(&format!("/v1/payment_intents/{payment_intent_id}"))?)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let intent: PaymentIntentResponse = Self::read(response).await?;
        Ok(intent.payment_method_types.into_iter().next())
    }
}
