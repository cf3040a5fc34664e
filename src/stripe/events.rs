//! Stripe Event Types
//!
//! Strongly-typed representations of the webhook events that drive invoice
//! reconciliation. Only hosted-checkout events are modelled; everything else
//! parses as [`StripeEventType::Unknown`] and is acknowledged without action.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stripe::error::{StripeWebhookError, StripeWebhookResult};

/// Metadata key carrying the invoice id on a checkout session
pub const INVOICE_ID_METADATA_KEY: &str = "invoiceId";
/// Metadata key carrying the formatted invoice number
pub const INVOICE_NUMBER_METADATA_KEY: &str = "invoiceNumber";

/// Stripe event types we handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StripeEventType {
    #[serde(rename = "checkout.session.completed")]
    CheckoutSessionCompleted,
    #[serde(rename = "checkout.session.expired")]
    CheckoutSessionExpired,

    // Catch-all for events we don't explicitly handle
    #[serde(other)]
    Unknown,
}

impl FromStr for StripeEventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "checkout.session.expired" => Self::CheckoutSessionExpired,
            _ => Self::Unknown,
        })
    }
}

impl StripeEventType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CheckoutSessionExpired => "checkout.session.expired",
            Self::Unknown => "unknown",
        }
    }

    /// Check if this is a known event type
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Generic Stripe event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    /// Unique identifier for the event
    pub id: String,

    /// Type of event
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time of event creation (Unix timestamp)
    #[serde(default)]
    pub created: i64,

    /// Whether this is a live mode event
    #[serde(default)]
    pub livemode: bool,

    /// Object containing event data
    pub data: EventData,
}

/// Event data container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    /// The actual event object
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// Parse from raw JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> StripeWebhookResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StripeWebhookError::InvalidPayload(e.to_string()))
    }

    /// Get the typed event type
    pub fn typed_event_type(&self) -> StripeEventType {
        match StripeEventType::from_str(&self.event_type) {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }

    /// Extract the checkout session from a checkout event
    pub fn as_checkout_session(&self) -> StripeWebhookResult<CheckoutSession> {
        match self.typed_event_type() {
            StripeEventType::CheckoutSessionCompleted | StripeEventType::CheckoutSessionExpired => {
                serde_json::from_value(self.data.object.clone())
                    .map_err(|e| StripeWebhookError::InvalidPayload(e.to_string()))
            }
            StripeEventType::Unknown => Err(StripeWebhookError::InvalidPayload(format!(
                "Event {} is not a checkout session event",
                self.event_type
            ))),
        }
    }
}

/// Stripe checkout session object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Session ID (cs_...)
    pub id: String,
    /// Payment intent created for the session (absent until payment)
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Metadata attached when the session was created
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Invoice referenced by the session metadata.
    ///
    /// `None` when the key is absent, which happens for sessions created by
    /// other integrations sharing the endpoint.
    pub fn invoice_id(&self) -> Option<StripeWebhookResult<Uuid>> {
        self.metadata
            .get(INVOICE_ID_METADATA_KEY)
            .map(|raw| raw.trim())
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|e| {
                    StripeWebhookError::InvalidPayload(format!("invoiceId {raw:?}: {e}"))
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parsing() {
        assert_eq!(
            StripeEventType::from_str("checkout.session.completed").unwrap(),
            StripeEventType::CheckoutSessionCompleted
        );
        assert_eq!(
            StripeEventType::from_str("checkout.session.expired").unwrap(),
            StripeEventType::CheckoutSessionExpired
        );
        assert_eq!(
            StripeEventType::from_str("invoice.payment_succeeded").unwrap(),
            StripeEventType::Unknown
        );
    }

    #[test]
    fn test_parse_checkout_completed() {
        let json = r#"{
            "id": "evt_1234567890",
            "type": "checkout.session.completed",
            "created": 1614556800,
            "livemode": false,
            "data": {
                "object": {
                    "id": "cs_test_123",
                    "object": "checkout.session",
                    "payment_intent": "pi_123",
                    "payment_status": "paid",
                    "metadata": {
                        "invoiceId": "5d0c4a9e-1f4b-4b8e-9d4e-0b1a2c3d4e5f",
                        "invoiceNumber": "INV-ACME-001"
                    }
                }
            }
        }"#;

        let event = StripeEvent::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(event.typed_event_type(), StripeEventType::CheckoutSessionCompleted);

        let session = event.as_checkout_session().unwrap();
        assert_eq!(session.id, "cs_test_123");
        assert_eq!(session.payment_intent.as_deref(), Some("pi_123"));
        let id = session.invoice_id().unwrap().unwrap();
        assert_eq!(id.to_string(), "5d0c4a9e-1f4b-4b8e-9d4e-0b1a2c3d4e5f");
    }

    #[test]
    fn test_missing_metadata_is_none() {
        let json = r#"{
            "id": "evt_1",
            "type": "checkout.session.expired",
            "data": { "object": { "id": "cs_1" } }
        }"#;
        let event = StripeEvent::from_bytes(json.as_bytes()).unwrap();
        let session = event.as_checkout_session().unwrap();
        assert!(session.invoice_id().is_none());
    }

    #[test]
    fn test_malformed_invoice_id() {
        let session = CheckoutSession {
            id: "cs_1".into(),
            payment_intent: None,
            metadata: HashMap::from([(INVOICE_ID_METADATA_KEY.to_string(), "42".to_string())]),
        };
        assert!(session.invoice_id().unwrap().is_err());
    }

    #[test]
    fn test_non_json_payload() {
        assert!(matches!(
            StripeEvent::from_bytes(b"not json"),
            Err(StripeWebhookError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_unknown_event_not_checkout() {
        let json = r#"{"id": "evt_2", "type": "customer.created", "data": {"object": {}}}"#;
        let event = StripeEvent::from_bytes(json.as_bytes()).unwrap();
        assert!(!event.typed_event_type().is_known());
        assert!(event.as_checkout_session().is_err());
    }
}
