//! Webhook signature verification
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 and sends
//! `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`. Verification runs over
//! the exact request bytes; a re-serialized body would not match.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::stripe::error::{StripeWebhookError, StripeWebhookResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verifies `Stripe-Signature` headers against a shared secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance: Duration,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    /// Verify `payload` against `header` at the current time
    pub fn verify(&self, payload: &[u8], header: &str) -> StripeWebhookResult<()> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verify `payload` against `header` as of `now` (unix seconds)
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> StripeWebhookResult<()> {
        let parsed = parse_header(header)?;

        let skew = now.abs_diff(parsed.timestamp);
        if skew > self.tolerance.as_secs() {
            tracing::warn!(
                timestamp = parsed.timestamp,
                skew_secs = skew,
                "Webhook signature timestamp outside tolerance"
            );
            return Err(StripeWebhookError::TimestampOutOfTolerance(
                self.tolerance.as_secs(),
            ));
        }

        let mac = self.mac_for(parsed.timestamp, payload);
        let matched = parsed
            .signatures
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

        if matched {
            Ok(())
        } else {
            Err(StripeWebhookError::SignatureMismatch)
        }
    }

    /// Produce a header value for `payload`; used by tests and local tooling
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let digest = self.mac_for(timestamp, payload).finalize().into_bytes();
        format!("t={},v1={}", timestamp, hex::encode(digest))
    }

    fn mac_for(&self, timestamp: i64, payload: &[u8]) -> HmacSha256 {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"));
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}

fn parse_header(header: &str) -> StripeWebhookResult<ParsedHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    StripeWebhookError::MalformedSignature("timestamp is not an integer".into())
                })?)
            }
            // Undecodable candidates cannot match, so they are skipped.
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| StripeWebhookError::MalformedSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(StripeWebhookError::MalformedSignature(
            "missing v1 signature".into(),
        ));
    }

    Ok(ParsedHeader {
        timestamp,
        signatures,
    })
}
