//! Shared fixtures for integration tests
//!
//! Builds the real [`InvoiceService`] and router over in-memory storage, with a
//! scripted payment gateway and a recording mail sender in place of the
//! network-facing adapters.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use chrono::{FixedOffset, Utc};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use invoicepay::business::{Business, InMemoryBusinessDirectory};
use invoicepay::cors::CorsConfig;
use invoicepay::handlers::auth::USER_ID_HEADER;
use invoicepay::invoice::request::{CreateInvoiceRequest, LineItemRequest};
use invoicepay::invoice::{InMemoryInvoiceRepository, InvoiceService, InvoiceSettings};
use invoicepay::notify::{Notification, NotificationSender, NotifyError};
use invoicepay::render::PdfRenderer;
use invoicepay::stripe::signature::SIGNATURE_HEADER;
use invoicepay::stripe::{
    CheckoutLink, CheckoutRequest, GatewayError, GatewayResult, PaymentGateway, SignatureVerifier,
};
use invoicepay::AppServices;

pub const OWNER: &str = "user-owner-1";
pub const OTHER_OWNER: &str = "user-owner-2";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Bound on gateway and mail calls in the harness
pub const CALL_TIMEOUT: Duration = Duration::from_millis(200);

/// How long a stalled fake sleeps; well past [`CALL_TIMEOUT`]
const STALL: Duration = Duration::from_secs(5);

// ============================================================================
// FAKE GATEWAY
// ============================================================================

/// Scripted gateway recording every call
#[derive(Debug, Default)]
pub struct FakeGateway {
    pub fail_create: AtomicBool,
    pub fail_lookup: AtomicBool,
    pub stall_create: AtomicBool,
    pub created: Mutex<Vec<CheckoutRequest>>,
    pub expired: Mutex<Vec<String>>,
    pub lookups: AtomicUsize,
}

impl FakeGateway {
    pub fn failing() -> Self {
        let gateway = Self::default();
        gateway.fail_create.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn stalling() -> Self {
        let gateway = Self::default();
        gateway.stall_create.store(true, Ordering::SeqCst);
        gateway
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> GatewayResult<CheckoutLink> {
        if self.stall_create.load(Ordering::SeqCst) {
            tokio::time::sleep(STALL).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: 402,
                message: "card_declined".to_string(),
            });
        }
        let mut created = self.created.lock();
        created.push(request.clone());
        let session_id = format!("cs_test_{}", created.len());
        Ok(CheckoutLink {
            url: format!("https://checkout.stripe.test/c/pay/{session_id}"),
            session_id,
        })
    }

    async fn expire_checkout_session(&self, session_id: &str) -> GatewayResult<()> {
        self.expired.lock().push(session_id.to_string());
        Ok(())
    }

    async fn payment_method_type(&self, _payment_intent_id: &str) -> GatewayResult<Option<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout(Duration::from_millis(10)));
        }
        Ok(Some("card".to_string()))
    }
}

// ============================================================================
// RECORDING NOTIFIER
// ============================================================================

/// Mail sender that keeps what it was asked to send
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub fail: AtomicBool,
    pub stall: AtomicBool,
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.stall.load(Ordering::SeqCst) {
            tokio::time::sleep(STALL).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                status: 503,
                body: "mail API unavailable".to_string(),
            });
        }
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// Service graph with handles on every fake
pub struct TestApp {
    pub service: Arc<InvoiceService>,
    pub repository: Arc<InMemoryInvoiceRepository>,
    pub businesses: Arc<InMemoryBusinessDirectory>,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub services: AppServices,
    pub verifier: SignatureVerifier,
}

impl TestApp {
    /// Harness with one complete business profile for [`OWNER`]
    pub fn new() -> Self {
        Self::with_gateway(FakeGateway::default())
    }

    pub fn with_gateway(gateway: FakeGateway) -> Self {
        let repository = Arc::new(InMemoryInvoiceRepository::new());
        let businesses = Arc::new(InMemoryBusinessDirectory::new());
        businesses.upsert(business(OWNER, "Acme Studio"));

        let gateway = Arc::new(gateway);
        let notifier = Arc::new(RecordingNotifier::default());

        let settings = InvoiceSettings {
            default_currency: "INR".to_string(),
            brand_name: "InvoicePay".to_string(),
            display_offset: FixedOffset::east_opt(5 * 3600 + 1800).unwrap(),
            gateway_timeout: CALL_TIMEOUT,
            notification_timeout: CALL_TIMEOUT,
        };

        let service = Arc::new(InvoiceService::new(
            repository.clone(),
            businesses.clone(),
            gateway.clone(),
            Arc::new(PdfRenderer::new()),
            notifier.clone(),
            settings,
        ));

        let verifier = SignatureVerifier::new(WEBHOOK_SECRET, Duration::from_secs(300));
        let services = AppServices::new(
            service.clone(),
            verifier.clone(),
            Duration::from_secs(5),
            CorsConfig::new(["http://localhost:3000"]),
        );

        Self {
            service,
            repository,
            businesses,
            gateway,
            notifier,
            services,
            verifier,
        }
    }

    /// Send a request through the assembled router
    pub async fn call(&self, request: Request<Body>) -> (u16, Value) {
        let response = self.services.router().oneshot(request).await.unwrap();
        read_json(response).await
    }

    /// Deliver a correctly signed webhook
    pub async fn deliver_webhook(&self, event: &Value) -> (u16, Value) {
        let body = serde_json::to_vec(event).unwrap();
        let header = self.verifier.sign(&body, Utc::now().timestamp());
        let request = Request::post("/webhook")
            .header(SIGNATURE_HEADER, header)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.call(request).await
    }
}

pub async fn read_json(response: Response<Body>) -> (u16, Value) {
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

// ============================================================================
// FIXTURES
// ============================================================================

pub fn business(owner_id: &str, name: &str) -> Business {
    Business {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_string(),
        name: name.to_string(),
        email: "billing@acme.test".to_string(),
        phone: Some("+91 98765 43210".to_string()),
        address: Some("12 Park Street".to_string()),
        city: Some("Kolkata".to_string()),
        state: Some("WB".to_string()),
        country: Some("India".to_string()),
        postal_code: Some("700016".to_string()),
        tax_id: None,
        logo: None,
        default_currency: None,
    }
}

/// Create request with one item per amount
pub fn create_request(amounts: &[&str], due_date: &str) -> CreateInvoiceRequest {
    CreateInvoiceRequest {
        client_name: "Jordan Client".to_string(),
        client_email: "jordan@example.com".to_string(),
        currency: None,
        due_date: Some(due_date.to_string()),
        items: amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| LineItemRequest {
                description: format!("Service {}", i + 1),
                amount: amount.parse().unwrap(),
                quantity: Some(1),
            })
            .collect(),
    }
}

pub fn future_due_date() -> String {
    (Utc::now() + chrono::Duration::days(14))
        .date_naive()
        .to_string()
}

pub fn past_due_date() -> String {
    (Utc::now() - chrono::Duration::days(3))
        .date_naive()
        .to_string()
}

/// A checkout session event for `invoice_id`
pub fn checkout_event(event_type: &str, invoice_id: &str) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "created": Utc::now().timestamp(),
        "livemode": false,
        "data": {
            "object": {
                "id": "cs_test_1",
                "object": "checkout.session",
                "payment_intent": "pi_test_1",
                "payment_status": "paid",
                "metadata": {
                    "invoiceId": invoice_id,
                    "invoiceNumber": "INV-ACMES-001"
                }
            }
        }
    })
}

pub fn authed(method: &str, uri: &str, owner: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_ID_HEADER, owner);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
