//! HTTP contract tests for the assembled router
//!
//! Every request goes through `AppServices::router()` with `oneshot`, so
//! routing, extractors, error mapping and the response envelope are all
//! exercised together.

mod common;

use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;

fn create_body(amounts: &[f64]) -> Value {
    json!({
        "clientName": "Jordan Client",
        "clientEmail": "Jordan@Example.com",
        "dueDate": future_due_date(),
        "items": amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| json!({
                "description": format!("Service {}", i + 1),
                "amount": amount,
                "quantity": 1
            }))
            .collect::<Vec<_>>(),
    })
}

// ============================================================================
// MODULE: Authentication and validation
// ============================================================================

mod request_guard_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let app = TestApp::new();
        let request = Request::post("/invoices")
            .header("content-type", "application/json")
            .body(Body::from(create_body(&[10.0]).to_string()))
            .unwrap();

        let (status, body) = app.call(request).await;
        assert_eq!(status, 401);
        assert_eq!(body["success"], false);
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_missing_business_is_forbidden() {
        let app = TestApp::new();
        let (status, body) = app
            .call(authed("POST", "/invoices", OTHER_OWNER, Some(create_body(&[10.0]))))
            .await;

        assert_eq!(status, 403);
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["setupRequired"], true);
        assert_eq!(body["data"]["missingFields"], json!([]));
    }

    #[tokio::test]
    async fn test_empty_items_is_bad_request() {
        let app = TestApp::new();
        let (status, body) = app
            .call(authed("POST", "/invoices", OWNER, Some(create_body(&[]))))
            .await;

        assert_eq!(status, 400);
        assert_eq!(
            body,
            json!({"success": false, "message": "Invoice must have at least one item."})
        );
        assert!(app.repository.is_empty().await);
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_bad_request() {
        let app = TestApp::new();
        let (status, body) = app
            .call(authed("POST", "/invoices", OWNER, Some(create_body(&[10.0, 0.0]))))
            .await;

        assert_eq!(status, 400);
        assert_eq!(body["message"], "items[1].amount must be greater than zero.");
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_bad_request() {
        let app = TestApp::new();
        let mut body = create_body(&[10.0, 10.0]);
        body["items"][0]["amount"] = json!("50000000000000000000000000000");
        body["items"][1]["amount"] = json!("50000000000000000000000000000");

        let (status, body) = app
            .call(authed("POST", "/invoices", OWNER, Some(body)))
            .await;

        assert_eq!(status, 400);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "items[0].amount is too large.");
        assert!(app.repository.is_empty().await);
        assert_eq!(app.gateway.created_count(), 0);
    }

    #[tokio::test]
    async fn test_total_beyond_minor_units_is_bad_request() {
        let app = TestApp::new();
        let mut body = create_body(&[10.0, 10.0]);
        body["items"][0]["amount"] = json!("50000000000000000");
        body["items"][1]["amount"] = json!("50000000000000000");

        let (status, body) = app
            .call(authed("POST", "/invoices", OWNER, Some(body)))
            .await;

        assert_eq!(status, 400);
        assert_eq!(body["message"], "items total is too large.");
        assert!(app.repository.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = TestApp::new();
        let request = Request::post("/invoices")
            .header("content-type", "application/json")
            .header(invoicepay::handlers::auth::USER_ID_HEADER, OWNER)
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = app.call(request).await;
        assert_eq!(status, 400);
        assert_eq!(body["success"], false);
    }
}

// ============================================================================
// MODULE: Create
// ============================================================================

mod create_route_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_returns_created_invoice() {
        let app = TestApp::new();
        let (status, body) = app
            .call(authed("POST", "/invoices", OWNER, Some(create_body(&[100.0, 50.0]))))
            .await;

        assert_eq!(status, 201);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Invoice created and email sent.");

        let data = &body["data"];
        assert_eq!(data["invoiceNumber"], 1);
        assert_eq!(data["formattedInvoiceNumber"], "INV-ACMES-001");
        assert_eq!(data["status"], "UNPAID");
        assert_eq!(data["clientEmail"], "jordan@example.com");
        assert_eq!(data["items"].as_array().map(Vec::len), Some(2));
        assert_eq!(data["business"]["name"], "Acme Studio");
        assert!(data["paymentLink"].as_str().unwrap().starts_with("https://"));
    }

    #[tokio::test]
    async fn test_create_never_leaks_internal_fields() {
        let app = TestApp::new();
        let (_, body) = app
            .call(authed("POST", "/invoices", OWNER, Some(create_body(&[10.0]))))
            .await;

        let data = body["data"].as_object().unwrap();
        for internal in ["ownerId", "paymentSessionId", "paymentIntentId", "paymentMetadata"] {
            assert!(!data.contains_key(internal), "{internal} leaked");
        }
    }

    #[tokio::test]
    async fn test_email_failure_changes_message_only() {
        let app = TestApp::new();
        app.notifier
            .fail
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let (status, body) = app
            .call(authed("POST", "/invoices", OWNER, Some(create_body(&[10.0]))))
            .await;

        assert_eq!(status, 201);
        assert_eq!(
            body["message"],
            "Invoice created, but the email could not be sent."
        );
    }

    #[tokio::test]
    async fn test_gateway_failure_is_server_error() {
        let app = TestApp::with_gateway(FakeGateway::failing());
        let (status, body) = app
            .call(authed("POST", "/invoices", OWNER, Some(create_body(&[10.0]))))
            .await;

        assert_eq!(status, 500);
        assert_eq!(body["success"], false);
        assert_eq!(
            body["message"],
            "Failed to generate payment link. Please try again later."
        );
        assert!(body["data"]["error"].is_string());
        assert!(app.repository.is_empty().await);
    }
}

// ============================================================================
// MODULE: Read and delete
// ============================================================================

mod read_delete_route_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn create_one(app: &TestApp) -> String {
        let (_, body) = app
            .call(authed("POST", "/invoices", OWNER, Some(create_body(&[10.0]))))
            .await;
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_empty_list() {
        let app = TestApp::new();
        let (status, body) = app.call(authed("GET", "/invoices", OWNER, None)).await;

        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({
                "success": true,
                "message": "No invoices found.",
                "data": {
                    "data": [],
                    "pagination": {"total": 0, "page": 1, "limit": 10, "totalPages": 0}
                }
            })
        );
    }

    #[tokio::test]
    async fn test_list_with_junk_query_uses_defaults() {
        let app = TestApp::new();
        create_one(&app).await;

        let (status, body) = app
            .call(authed("GET", "/invoices?page=abc&limit=-4", OWNER, None))
            .await;

        assert_eq!(status, 200);
        assert_eq!(body["message"], "Invoices retrieved successfully.");
        assert_eq!(body["data"]["pagination"]["page"], 1);
        assert_eq!(body["data"]["pagination"]["limit"], 10);
        assert_eq!(body["data"]["data"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_get_single_invoice() {
        let app = TestApp::new();
        let id = create_one(&app).await;

        let (status, body) = app
            .call(authed("GET", &format!("/invoices/{id}"), OWNER, None))
            .await;

        assert_eq!(status, 200);
        assert_eq!(body["message"], "Invoice retrieved successfully.");
        assert_eq!(body["data"]["id"], id.as_str());
        assert_eq!(body["data"]["business"]["city"], "Kolkata");
    }

    #[tokio::test]
    async fn test_invalid_id_is_not_found() {
        let app = TestApp::new();
        let (status, body) = app
            .call(authed("GET", "/invoices/not-a-uuid", OWNER, None))
            .await;

        assert_eq!(status, 404);
        assert_eq!(body["message"], "Invoice not found");
    }

    #[tokio::test]
    async fn test_delete_by_other_owner_is_not_found() {
        let app = TestApp::new();
        let id = create_one(&app).await;

        let (status, body) = app
            .call(authed("DELETE", &format!("/invoices/{id}"), OTHER_OWNER, None))
            .await;

        assert_eq!(status, 404);
        assert_eq!(body["message"], "Invoice not found");
        assert_eq!(app.repository.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_unpaid_invoice() {
        let app = TestApp::new();
        let id = create_one(&app).await;

        let (status, body) = app
            .call(authed("DELETE", &format!("/invoices/{id}"), OWNER, None))
            .await;

        assert_eq!(status, 200);
        assert_eq!(
            body,
            json!({"success": true, "message": "Invoice and payment link deleted"})
        );
        assert!(app.repository.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_paid_invoice_is_rejected() {
        let app = TestApp::new();
        let id = create_one(&app).await;
        let (status, _) = app
            .deliver_webhook(&checkout_event("checkout.session.completed", &id))
            .await;
        assert_eq!(status, 200);

        let (status, body) = app
            .call(authed("DELETE", &format!("/invoices/{id}"), OWNER, None))
            .await;

        assert_eq!(status, 400);
        assert_eq!(body["message"], "Cannot delete a paid invoice");
        assert_eq!(app.repository.len().await, 1);
    }
}

// ============================================================================
// MODULE: Operational routes
// ============================================================================

mod operational_route_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = app.call(request).await;

        assert_eq!(status, 200);
        assert_eq!(body, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn test_status_reports_counters() {
        let app = TestApp::new();
        let request = Request::get("/status").body(Body::empty()).unwrap();
        let (status, body) = app.call(request).await;

        assert_eq!(status, 200);
        assert_eq!(body["name"], "invoicepay");
        assert!(body["invoices"]["created"].is_u64());
    }

    #[tokio::test]
    async fn test_metrics_are_prometheus_text() {
        let app = TestApp::new();
        let request = Request::get("/metrics").body(Body::empty()).unwrap();
        let response = app.services.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), 200);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("invoicepay_invoices_created_total"));
    }

    #[tokio::test]
    async fn test_cors_preflight_from_allowed_origin() {
        let app = TestApp::new();
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/invoices")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.services.router().oneshot(request).await.unwrap();

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:3000")
        );
    }

    #[tokio::test]
    async fn test_cors_rejects_unknown_origin() {
        let app = TestApp::new();
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/invoices")
            .header("origin", "https://evil.example")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = app.services.router().oneshot(request).await.unwrap();

        assert!(response
            .headers()
            .get("access-control-allow-origin")
            .is_none());
    }
}
