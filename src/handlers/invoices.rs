//! Invoice routes
//!
//! - `POST   /invoices`       create, issue payment link, email client
//! - `GET    /invoices`       paginated list
//! - `GET    /invoices/:id`   single invoice
//! - `DELETE /invoices/:id`   delete an unpaid invoice

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::handlers::auth::AuthUser;
use crate::handlers::envelope::ApiResponse;
use crate::invoice::request::{CreateInvoiceRequest, ListQuery};
use crate::invoice::service::{EmailDelivery, InvoiceService};
use crate::invoice::view::{InvoiceList, InvoiceView};

#[instrument(skip_all, fields(owner_id = %user.id))]
async fn create_invoice(
    State(service): State<Arc<InvoiceService>>,
    user: AuthUser,
    body: std::result::Result<Json<CreateInvoiceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceView>>)> {
    let Json(request) = body.map_err(|rejection| Error::validation(rejection.body_text()))?;

    let created = service.create(&user.id, request).await?;
    let message = match created.email {
        EmailDelivery::Sent => "Invoice created and email sent.",
        EmailDelivery::Failed => "Invoice created, but the email could not be sent.",
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(message, created.invoice)),
    ))
}

#[instrument(skip_all, fields(owner_id = %user.id))]
async fn list_invoices(
    State(service): State<Arc<InvoiceService>>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<InvoiceList>>> {
    let list = service.list(&user.id, &query).await?;
    let message = if list.data.is_empty() {
        "No invoices found."
    } else {
        "Invoices retrieved successfully."
    };
    Ok(Json(ApiResponse::success(message, list)))
}

#[instrument(skip_all, fields(owner_id = %user.id, invoice_id = %raw_id))]
async fn get_invoice(
    State(service): State<Arc<InvoiceService>>,
    user: AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<InvoiceView>>> {
    let invoice = service.get(&user.id, parse_id(&raw_id)?).await?;
    Ok(Json(ApiResponse::success(
        "Invoice retrieved successfully.",
        invoice,
    )))
}

#[instrument(skip_all, fields(owner_id = %user.id, invoice_id = %raw_id))]
async fn delete_invoice(
    State(service): State<Arc<InvoiceService>>,
    user: AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<ApiResponse<Value>>> {
    service.delete(&user.id, parse_id(&raw_id)?).await?;
    Ok(Json(ApiResponse::message_only(
        "Invoice and payment link deleted",
    )))
}

/// A malformed id cannot name an owned invoice
fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| Error::not_found("Invoice not found"))
}

/// Router for the invoice API
pub fn invoice_router(service: Arc<InvoiceService>) -> Router {
    Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/:id", get(get_invoice).delete(delete_invoice))
        .with_state(service)
}
