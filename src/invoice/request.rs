//! Typed request bodies and boundary validation
//!
//! Bodies are deserialized leniently and then validated in field order; the
//! first violation is reported with a field-level message.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::normalize_currency;
use crate::error::{Error, Result};
use crate::invoice::model::{compute_total, minor_units, NewLineItem};

/// Default page for invoice listing
pub const DEFAULT_PAGE: u64 = 1;
/// Default page size for invoice listing
pub const DEFAULT_LIMIT: u64 = 10;
/// Largest accepted page size
pub const MAX_LIMIT: u64 = 100;

/// `POST /invoices` body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItemRequest>,
}

/// One item in a create request
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemRequest {
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub quantity: Option<u32>,
}

/// A create request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInvoice {
    pub client_name: String,
    pub client_email: String,
    pub currency: Option<String>,
    pub due_date: DateTime<Utc>,
    pub items: Vec<NewLineItem>,
}

impl CreateInvoiceRequest {
    /// Validate and normalise the request
    pub fn validate(self) -> Result<ValidatedInvoice> {
        if self.items.is_empty() {
            return Err(Error::validation("Invoice must have at least one item."));
        }

        let client_name = self.client_name.trim().to_string();
        if client_name.is_empty() {
            return Err(Error::validation("clientName is required."));
        }

        let client_email = self.client_email.trim().to_lowercase();
        if !looks_like_email(&client_email) {
            return Err(Error::validation("clientEmail must be a valid email address."));
        }

        let currency = match self.currency.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(normalize_currency(raw).ok_or_else(|| {
                Error::validation("currency must be a three-letter ISO code.")
            })?),
        };

        let due_date = match self.due_date.as_deref().map(str::trim) {
            None | Some("") => return Err(Error::validation("dueDate is required.")),
            Some(raw) => parse_due_date(raw)
                .ok_or_else(|| Error::validation("dueDate must be an ISO-8601 date."))?,
        };

        let mut items = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.into_iter().enumerate() {
            let description = item.description.trim().to_string();
            if description.is_empty() {
                return Err(Error::validation(format!(
                    "items[{index}].description is required."
                )));
            }
            if item.amount <= Decimal::ZERO {
                return Err(Error::validation(format!(
                    "items[{index}].amount must be greater than zero."
                )));
            }
            if minor_units(item.amount).is_none() {
                return Err(Error::validation(format!(
                    "items[{index}].amount is too large."
                )));
            }
            let quantity = item.quantity.unwrap_or(1);
            if quantity == 0 {
                return Err(Error::validation(format!(
                    "items[{index}].quantity must be at least 1."
                )));
            }
            items.push(NewLineItem {
                description,
                amount: item.amount,
                quantity,
            });
        }

        // The total is charged in integer minor units
        if compute_total(&items).and_then(minor_units).is_none() {
            return Err(Error::validation("items total is too large."));
        }

        Ok(ValidatedInvoice {
            client_name,
            client_email,
            currency,
            due_date,
            items,
        })
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// `GET /invoices` query string.
///
/// Values are kept as raw strings so junk falls back to defaults instead of
/// rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    /// Resolved `(page, limit)`
    pub fn resolve(&self) -> (u64, u64) {
        let positive = |raw: &Option<String>| {
            raw.as_deref()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
        };
        let page = positive(&self.page).unwrap_or(DEFAULT_PAGE);
        let limit = positive(&self.limit).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        (page, limit)
    }
}
