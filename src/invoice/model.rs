//! Invoice domain types

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Issued, awaiting payment
    Unpaid,
    /// Settled through the hosted checkout
    Paid,
    /// Checkout expired after the due date passed
    Overdue,
    /// Payment attempt failed
    Failed,
}

impl InvoiceStatus {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "UNPAID",
            Self::Paid => "PAID",
            Self::Overdue => "OVERDUE",
            Self::Failed => "FAILED",
        }
    }

    /// Paid invoices are protected from deletion and deactivation
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Paid)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(Self::Unpaid),
            "PAID" => Ok(Self::Paid),
            "OVERDUE" => Ok(Self::Overdue),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown invoice status: {other}")),
        }
    }
}

/// One billable entry on an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub quantity: u32,
}

/// A persisted invoice together with its line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub owner_id: String,
    pub business_id: Option<Uuid>,
    /// Per-owner sequence number
    pub invoice_number: u32,
    pub client_name: String,
    pub client_email: String,
    pub currency: String,
    /// Sum of line-item amounts, computed at creation
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    pub payment_link: Option<String>,
    pub payment_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub payment_method: Option<String>,
    pub payment_metadata: Option<HashMap<String, String>>,
    pub paid_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<LineItem>,
}

/// Line item as accepted for creation
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub description: String,
    pub amount: Decimal,
    pub quantity: u32,
}

/// Everything needed to persist a new invoice; the repository assigns id and number
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub owner_id: String,
    pub business_id: Option<Uuid>,
    pub client_name: String,
    pub client_email: String,
    pub currency: String,
    pub total: Decimal,
    pub due_date: DateTime<Utc>,
    pub items: Vec<NewLineItem>,
}

impl InvoiceDraft {
    /// Build a draft whose total is derived from the items, never supplied.
    ///
    /// `None` when the item amounts overflow.
    pub fn new(
        owner_id: impl Into<String>,
        business_id: Option<Uuid>,
        client_name: impl Into<String>,
        client_email: impl Into<String>,
        currency: impl Into<String>,
        due_date: DateTime<Utc>,
        items: Vec<NewLineItem>,
    ) -> Option<Self> {
        let total = compute_total(&items)?;
        Some(Self {
            owner_id: owner_id.into(),
            business_id,
            client_name: client_name.into(),
            client_email: client_email.into(),
            currency: currency.into(),
            total,
            due_date,
            items,
        })
    }
}

/// Invoice total: the sum of item amounts.
///
/// Quantity is stored for display only and does not scale the amount.
/// `None` when the sum leaves the `Decimal` range.
pub fn compute_total(items: &[NewLineItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.amount))
}

/// Integer minor units for a major-unit amount, rounded half to even.
///
/// `None` when the result does not fit an `i64`.
pub fn minor_units(amount: Decimal) -> Option<i64> {
    amount.checked_mul(Decimal::ONE_HUNDRED)?.round().to_i64()
}

/// Payment details recorded when a checkout completes
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentCompletion {
    pub session_id: String,
    pub payment_intent_id: Option<String>,
    pub payment_method: String,
    pub metadata: HashMap<String, String>,
}

/// A status change applied by the repository
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: InvoiceStatus,
    pub at: DateTime<Utc>,
    pub payment: Option<PaymentCompletion>,
}

impl StatusUpdate {
    pub fn paid(at: DateTime<Utc>, payment: PaymentCompletion) -> Self {
        Self {
            status: InvoiceStatus::Paid,
            at,
            payment: Some(payment),
        }
    }

    pub fn overdue(at: DateTime<Utc>) -> Self {
        Self {
            status: InvoiceStatus::Overdue,
            at,
            payment: None,
        }
    }
}

impl Invoice {
    /// Apply a status update in place
    pub fn apply(&mut self, update: StatusUpdate) {
        self.status = update.status;
        self.updated_at = update.at;
        if update.status == InvoiceStatus::Paid && self.paid_date.is_none() {
            self.paid_date = Some(update.at);
        }
        if let Some(payment) = update.payment {
            self.payment_session_id = Some(payment.session_id);
            self.payment_intent_id = payment.payment_intent_id;
            self.payment_method = Some(payment.payment_method);
            self.payment_metadata = Some(payment.metadata);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(amount: i64, quantity: u32) -> NewLineItem {
        NewLineItem {
            description: "Work".to_string(),
            amount: Decimal::from(amount),
            quantity,
        }
    }

    #[test]
    fn test_total_ignores_quantity() {
        let items = vec![item(100, 3), item(50, 2)];
        assert_eq!(compute_total(&items), Some(Decimal::from(150)));
    }

    #[test]
    fn test_total_is_exact_for_fractions() {
        let items = vec![
            NewLineItem {
                description: "a".into(),
                amount: Decimal::new(10, 2),
                quantity: 1,
            },
            NewLineItem {
                description: "b".into(),
                amount: Decimal::new(20, 2),
                quantity: 1,
            },
        ];
        assert_eq!(compute_total(&items), Some(Decimal::new(30, 2)));
    }

    #[test]
    fn test_total_overflow_is_none() {
        let huge = NewLineItem {
            description: "a".into(),
            amount: Decimal::MAX,
            quantity: 1,
        };
        assert_eq!(compute_total(&[huge.clone(), item(1, 1)]), None);
        assert_eq!(compute_total(&[huge]), Some(Decimal::MAX));
    }

    #[test]
    fn test_minor_units_bounds() {
        assert_eq!(minor_units(Decimal::new(10005, 3)), Some(1_000));
        assert_eq!(minor_units(Decimal::from(i64::MAX / 100)), Some(i64::MAX / 100 * 100));
        assert_eq!(minor_units(Decimal::from(i64::MAX)), None);
        assert_eq!(minor_units(Decimal::MAX), None);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            InvoiceStatus::Unpaid,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<InvoiceStatus>().unwrap(), status);
        }
        assert!("SETTLED".parse::<InvoiceStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&InvoiceStatus::Overdue).unwrap();
        assert_eq!(json, "\"OVERDUE\"");
    }
}
