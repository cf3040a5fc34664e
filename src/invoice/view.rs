//! Sanitized response projections
//!
//! Internal fields (owner id, gateway session and intent ids, payment metadata)
//! never leave the service; these views are the whole response contract.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::business::Business;
use crate::invoice::model::{Invoice, InvoiceStatus, LineItem};
use crate::invoice::numbering::format_invoice_number;

/// Invoice as returned to its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    pub id: Uuid,
    pub invoice_number: u32,
    pub formatted_invoice_number: String,
    pub client_name: String,
    pub client_email: String,
    pub currency: String,
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<DateTime<Utc>>,
    pub payment_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub business: Option<BusinessView>,
    pub items: Vec<LineItemView>,
}

/// Issuer summary embedded in an invoice view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

impl BusinessView {
    /// Id, name and email only
    pub fn summary(business: &Business) -> Self {
        Self {
            id: business.id,
            name: business.name.clone(),
            email: business.email.clone(),
            phone: None,
            address: None,
            city: None,
            state: None,
            country: None,
            postal_code: None,
            logo: None,
        }
    }

    /// Summary plus contact and address details
    pub fn detailed(business: &Business) -> Self {
        Self {
            phone: business.phone.clone(),
            address: business.address.clone(),
            city: business.city.clone(),
            state: business.state.clone(),
            country: business.country.clone(),
            postal_code: business.postal_code.clone(),
            logo: business.logo.clone(),
            ..Self::summary(business)
        }
    }
}

/// Line item as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItemView {
    pub id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub quantity: u32,
}

impl From<&LineItem> for LineItemView {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.id,
            description: item.description.clone(),
            amount: item.amount,
            quantity: item.quantity,
        }
    }
}

impl InvoiceView {
    /// Project an invoice, deriving its display number from the business name
    pub fn project(invoice: &Invoice, business: Option<BusinessView>) -> Self {
        let formatted_invoice_number = format_invoice_number(
            invoice.invoice_number,
            business.as_ref().map(|b| b.name.as_str()),
        );

        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number,
            formatted_invoice_number,
            client_name: invoice.client_name.clone(),
            client_email: invoice.client_email.clone(),
            currency: invoice.currency.clone(),
            total: invoice.total,
            status: invoice.status,
            due_date: invoice.due_date,
            paid_date: invoice.paid_date,
            payment_link: invoice.payment_link.clone(),
            created_at: invoice.created_at,
            business,
            items: invoice.items.iter().map(LineItemView::from).collect(),
        }
    }
}

/// Pagination block of a list response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(total: u64, page: u64, limit: u64) -> Self {
        Self {
            total,
            page,
            limit,
            total_pages: if limit == 0 { 0 } else { total.div_ceil(limit) },
        }
    }
}

/// `{data, pagination}` list payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceList {
    pub data: Vec<InvoiceView>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        assert_eq!(Pagination::new(0, 1, 10).total_pages, 0);
        assert_eq!(Pagination::new(10, 1, 10).total_pages, 1);
        assert_eq!(Pagination::new(11, 1, 10).total_pages, 2);
    }

    #[test]
    fn test_empty_list_shape() {
        let list = InvoiceList {
            data: vec![],
            pagination: Pagination::new(0, 1, 10),
        };
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "data": [],
                "pagination": {"total": 0, "page": 1, "limit": 10, "totalPages": 0}
            })
        );
    }
}
