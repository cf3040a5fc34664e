//! Invoice persistence
//!
//! [`InvoiceRepository`] is the only shared mutable resource in the service.
//! Number assignment and insertion happen in one step so concurrent creates
//! for the same owner cannot collide, and status changes are compare-and-set
//! against the status the caller observed.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::invoice::model::{Invoice, InvoiceDraft, InvoiceStatus, LineItem, StatusUpdate};

/// Persistence errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Target row does not exist
    #[error("Invoice {0} not found")]
    NotFound(Uuid),

    /// Backend failure
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// One page of an owner's invoices
#[derive(Debug, Clone)]
pub struct InvoicePage {
    pub invoices: Vec<Invoice>,
    pub total: u64,
}

/// Storage port for invoices and their line items
#[async_trait]
pub trait InvoiceRepository: Send + Sync + 'static {
    /// Insert an invoice with its items, assigning `max(owner's numbers) + 1`
    async fn create(&self, draft: InvoiceDraft) -> RepositoryResult<Invoice>;

    /// Fetch by id, only if owned by `owner_id`
    async fn find_for_owner(&self, id: Uuid, owner_id: &str) -> RepositoryResult<Option<Invoice>>;

    /// Fetch by id regardless of owner (trusted webhook path)
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Invoice>>;

    /// Owner's invoices ordered by invoice number, newest first
    async fn list_for_owner(
        &self,
        owner_id: &str,
        offset: u64,
        limit: u64,
    ) -> RepositoryResult<InvoicePage>;

    /// Record the hosted checkout for an invoice
    async fn attach_payment_link(
        &self,
        id: Uuid,
        payment_link: &str,
        session_id: &str,
    ) -> RepositoryResult<Invoice>;

    /// Apply `update` only if the invoice is still in `expected`.
    ///
    /// Returns `None` when the row is gone or its status moved on.
    async fn update_status(
        &self,
        id: Uuid,
        expected: InvoiceStatus,
        update: StatusUpdate,
    ) -> RepositoryResult<Option<Invoice>>;

    /// Delete an invoice and its items; returns whether a row was removed
    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}

/// Repository held in process memory
#[derive(Debug, Default)]
pub struct InMemoryInvoiceRepository {
    invoices: RwLock<HashMap<Uuid, Invoice>>,
}

impl InMemoryInvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored invoices
    pub async fn len(&self) -> usize {
        self.invoices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.invoices.read().await.is_empty()
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryInvoiceRepository {
    async fn create(&self, draft: InvoiceDraft) -> RepositoryResult<Invoice> {
        let mut invoices = self.invoices.write().await;

        let invoice_number = invoices
            .values()
            .filter(|inv| inv.owner_id == draft.owner_id)
            .map(|inv| inv.invoice_number)
            .max()
            .unwrap_or(0)
            + 1;

        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            owner_id: draft.owner_id,
            business_id: draft.business_id,
            invoice_number,
            client_name: draft.client_name,
            client_email: draft.client_email,
            currency: draft.currency,
            total: draft.total,
            status: InvoiceStatus::Unpaid,
            due_date: draft.due_date,
            payment_link: None,
            payment_session_id: None,
            payment_intent_id: None,
            payment_method: None,
            payment_metadata: None,
            paid_date: None,
            created_at: now,
            updated_at: now,
            items: draft
                .items
                .into_iter()
                .map(|item| LineItem {
                    id: Uuid::new_v4(),
                    description: item.description,
                    amount: item.amount,
                    quantity: item.quantity,
                })
                .collect(),
        };

        invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn find_for_owner(&self, id: Uuid, owner_id: &str) -> RepositoryResult<Option<Invoice>> {
        Ok(self
            .invoices
            .read()
            .await
            .get(&id)
            .filter(|inv| inv.owner_id == owner_id)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Invoice>> {
        Ok(self.invoices.read().await.get(&id).cloned())
    }

    async fn list_for_owner(
        &self,
        owner_id: &str,
        offset: u64,
        limit: u64,
    ) -> RepositoryResult<InvoicePage> {
        let invoices = self.invoices.read().await;

        let mut owned: Vec<&Invoice> = invoices
            .values()
            .filter(|inv| inv.owner_id == owner_id)
            .collect();
        owned.sort_by(|a, b| b.invoice_number.cmp(&a.invoice_number));

        let total = owned.len() as u64;
        let page = owned
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(InvoicePage {
            invoices: page,
            total,
        })
    }

    async fn attach_payment_link(
        &self,
        id: Uuid,
        payment_link: &str,
        session_id: &str,
    ) -> RepositoryResult<Invoice> {
        let mut invoices = self.invoices.write().await;
        let invoice = invoices.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;

        invoice.payment_link = Some(payment_link.to_string());
        invoice.payment_session_id = Some(session_id.to_string());
        invoice.updated_at = Utc::now();

        Ok(invoice.clone())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: InvoiceStatus,
        update: StatusUpdate,
    ) -> RepositoryResult<Option<Invoice>> {
        let mut invoices = self.invoices.write().await;

        match invoices.get_mut(&id) {
            Some(invoice) if invoice.status == expected => {
                invoice.apply(update);
                Ok(Some(invoice.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        Ok(self.invoices.write().await.remove(&id).is_some())
    }
}
