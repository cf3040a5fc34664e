//! Outbound email
//!
//! The invoice flow hands a finished [`Notification`] to a
//! [`NotificationSender`] after the invoice is durable. Delivery failure is
//! reported to the caller but never undoes invoice state.

pub mod mailer;
pub mod templates;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use mailer::{HttpMailer, LogMailer};
pub use templates::invoice_email;

/// Delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Transport failure
    #[error("Mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Mail API rejected the message
    #[error("Mail API returned {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Send exceeded its time bound
    #[error("Mail send timed out after {0:?}")]
    Timeout(Duration),
}

/// A binary attachment
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A ready-to-send email
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachment: Option<Attachment>,
}

/// Email delivery port
#[async_trait]
pub trait NotificationSender: Send + Sync + 'static {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}
