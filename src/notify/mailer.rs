//! Email transports

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use url::Url;

use crate::config::MailConfig;
use crate::notify::{Notification, NotificationSender, NotifyError};

const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<OutgoingAttachment<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    /// Base64 of the attachment bytes
    content: String,
}

/// Sends mail through a JSON-over-HTTP email API
#[derive(Clone)]
pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
    from: String,
}

impl std::fmt::Debug for HttpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMailer")
            .field("endpoint", &self.endpoint.as_str())
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl HttpMailer {
    pub fn new(endpoint: Url, config: &MailConfig) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl NotificationSender for HttpMailer {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = OutgoingMessage {
            from: &self.from,
            to: [&notification.to],
            subject: &notification.subject,
            html: &notification.html,
            attachments: notification
                .attachment
                .iter()
                .map(|a| OutgoingAttachment {
                    filename: &a.file_name,
                    content_type: &a.content_type,
                    content: BASE64.encode(&a.bytes),
                })
                .collect(),
        };

        let mut request = self.http.post(self.endpoint.clone()).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to = %notification.to, "Email accepted by mail API");
        Ok(())
    }
}

/// Logs messages instead of sending them; used when no mail API is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl NotificationSender for LogMailer {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            to = %notification.to,
            subject = %notification.subject,
            attachment = notification.attachment.as_ref().map(|a| a.file_name.as_str()),
            attachment_bytes = notification.attachment.as_ref().map(|a| a.bytes.len()),
            "Email delivery disabled; message logged"
        );
        Ok(())
    }
}
