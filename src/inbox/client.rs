//! HTTP client for the external message store.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::body::{decode_subject, normalized_body};
use super::payload::{MessageList, header};
use crate::config::InboxConfig;
use crate::error::TransportError;

/// The newest message in the store, normalized for evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxItem {
    /// Store-assigned identifier.
    pub id: String,
    pub subject: String,
    /// Normalized HTML body; empty when the message has no content.
    pub body: String,
}

impl InboxItem {
    pub fn has_body(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

/// Source of the newest inbox item.
#[async_trait]
pub trait InboxSource: Send + Sync {
    /// Fetch the newest item, or `None` when the store is empty.
    async fn fetch_latest(&self) -> Result<Option<InboxItem>, TransportError>;
}

/// Inbox client for a MailHog-compatible HTTP API.
pub struct HttpInbox {
    client: reqwest::Client,
    url: String,
    config: InboxConfig,
}

impl HttpInbox {
    pub fn new(config: InboxConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        let url = format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            config.messages_path
        );
        Ok(Self {
            client,
            url,
            config,
        })
    }

    /// Full URL of the listing endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_request_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                timeout: self.config.request_timeout,
            }
        } else {
            TransportError::Unreachable {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl InboxSource for HttpInbox {
    async fn fetch_latest(&self) -> Result<Option<InboxItem>, TransportError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("limit", "1")])
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(e))?;
        let list: MessageList = serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        let Some(newest) = list.items.into_iter().next() else {
            debug!("Inbox is empty");
            return Ok(None);
        };

        let subject = header(newest.headers(), "Subject")
            .map(decode_subject)
            .unwrap_or_else(|| "(no subject)".to_string());
        let body = normalized_body(&newest);

        debug!(id = %newest.id, subject = %subject, body_len = body.len(), "Fetched newest inbox item");

        Ok(Some(InboxItem {
            id: newest.id,
            subject,
            body,
        }))
    }
}
