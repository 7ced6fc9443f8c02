use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

/// Kinds of outbound order notices
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    OrderCancelled,
}

/// An outbound notice about an order, addressed to the client and the
/// administrative mailbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderNotice {
    pub kind: NoticeKind,
    pub order_id: Uuid,
    pub order_number: String,
    pub client_email: Option<String>,
    pub reason: String,
}

impl OrderNotice {
    pub fn cancellation(
        order_id: Uuid,
        order_number: String,
        client_email: Option<String>,
        reason: String,
    ) -> Self {
        Self {
            kind: NoticeKind::OrderCancelled,
            order_id,
            order_number,
            client_email,
            reason,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Seam to the external mail/notification collaborator
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notice: OrderNotice) -> Result<(), NotificationError>;
}

/// Payload handed to the delivery webhook, which fans the notice out as
/// email to every recipient
#[derive(Debug, Serialize)]
struct NoticePayload<'a> {
    #[serde(rename = "type")]
    kind: NoticeKind,
    order_id: Uuid,
    order_number: &'a str,
    from: &'a str,
    recipients: Vec<&'a str>,
    reason: &'a str,
}

/// Dispatcher that POSTs notices to the configured delivery webhook
pub struct WebhookDispatcher {
    http: reqwest::Client,
    url: String,
    from_email: String,
    admin_email: String,
}

impl WebhookDispatcher {
    pub fn new(url: String, from_email: String, admin_email: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            from_email,
            admin_email,
        }
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    #[instrument(skip(self, notice), fields(order_id = %notice.order_id))]
    async fn dispatch(&self, notice: OrderNotice) -> Result<(), NotificationError> {
        // The admin address is always copied; the client only when known
        let mut recipients = vec![self.admin_email.as_str()];
        if let Some(client) = notice.client_email.as_deref() {
            recipients.insert(0, client);
        }

        let payload = NoticePayload {
            kind: notice.kind,
            order_id: notice.order_id,
            order_number: &notice.order_number,
            from: &self.from_email,
            recipients,
            reason: &notice.reason,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Delivery(format!(
                "delivery endpoint returned {}",
                response.status()
            )));
        }

        info!(order_number = %notice.order_number, "Order notice dispatched");
        Ok(())
    }
}
