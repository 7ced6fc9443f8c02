use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::services::notifications::{NotificationDispatcher, OrderNotice};

/// Events emitted by the order/payment lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled {
        order_id: Uuid,
        order_number: String,
        client_email: Option<String>,
        reason: String,
    },
    OrderAssigned {
        order_id: Uuid,
        assigned_to: Uuid,
    },
    PaymentIntentOpened {
        order_id: Uuid,
        gateway_order_id: String,
    },
    PaymentVerified {
        order_id: Uuid,
        gateway_payment_id: String,
    },
    PaymentVerificationFailed(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, dispatching side effects.
///
/// Cancellation notices go to both the client and the administrative
/// address; everything else is logged for the audit trail.
pub async fn process_events(
    mut receiver: mpsc::Receiver<Event>,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCancelled {
                order_id,
                order_number,
                client_email,
                reason,
            } => {
                info!(order_id = %order_id, reason = %reason, "Order cancelled");
                if let Some(dispatcher) = &dispatcher {
                    let notice = OrderNotice::cancellation(
                        *order_id,
                        order_number.clone(),
                        client_email.clone(),
                        reason.clone(),
                    );
                    if let Err(e) = dispatcher.dispatch(notice).await {
                        error!(order_id = %order_id, error = %e, "Failed to dispatch cancellation notice");
                    }
                }
            }
            Event::PaymentVerified {
                order_id,
                gateway_payment_id,
            } => {
                info!(order_id = %order_id, payment_id = %gateway_payment_id, "Payment verified");
            }
            Event::PaymentVerificationFailed(order_id) => {
                info!(order_id = %order_id, "Payment verification failed");
            }
            other => debug!(event = ?other, "Event processed"),
        }
    }
    info!("Event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_sender_delivers_to_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let order_id = Uuid::new_v4();
        sender.send(Event::OrderCreated(order_id)).await.unwrap();

        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn event_sender_errors_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender
            .send(Event::OrderCreated(Uuid::new_v4()))
            .await
            .is_err());
    }
}
