//! Gateway-initiated payment webhooks.
//!
//! Unlike the client checkout callback, the webhook authenticates with an
//! `X-Razorpay-Signature` header computed over the raw body and keyed by the
//! dedicated webhook secret. Events are deduplicated in Redis on the gateway
//! event id, and settle order state through the same idempotent transitions
//! as the callback path.

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::signature::verify_webhook_signature;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use tracing::{info, warn};

const SIGNATURE_HEADER: &str = "x-razorpay-signature";
const EVENT_ID_HEADER: &str = "x-razorpay-event-id";
const DEDUP_TTL_SECS: usize = 24 * 3600;

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    event: String,
    payload: WebhookPayload,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    payment: PaymentWrapper,
}

#[derive(Debug, Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: String,
}

/// Handle a gateway webhook delivery
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 400, description = "Invalid signature or payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "No matching local order", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), ServiceError> {
    if let Some(secret) = state.config.payment_webhook_secret.as_deref() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ServiceError::SignatureMismatch)?;
        if !verify_webhook_signature(&body, signature, secret) {
            warn!("Webhook signature verification failed");
            return Err(ServiceError::SignatureMismatch);
        }
    }

    // Gateway deliveries are at-least-once; drop replays on the event id
    if let Some(event_id) = headers.get(EVENT_ID_HEADER).and_then(|v| v.to_str().ok()) {
        if already_processed(&state, event_id).await {
            info!(event_id = %event_id, "Webhook event already processed");
            return Ok((StatusCode::OK, "ok"));
        }
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    let payment = &event.payload.payment.entity;
    let order = state
        .services
        .order
        .get_order_by_gateway_order_id(&payment.order_id)
        .await?
        .ok_or_else(|| {
            warn!(gateway_order_id = %payment.order_id, "Webhook for unknown gateway order");
            ServiceError::NotFound(format!(
                "No order for gateway order {}",
                payment.order_id
            ))
        })?;

    match event.event.as_str() {
        "payment.captured" | "payment.authorized" => {
            state
                .services
                .order
                .apply_verified_payment(order.id, &payment.id)
                .await?;
            info!(order_id = %order.id, "Webhook settled payment");
        }
        "payment.failed" => {
            state.services.order.reject_payment(order.id).await?;
            info!(order_id = %order.id, "Webhook recorded payment failure");
        }
        other => {
            info!(event = %other, "Unhandled payment webhook event");
        }
    }

    Ok((StatusCode::OK, "ok"))
}

/// Redis `SET NX` dedup on the gateway event id. A Redis outage degrades to
/// processing the event; the order transitions themselves are idempotent.
async fn already_processed(state: &AppState, event_id: &str) -> bool {
    let key = format!("webhook:{}", event_id);
    match state.redis.get_async_connection().await {
        Ok(mut conn) => {
            let fresh: Result<bool, _> = redis::cmd("SET")
                .arg(&key)
                .arg("1")
                .arg("NX")
                .arg("EX")
                .arg(DEDUP_TTL_SECS)
                .query_async(&mut conn)
                .await;
            matches!(fresh, Ok(false))
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable; webhook dedup skipped");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_payload_parses_razorpay_shape() {
        let body = br#"{
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_29QQoUBi66xm2f",
                        "order_id": "order_9A33XWu170gUtm",
                        "amount": 118000,
                        "currency": "INR",
                        "status": "captured"
                    }
                }
            }
        }"#;

        let event: WebhookEvent = serde_json::from_slice(body).unwrap();
        assert_eq!(event.event, "payment.captured");
        assert_eq!(event.payload.payment.entity.id, "pay_29QQoUBi66xm2f");
        assert_eq!(
            event.payload.payment.entity.order_id,
            "order_9A33XWu170gUtm"
        );
    }
}
