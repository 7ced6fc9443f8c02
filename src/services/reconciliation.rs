use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity},
    errors::ServiceError,
    services::payments::RazorpayClient,
};
use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// How long a payment may sit `pending` with an open gateway order before
/// it is flagged for operator attention
const STALE_PENDING_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationReport {
    /// Gateway orders scanned in this pass
    pub scanned: usize,
    /// Gateway order ids with no matching local order record
    pub orphaned_gateway_orders: Vec<String>,
    /// Local orders stuck pending with an open gateway order past the window
    pub stale_pending_orders: Vec<Uuid>,
}

/// Closes the partial-failure window left by the two-step payment-intent
/// protocol: a gateway order created whose local write failed has no
/// matching record, and shows up here. Flag-only; no automatic repair.
#[derive(Clone)]
pub struct ReconciliationService {
    gateway: Arc<RazorpayClient>,
    db_pool: Arc<DbPool>,
}

impl ReconciliationService {
    pub fn new(gateway: Arc<RazorpayClient>, db_pool: Arc<DbPool>) -> Self {
        Self { gateway, db_pool }
    }

    #[instrument(skip(self))]
    pub async fn reconcile(&self, scan_count: u32) -> Result<ReconciliationReport, ServiceError> {
        let gateway_orders = self.gateway.list_orders(scan_count).await?;

        let known_ids: HashSet<String> = OrderEntity::find()
            .filter(order::Column::GatewayOrderId.is_not_null())
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .filter_map(|o| o.gateway_order_id)
            .collect();

        let orphaned_gateway_orders: Vec<String> = gateway_orders
            .iter()
            .filter(|g| !known_ids.contains(&g.id))
            .map(|g| g.id.clone())
            .collect();

        let cutoff = Utc::now() - Duration::hours(STALE_PENDING_HOURS);
        let stale_pending_orders: Vec<Uuid> = OrderEntity::find()
            .filter(order::Column::PaymentStatus.eq("pending"))
            .filter(order::Column::GatewayOrderId.is_not_null())
            .filter(order::Column::UpdatedAt.lt(cutoff))
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|o| o.id)
            .collect();

        for id in &orphaned_gateway_orders {
            warn!(gateway_order_id = %id, "Gateway order has no local record");
        }
        for id in &stale_pending_orders {
            warn!(order_id = %id, "Order stuck pending past the reconciliation window");
        }
        info!(
            scanned = gateway_orders.len(),
            orphaned = orphaned_gateway_orders.len(),
            stale = stale_pending_orders.len(),
            "Reconciliation pass complete"
        );

        Ok(ReconciliationReport {
            scanned: gateway_orders.len(),
            orphaned_gateway_orders,
            stale_pending_orders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::orders::{CreateOrderRequest, OrderService};
    use rust_decimal_macros::dec;
    use std::time::Duration as StdDuration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn flags_gateway_orders_without_local_records() {
        let pool = Arc::new(
            crate::db::establish_connection("sqlite::memory:")
                .await
                .unwrap(),
        );
        crate::db::run_migrations(&pool).await.unwrap();

        let orders = OrderService::new(pool.clone(), None);
        let order = orders
            .create_order(CreateOrderRequest {
                client_id: Uuid::new_v4(),
                client_name: "Asha Rao".into(),
                client_email: "asha@client.example".into(),
                service_id: Uuid::new_v4(),
                service_name: "Compliance Review".into(),
                amount: dec!(2000),
                currency: "INR".into(),
            })
            .await
            .unwrap();
        orders
            .record_payment_intent(order.id, "order_known")
            .await
            .unwrap();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": "order_known", "amount": 236000, "currency": "INR", "receipt": null, "status": "paid"},
                    {"id": "order_orphan", "amount": 118000, "currency": "INR", "receipt": null, "status": "created"}
                ]
            })))
            .mount(&server)
            .await;

        let gateway = Arc::new(
            RazorpayClient::new(
                server.uri(),
                "rzp_key",
                "rzp_secret",
                StdDuration::from_secs(2),
            )
            .unwrap(),
        );

        let report = ReconciliationService::new(gateway, pool)
            .reconcile(50)
            .await
            .unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.orphaned_gateway_orders, vec!["order_orphan"]);
    }
}
