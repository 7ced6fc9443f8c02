use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity},
    entities::order_timeline,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Closed set of order fulfillment states
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

/// Closed set of payment states
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Refunded,
    Failed,
}

/// Enumerated client cancellation reasons; `Other` requires free text
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CancellationReason {
    RequirementsChanged,
    FoundAlternative,
    BudgetConstraints,
    TimelineIssues,
    Other,
}

impl CancellationReason {
    /// Resolves the reason text recorded on the order, rejecting an `Other`
    /// selection without an explanation.
    pub fn resolve_text(&self, detail: Option<&str>) -> Result<String, ServiceError> {
        match self {
            CancellationReason::Other => {
                let detail = detail.map(str::trim).filter(|d| !d.is_empty());
                match detail {
                    Some(text) => Ok(text.to_string()),
                    None => Err(ServiceError::ValidationError(
                        "A reason is required when selecting 'other'".to_string(),
                    )),
                }
            }
            reason => Ok(reason.to_string()),
        }
    }
}

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub client_id: Uuid,
    #[validate(length(min = 1, message = "Client name is required"))]
    pub client_name: String,
    #[validate(email(message = "Client email must be valid"))]
    pub client_email: String,
    pub service_id: Uuid,
    #[validate(length(min = 1, message = "Service name is required"))]
    pub service_name: String,
    pub amount: Decimal,
    #[validate(length(min = 3, max = 3, message = "Currency must be 3 characters"))]
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub client_email: String,
    pub service_id: Uuid,
    pub service_name: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_verified: bool,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Filters for order listing
#[derive(Debug, Default, Clone)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub client_id: Option<Uuid>,
}

/// Outcome of applying a verified payment callback
#[derive(Debug)]
pub enum VerifiedPaymentOutcome {
    Applied(OrderResponse),
    /// Duplicate callback for an already-verified payment; no state changed
    AlreadyVerified(OrderResponse),
}

impl VerifiedPaymentOutcome {
    pub fn order(&self) -> &OrderResponse {
        match self {
            VerifiedPaymentOutcome::Applied(order) => order,
            VerifiedPaymentOutcome::AlreadyVerified(order) => order,
        }
    }
}

/// Order lifecycle controller.
///
/// Every mutation is a compare-and-swap on the order's `version` column and
/// appends exactly one timeline entry inside the same transaction. A lost
/// race surfaces as `ConcurrentModification`; callers decide whether to
/// retry.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new order at `pending`/`pending` with one timeline entry
    #[instrument(skip(self, request), fields(client_id = %request.client_id, service_id = %request.service_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Order amount must be greater than zero".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = generate_order_number();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_active_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            client_id: Set(request.client_id),
            client_name: Set(request.client_name),
            client_email: Set(request.client_email),
            service_id: Set(request.service_id),
            service_name: Set(request.service_name),
            amount: Set(request.amount),
            currency: Set(request.currency),
            status: Set(OrderStatus::Pending.to_string()),
            payment_status: Set(PaymentStatus::Pending.to_string()),
            payment_verified: Set(false),
            gateway_order_id: Set(None),
            gateway_payment_id: Set(None),
            assigned_to: Set(None),
            cancellation_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
        };

        let order_model = order_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;

        append_timeline(&txn, order_id, "Order created", "system", now).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, client_id = %order_model.client_id, "Order created");
        self.emit(Event::OrderCreated(order_id)).await;

        model_to_response(order_model)
    }

    /// Retrieves an order by ID
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        order.map(model_to_response).transpose()
    }

    /// Retrieves an order by its public order number
    pub async fn get_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderResponse>, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        order.map(model_to_response).transpose()
    }

    /// Resolves the local order a gateway webhook refers to
    pub async fn get_order_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<OrderResponse>, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::GatewayOrderId.eq(gateway_order_id))
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?;
        order.map(model_to_response).transpose()
    }

    /// Lists orders with pagination and optional filters
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
        filter: OrderFilter,
    ) -> Result<OrderListResponse, ServiceError> {
        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status.to_string()));
        }
        if let Some(client_id) = filter.client_id {
            query = query.filter(order::Column::ClientId.eq(client_id));
        }

        let paginator = query.paginate(&*self.db_pool, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        let orders = orders
            .into_iter()
            .map(model_to_response)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Returns the append-only timeline for an order, oldest first
    pub async fn get_timeline(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<order_timeline::Model>, ServiceError> {
        order_timeline::Entity::find()
            .filter(order_timeline::Column::OrderId.eq(order_id))
            .order_by_asc(order_timeline::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Staff transition to an arbitrary status from the closed set
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        message: Option<String>,
        actor: &str,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.load(order_id).await?;
        let old_status = order.status.clone();

        let timeline_message = match &message {
            Some(note) => format!("Status changed to {}: {}", new_status, note),
            None => format!("Status changed to {}", new_status),
        };

        let updated = self
            .mutate(order, actor, &timeline_message, |am| {
                am.status = Set(new_status.to_string());
            })
            .await?;

        info!(order_id = %order_id, old_status = %old_status, new_status = %new_status, "Order status updated");
        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status,
            new_status: new_status.to_string(),
        })
        .await;

        model_to_response(updated)
    }

    /// Client-initiated cancellation with an enumerated reason.
    /// Cancellation is a status transition; orders are never deleted.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: CancellationReason,
        detail: Option<String>,
        actor: &str,
    ) -> Result<OrderResponse, ServiceError> {
        let reason_text = reason.resolve_text(detail.as_deref())?;
        let order = self.load(order_id).await?;

        if order.status == OrderStatus::Cancelled.to_string() {
            return Err(ServiceError::InvalidStatus(
                "Order is already cancelled".to_string(),
            ));
        }
        if order.status == OrderStatus::Completed.to_string() {
            return Err(ServiceError::InvalidStatus(
                "Completed orders cannot be cancelled".to_string(),
            ));
        }

        let timeline_message = format!("Order cancelled: {}", reason_text);
        let reason_for_event = reason_text.clone();
        let updated = self
            .mutate(order, actor, &timeline_message, move |am| {
                am.status = Set(OrderStatus::Cancelled.to_string());
                am.cancellation_reason = Set(Some(reason_text));
            })
            .await?;

        info!(order_id = %order_id, "Order cancelled");
        self.emit(Event::OrderCancelled {
            order_id,
            order_number: updated.order_number.clone(),
            client_email: Some(updated.client_email.clone()),
            reason: reason_for_event,
        })
        .await;

        model_to_response(updated)
    }

    /// Assigns a staff handler to the order
    #[instrument(skip(self), fields(order_id = %order_id, assigned_to = %assigned_to))]
    pub async fn assign_order(
        &self,
        order_id: Uuid,
        assigned_to: Uuid,
        actor: &str,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.load(order_id).await?;
        let timeline_message = format!("Order assigned to {}", assigned_to);

        let updated = self
            .mutate(order, actor, &timeline_message, move |am| {
                am.assigned_to = Set(Some(assigned_to));
            })
            .await?;

        self.emit(Event::OrderAssigned {
            order_id,
            assigned_to,
        })
        .await;

        model_to_response(updated)
    }

    /// Records the gateway transaction id minted when a payment intent opens
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn record_payment_intent(
        &self,
        order_id: Uuid,
        gateway_order_id: &str,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self.load(order_id).await?;

        // A re-attempt after failure replaces the previous gateway order,
        // orphaning it; reconciliation sweeps those up.
        if let Some(previous) = &order.gateway_order_id {
            warn!(order_id = %order_id, previous = %previous, "Replacing existing gateway order id");
        }

        let gateway_order_id = gateway_order_id.to_string();
        let timeline_message = format!("Payment intent opened ({})", gateway_order_id);
        let gateway_for_event = gateway_order_id.clone();

        let updated = self
            .mutate(order, "system", &timeline_message, move |am| {
                am.gateway_order_id = Set(Some(gateway_order_id));
            })
            .await?;

        self.emit(Event::PaymentIntentOpened {
            order_id,
            gateway_order_id: gateway_for_event,
        })
        .await;

        model_to_response(updated)
    }

    /// Applies a verified payment callback.
    ///
    /// Idempotent under duplicate gateway callbacks: a replay for the same
    /// `(order_id, gateway_payment_id)` returns the already-verified order
    /// without a second timeline entry or state change. A verified order
    /// presented with a different payment id is a conflict.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn apply_verified_payment(
        &self,
        order_id: Uuid,
        gateway_payment_id: &str,
    ) -> Result<VerifiedPaymentOutcome, ServiceError> {
        let order = self.load(order_id).await?;

        if order.payment_verified {
            return if order.gateway_payment_id.as_deref() == Some(gateway_payment_id) {
                info!(order_id = %order_id, "Duplicate payment callback ignored");
                Ok(VerifiedPaymentOutcome::AlreadyVerified(model_to_response(
                    order,
                )?))
            } else {
                Err(ServiceError::Conflict(format!(
                    "Order {} is already verified against a different payment",
                    order_id
                )))
            };
        }

        let gateway_payment_id = gateway_payment_id.to_string();
        let payment_for_event = gateway_payment_id.clone();

        let updated = self
            .mutate(order, "gateway", "Payment verified", move |am| {
                am.status = Set(OrderStatus::Processing.to_string());
                am.payment_status = Set(PaymentStatus::Paid.to_string());
                am.payment_verified = Set(true);
                am.gateway_payment_id = Set(Some(gateway_payment_id));
            })
            .await?;

        info!(order_id = %order_id, "Payment verified and order moved to processing");
        self.emit(Event::PaymentVerified {
            order_id,
            gateway_payment_id: payment_for_event,
        })
        .await;

        Ok(VerifiedPaymentOutcome::Applied(model_to_response(updated)?))
    }

    /// Records a failed signature verification; never a soft failure
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn reject_payment(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let order = self.load(order_id).await?;

        let updated = self
            .mutate(order, "gateway", "Payment verification failed", |am| {
                am.status = Set(OrderStatus::Cancelled.to_string());
                am.payment_status = Set(PaymentStatus::Failed.to_string());
            })
            .await?;

        warn!(order_id = %order_id, "Payment verification failed; order cancelled");
        self.emit(Event::PaymentVerificationFailed(order_id)).await;

        model_to_response(updated)
    }

    async fn load(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Compare-and-swap mutation: applies `apply` on top of the loaded row,
    /// bumps `version`, appends the timeline entry, all in one transaction.
    /// Zero rows affected means another writer won; the caller gets
    /// `ConcurrentModification` and the timeline stays untouched.
    async fn mutate<F>(
        &self,
        order: order::Model,
        actor: &str,
        timeline_message: &str,
        apply: F,
    ) -> Result<order::Model, ServiceError>
    where
        F: FnOnce(&mut order::ActiveModel),
    {
        let db = &*self.db_pool;
        let order_id = order.id;
        let expected_version = order.version;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let mut am = order::ActiveModel {
            ..Default::default()
        };
        apply(&mut am);
        am.updated_at = Set(now);
        am.version = Set(expected_version + 1);

        let result = OrderEntity::update_many()
            .set(am)
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Version.eq(expected_version))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            warn!(order_id = %order_id, expected_version, "Lost optimistic-concurrency race");
            return Err(ServiceError::ConcurrentModification(order_id));
        }

        append_timeline(&txn, order_id, timeline_message, actor, now).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order mutation");
            ServiceError::DatabaseError(e)
        })?;

        OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send order event");
            }
        }
    }
}

async fn append_timeline(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    message: &str,
    actor: &str,
    at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let entry = order_timeline::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        message: Set(message.to_string()),
        actor: Set(actor.to_string()),
        created_at: Set(at),
    };
    entry
        .insert(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;
    Ok(())
}

fn model_to_response(model: order::Model) -> Result<OrderResponse, ServiceError> {
    let status = OrderStatus::from_str(&model.status)
        .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status: {}", model.status)))?;
    let payment_status = PaymentStatus::from_str(&model.payment_status).map_err(|_| {
        ServiceError::InvalidStatus(format!("Unknown payment status: {}", model.payment_status))
    })?;

    Ok(OrderResponse {
        id: model.id,
        order_number: model.order_number,
        client_id: model.client_id,
        client_name: model.client_name,
        client_email: model.client_email,
        service_id: model.service_id,
        service_name: model.service_name,
        amount: model.amount,
        currency: model.currency,
        status,
        payment_status,
        payment_verified: model.payment_verified,
        gateway_order_id: model.gateway_order_id,
        gateway_payment_id: model.gateway_payment_id,
        assigned_to: model.assigned_to,
        cancellation_reason: model.cancellation_reason,
        created_at: model.created_at,
        updated_at: model.updated_at,
        version: model.version,
    })
}

fn generate_order_number() -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("ORD-{}", suffix)
}
