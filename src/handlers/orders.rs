use super::common::PaginationParams;
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::orders::{
    CancellationReason, CreateOrderRequest, OrderFilter, OrderResponse, OrderStatus,
};
use crate::{ApiResponse, PaginatedResponse};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
#[schema(example = json!({
    "service_id": "550e8400-e29b-41d4-a716-446655440000",
    "amount": "4999",
    "currency": "INR"
}))]
pub struct CreateOrderHandlerRequest {
    /// Catalog service being ordered
    pub service_id: Uuid,

    /// Order amount; the 18% tax surcharge is added at checkout, not here
    pub amount: Decimal,

    #[validate(length(min = 3, max = 3, message = "Currency must be 3 characters"))]
    pub currency: String,

    /// Defaults to the authenticated client's display name
    pub client_name: Option<String>,

    /// Defaults to the authenticated client's email
    pub client_email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CancelOrderRequest {
    pub reason: CancellationReason,
    /// Required when `reason` is `other`
    pub detail: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AssignOrderRequest {
    pub assigned_to: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListParams {
    #[serde(default = "PaginationParams::default_page")]
    pub page: u64,
    #[serde(default = "PaginationParams::default_per_page")]
    pub per_page: u64,
    pub status: Option<OrderStatus>,
    /// Staff-only filter; clients are always scoped to their own orders
    pub client_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimelineEntryResponse {
    pub id: Uuid,
    pub message: String,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

/// Loads an order and enforces the read/ownership rule: staff see every
/// order, clients only their own.
async fn load_authorized(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> Result<OrderResponse, ServiceError> {
    let order = state
        .services
        .order
        .get_order(order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

    if !user.is_staff() && order.client_id != user.user_id {
        return Err(ServiceError::Forbidden(
            "You do not have access to this order".into(),
        ));
    }
    Ok(order)
}

/// Place an order for a catalog service
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderHandlerRequest,
    responses(
        (status = 201, description = "Order created", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Service not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateOrderHandlerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    // Resolving the catalog entry both 404s unknown services and pins the
    // recorded service name to the catalog, not caller input
    let service = state
        .services
        .catalog
        .resolve_orderable(request.service_id)
        .await?;

    let client_name = request
        .client_name
        .or_else(|| user.name.clone())
        .ok_or_else(|| ServiceError::ValidationError("Client name is required".into()))?;
    let client_email = request
        .client_email
        .or_else(|| user.email.clone())
        .ok_or_else(|| ServiceError::ValidationError("Client email is required".into()))?;

    let order = state
        .services
        .order
        .create_order(CreateOrderRequest {
            client_id: user.user_id,
            client_name,
            client_email,
            service_id: service.id,
            service_name: service.name,
            amount: request.amount,
            currency: request.currency,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// List orders. Staff see all orders and may filter by client; clients see
/// only their own.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListParams),
    responses(
        (status = 200, description = "Order listing", body = crate::ApiResponse<crate::PaginatedResponse<OrderResponse>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<OrderListParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    let client_id = if user.is_staff() {
        params.client_id
    } else {
        Some(user.user_id)
    };

    let list = state
        .services
        .order
        .list_orders(
            params.page,
            params.per_page,
            OrderFilter {
                status: params.status,
                client_id,
            },
        )
        .await?;

    let per_page = list.per_page.max(1);
    let total_pages = list.total.div_ceil(per_page);
    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: list.orders,
        total: list.total,
        page: list.page,
        limit: per_page,
        total_pages,
    })))
}

/// Fetch an order by id
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = crate::ApiResponse<OrderResponse>),
        (status = 403, description = "Not your order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = load_authorized(&state, &user, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Fetch an order by its public order number
#[utoipa::path(
    get,
    path = "/api/v1/orders/by-number/{order_number}",
    params(("order_number" = String, Path, description = "Public order number")),
    responses(
        (status = 200, description = "Order", body = crate::ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .order
        .get_order_by_number(&order_number)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;

    if !user.is_staff() && order.client_id != user.user_id {
        return Err(ServiceError::Forbidden(
            "You do not have access to this order".into(),
        ));
    }
    Ok(Json(ApiResponse::success(order)))
}

/// Fetch the append-only timeline for an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/timeline",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Timeline entries, oldest first", body = crate::ApiResponse<Vec<TimelineEntryResponse>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_timeline(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<TimelineEntryResponse>>>, ServiceError> {
    load_authorized(&state, &user, id).await?;

    let entries = state
        .services
        .order
        .get_timeline(id)
        .await?
        .into_iter()
        .map(|entry| TimelineEntryResponse {
            id: entry.id,
            message: entry.message,
            actor: entry.actor,
            created_at: entry.created_at,
        })
        .collect();
    Ok(Json(ApiResponse::success(entries)))
}

/// Staff transition to any status from the closed set
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = crate::ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .order
        .update_status(id, request.status, request.message, &user.actor())
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Cancel an order with an enumerated reason. Cancellation notices go to the
/// client and the administrative address.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid reason or state", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not your order", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    load_authorized(&state, &user, id).await?;

    let order = state
        .services
        .order
        .cancel_order(id, request.reason, request.detail, &user.actor())
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Assign a staff handler to the order (manager/admin)
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/assign",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = AssignOrderRequest,
    responses(
        (status = 200, description = "Handler assigned", body = crate::ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn assign_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignOrderRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .order
        .assign_order(id, request.assigned_to, &user.actor())
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Routes every authenticated role may call; handlers narrow to owner-or-staff
pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/by-number/:order_number", get(get_order_by_number))
        .route("/orders/:id/timeline", get(get_timeline))
}

/// Client-facing mutations
pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id/cancel", post(cancel_order))
}

/// Staff transitions on the shared state machine
pub fn staff_routes() -> Router<AppState> {
    Router::new().route("/orders/:id/status", put(update_order_status))
}

/// Manager/admin handler assignment
pub fn assignment_routes() -> Router<AppState> {
    Router::new().route("/orders/:id/assign", post(assign_order))
}
