use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::payments::{GatewayOrder, VerifyPaymentRequest};
use crate::ApiResponse;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
#[schema(example = json!({
    "order_id": "550e8400-e29b-41d4-a716-446655440000",
    "amount": "1000",
    "currency": "INR"
}))]
pub struct CreatePaymentOrderRequest {
    /// Local order the payment intent is opened for
    pub order_id: Uuid,

    /// Base amount; the gateway is charged this plus the tax surcharge,
    /// expressed in minor units
    pub amount: Decimal,

    #[validate(length(min = 3, max = 3, message = "Currency must be 3 characters"))]
    pub currency: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub payment_id: String,
}

/// Enforces that only the order's owner (or staff) can drive its checkout
async fn check_order_access(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> Result<(), ServiceError> {
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
    Ok(())
}

/// Open a payment intent: create the gateway order for the surcharged
/// minor-unit amount and record its id on the local order
#[utoipa::path(
    post,
    path = "/api/v1/payments/create-order",
    request_body = CreatePaymentOrderRequest,
    responses(
        (status = 200, description = "Gateway order created", body = crate::ApiResponse<GatewayOrder>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway error", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_payment_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreatePaymentOrderRequest>,
) -> Result<Json<ApiResponse<GatewayOrder>>, ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    check_order_access(&state, &user, request.order_id).await?;

    let gateway_order = state
        .services
        .payment
        .open_payment_intent(request.order_id, request.amount, &request.currency)
        .await?;
    Ok(Json(ApiResponse::success(gateway_order)))
}

/// Verify a checkout callback signature and settle the order state.
///
/// An invalid signature cancels the order with `payment_status=failed` and
/// returns 400. A duplicate callback for an already-verified payment
/// succeeds without changing anything.
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified", body = crate::ApiResponse<VerifyPaymentResponse>),
        (status = 400, description = "Signature mismatch or malformed request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<VerifyPaymentResponse>>, ServiceError> {
    check_order_access(&state, &user, request.order_id).await?;

    let outcome = state.services.payment.verify_payment(request).await?;
    let order = outcome.order();
    let payment_id = order
        .gateway_payment_id
        .clone()
        .unwrap_or_default();

    Ok(Json(ApiResponse::success(VerifyPaymentResponse {
        success: true,
        order_id: order.id,
        payment_id,
    })))
}

/// Authenticated checkout routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/create-order", post(create_payment_order))
        .route("/payments/verify", post(verify_payment))
}
