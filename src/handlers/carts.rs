use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::carts::CartResponse;
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AddCartItemRequest {
    pub service_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Fetch the caller's open cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "Cart contents", body = crate::ApiResponse<CartResponse>)),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<CartResponse>>, ServiceError> {
    let cart = state.services.cart.get_cart(user.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Add a catalog service to the cart. The unit price is snapshotted from the
/// catalog at add time.
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddCartItemRequest,
    responses(
        (status = 201, description = "Item added", body = crate::ApiResponse<CartResponse>),
        (status = 404, description = "Service not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<AddCartItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CartResponse>>), ServiceError> {
    let service = state
        .services
        .catalog
        .resolve_orderable(request.service_id)
        .await?;
    let cart = state
        .services
        .cart
        .add_item(user.user_id, &service, request.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(cart))))
}

/// Change the quantity of a cart line
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item id")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Item updated", body = crate::ApiResponse<CartResponse>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateCartItemRequest>,
) -> Result<Json<ApiResponse<CartResponse>>, ServiceError> {
    let cart = state
        .services
        .cart
        .update_item(user.user_id, item_id, request.quantity)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Remove a cart line
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart item id")),
    responses(
        (status = 200, description = "Item removed", body = crate::ApiResponse<CartResponse>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CartResponse>>, ServiceError> {
    let cart = state
        .services
        .cart
        .remove_item(user.user_id, item_id)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Empty the caller's cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses((status = 204, description = "Cart cleared")),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.cart.clear(user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Client cart routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:id", put(update_item).delete(remove_item))
}
