use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::documents::{DocumentResponse, RegisterDocumentRequest};
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

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

/// Register an uploaded document against an order. The bytes themselves go
/// to the external object store under the returned storage key.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/documents",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = RegisterDocumentRequest,
    responses(
        (status = 201, description = "Document registered", body = crate::ApiResponse<DocumentResponse>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Documents"
)]
pub async fn register_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<RegisterDocumentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DocumentResponse>>), ServiceError> {
    check_order_access(&state, &user, order_id).await?;

    let document = state
        .services
        .documents
        .register_document(order_id, user.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(document))))
}

/// List the documents attached to an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/documents",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Document listing", body = crate::ApiResponse<Vec<DocumentResponse>>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Documents"
)]
pub async fn list_documents(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<DocumentResponse>>>, ServiceError> {
    check_order_access(&state, &user, order_id).await?;

    let documents = state.services.documents.list_documents(order_id).await?;
    Ok(Json(ApiResponse::success(documents)))
}

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/orders/:id/documents",
        post(register_document).get(list_documents),
    )
}
