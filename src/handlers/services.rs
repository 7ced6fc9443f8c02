use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::catalog::{ServiceResponse, UpsertServiceRequest};
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CatalogQuery {
    pub category: Option<String>,
    /// Staff-only; ignored for anonymous and client callers
    #[serde(default)]
    pub include_inactive: bool,
}

/// Browse the service catalog (public read)
#[utoipa::path(
    get,
    path = "/api/v1/services",
    params(CatalogQuery),
    responses(
        (status = 200, description = "Catalog listing", body = crate::ApiResponse<Vec<ServiceResponse>>)
    ),
    tag = "Catalog"
)]
pub async fn list_services(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ApiResponse<Vec<ServiceResponse>>>, ServiceError> {
    let staff = user.map(|u| u.is_staff()).unwrap_or(false);
    let include_inactive = query.include_inactive && staff;

    let services = state
        .services
        .catalog
        .list_services(include_inactive, query.category.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(services)))
}

/// Fetch a single catalog entry
#[utoipa::path(
    get,
    path = "/api/v1/services/{id}",
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, description = "Catalog entry", body = crate::ApiResponse<ServiceResponse>),
        (status = 404, description = "Service not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_service(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ServiceResponse>>, ServiceError> {
    let staff = user.map(|u| u.is_staff()).unwrap_or(false);

    let service = state
        .services
        .catalog
        .get_service(id)
        .await?
        .filter(|s| s.is_active || staff)
        .ok_or_else(|| ServiceError::NotFound(format!("Service {} not found", id)))?;
    Ok(Json(ApiResponse::success(service)))
}

/// Add a catalog entry (admin)
#[utoipa::path(
    post,
    path = "/api/v1/services",
    request_body = UpsertServiceRequest,
    responses(
        (status = 201, description = "Service created", body = crate::ApiResponse<ServiceResponse>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn create_service(
    State(state): State<AppState>,
    Json(request): Json<UpsertServiceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceResponse>>), ServiceError> {
    let service = state.services.catalog.create_service(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(service))))
}

/// Replace a catalog entry (admin)
#[utoipa::path(
    put,
    path = "/api/v1/services/{id}",
    params(("id" = Uuid, Path, description = "Service id")),
    request_body = UpsertServiceRequest,
    responses(
        (status = 200, description = "Service updated", body = crate::ApiResponse<ServiceResponse>),
        (status = 404, description = "Service not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpsertServiceRequest>,
) -> Result<Json<ApiResponse<ServiceResponse>>, ServiceError> {
    let service = state.services.catalog.update_service(id, request).await?;
    Ok(Json(ApiResponse::success(service)))
}

/// Retire a catalog entry (admin). Soft delete: existing orders keep the
/// reference, clients stop seeing it.
#[utoipa::path(
    delete,
    path = "/api/v1/services/{id}",
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 204, description = "Service deactivated"),
        (status = 404, description = "Service not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Catalog"
)]
pub async fn deactivate_service(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.catalog.deactivate_service(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Public catalog browsing routes
pub fn browse_routes() -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services))
        .route("/services/:id", get(get_service))
}

/// Admin-gated catalog management routes
pub fn manage_routes() -> Router<AppState> {
    Router::new()
        .route("/services", post(create_service))
        .route(
            "/services/:id",
            put(update_service).delete(deactivate_service),
        )
}
