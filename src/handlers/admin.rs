use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::reconciliation::ReconciliationReport;
use crate::ApiResponse;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

const DEFAULT_SCAN_COUNT: u32 = 100;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ReconcileRequest {
    /// How many recent gateway orders to scan
    pub scan_count: Option<u32>,
}

/// Run a reconciliation pass against the payment gateway (admin).
///
/// Surfaces gateway orders with no local record and locally stuck payments;
/// repair is an operator decision, never automatic.
#[utoipa::path(
    post,
    path = "/api/v1/admin/reconcile",
    request_body = ReconcileRequest,
    responses(
        (status = 200, description = "Reconciliation report", body = crate::ApiResponse<ReconciliationReport>),
        (status = 502, description = "Payment gateway error", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn reconcile(
    State(state): State<AppState>,
    request: Option<Json<ReconcileRequest>>,
) -> Result<Json<ApiResponse<ReconciliationReport>>, ServiceError> {
    let scan_count = request
        .and_then(|Json(r)| r.scan_count)
        .unwrap_or(DEFAULT_SCAN_COUNT);

    let report = state.services.reconciliation.reconcile(scan_count).await?;
    Ok(Json(ApiResponse::success(report)))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/reconcile", post(reconcile))
}
