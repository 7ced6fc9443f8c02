//! Consulting platform API library
//!
//! Service catalog, carts, the order/payment lifecycle, and role-gated
//! routes for a multi-role consulting platform.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService, EdgeGuard, Role, RouteAccess, STAFF_ROLES};
use crate::db::DbPool;
use crate::events::EventSender;
use handlers::AppServices;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: EventSender,
    pub services: AppServices,
    pub redis: Arc<redis::Client>,
    pub auth: Arc<AuthService>,
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub search: Option<String>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Full v1 API surface with per-group access requirements
pub fn api_v1_routes() -> Router<AppState> {
    // Catalog: public browse, admin-only management
    let catalog_browse = handlers::services::browse_routes();
    let catalog_manage = handlers::services::manage_routes().with_roles(&[Role::Admin]);

    // Cart aggregate belongs to the client role
    let carts = handlers::carts::routes().with_roles(&[Role::Client]);

    // Orders: reads for any authenticated role (handlers narrow clients to
    // their own orders), client-only placement/cancellation, staff status
    // transitions, manager/admin assignment
    let orders_read = handlers::orders::read_routes().with_auth();
    let orders_client = handlers::orders::client_routes().with_roles(&[Role::Client]);
    let orders_staff = handlers::orders::staff_routes().with_roles(STAFF_ROLES);
    let orders_assign =
        handlers::orders::assignment_routes().with_roles(&[Role::Manager, Role::Admin]);

    // Checkout requires a bearer token; the webhook authenticates by
    // signature instead
    let payments = handlers::payments::routes().with_auth();
    let payment_webhook = Router::new().route(
        "/payments/webhook",
        axum::routing::post(handlers::payment_webhooks::payment_webhook),
    );

    let documents = handlers::documents::routes().with_auth();
    let admin = handlers::admin::routes().with_roles(&[Role::Admin]);

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Token issuance and session cookies
        .merge(handlers::auth::routes())
        // Catalog API
        .merge(catalog_browse)
        .merge(catalog_manage)
        // Cart API
        .merge(carts)
        // Orders API
        .merge(orders_read)
        .merge(orders_client)
        .merge(orders_staff)
        .merge(orders_assign)
        // Payments API
        .merge(payments)
        .merge(payment_webhook)
        // Order documents API
        .merge(documents)
        // Admin
        .merge(admin)
}

/// Edge-level access rules applied ahead of the router, mirroring the
/// page-level gating: the longest matching prefix wins, unmatched paths
/// pass through to the router's own checks.
pub fn edge_guard_rules() -> EdgeGuard {
    EdgeGuard::new()
        .route("/dashboard", RouteAccess::authenticated())
        .route("/dashboard/staff", RouteAccess::roles(STAFF_ROLES))
        .route("/dashboard/admin", RouteAccess::roles(&[Role::Admin]))
        .route("/account", RouteAccess::authenticated())
}

async fn api_status() -> ApiResult<Value> {
    let version = env!("CARGO_PKG_VERSION");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "service": "consulting-api",
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let redis_status = match state.redis.get_async_connection().await {
        Ok(mut conn) => match redis::cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => "healthy",
            Err(_) => "unhealthy",
        },
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": if db_status == "healthy" { "healthy" } else { "unhealthy" },
        "checks": {
            "database": db_status,
            "cache": redis_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn error_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::error("oops".into())
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }
}
