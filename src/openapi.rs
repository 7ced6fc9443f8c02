use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Registers the bearer scheme the path annotations reference
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Consulting Platform API",
        version = "1.0.0",
        description = r#"
# Consulting Platform API

Backend for a multi-role business-consulting platform: service catalog
browsing, shopping cart, order placement, Razorpay checkout with
cryptographic payment verification, document registration, and role-gated
APIs for clients, employees, managers, and admins.

## Authentication

Protected endpoints require a JWT bearer token:

```
Authorization: Bearer <your-jwt-token>
```

Tokens are issued by `POST /api/v1/auth/login` and refreshed via
`POST /api/v1/auth/refresh`. `POST /api/v1/auth/session` additionally sets
the http-only session cookie and role cookie consumed by the edge-level
access guard.

## Error Handling

Failed requests return a consistent error body with the request id for
support and debugging:

```json
{
  "error": "Bad Request",
  "message": "Validation failed",
  "request_id": "req-abc123xyz",
  "timestamp": "2025-01-01T00:00:00Z"
}
```
        "#,
        contact(
            name = "Consulting Platform Team",
            email = "platform@consulting.example"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Token issuance and session cookies"),
        (name = "Catalog", description = "Service catalog browsing and management"),
        (name = "Cart", description = "Client cart aggregate"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Payments", description = "Checkout and payment verification"),
        (name = "Documents", description = "Order document registration"),
        (name = "Admin", description = "Administrative endpoints")
    ),
    paths(
        // Auth
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::create_session,
        crate::handlers::auth::clear_session,

        // Catalog
        crate::handlers::services::list_services,
        crate::handlers::services::get_service,
        crate::handlers::services::create_service,
        crate::handlers::services::update_service,
        crate::handlers::services::deactivate_service,

        // Cart
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::clear_cart,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::get_timeline,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::assign_order,

        // Payments
        crate::handlers::payments::create_payment_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::payment_webhooks::payment_webhook,

        // Documents
        crate::handlers::documents::register_document,
        crate::handlers::documents::list_documents,

        // Admin
        crate::handlers::admin::reconcile,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            // Auth types
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::RefreshRequest,
            crate::auth::Role,

            // Catalog types
            crate::services::catalog::UpsertServiceRequest,
            crate::services::catalog::ServiceResponse,
            crate::services::catalog::BillingType,

            // Cart types
            crate::handlers::carts::AddCartItemRequest,
            crate::handlers::carts::UpdateCartItemRequest,
            crate::services::carts::CartResponse,
            crate::services::carts::CartItemResponse,

            // Order types
            crate::handlers::orders::CreateOrderHandlerRequest,
            crate::handlers::orders::UpdateStatusRequest,
            crate::handlers::orders::CancelOrderRequest,
            crate::handlers::orders::AssignOrderRequest,
            crate::handlers::orders::TimelineEntryResponse,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderStatus,
            crate::services::orders::PaymentStatus,
            crate::services::orders::CancellationReason,

            // Payment types
            crate::handlers::payments::CreatePaymentOrderRequest,
            crate::handlers::payments::VerifyPaymentResponse,
            crate::services::payments::GatewayOrder,
            crate::services::payments::VerifyPaymentRequest,

            // Document types
            crate::services::documents::RegisterDocumentRequest,
            crate::services::documents::DocumentResponse,

            // Admin types
            crate::handlers::admin::ReconcileRequest,
            crate::services::reconciliation::ReconciliationReport,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
