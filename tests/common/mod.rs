//! Shared harness for router-level integration tests: an in-memory SQLite
//! database, a real middleware stack, and helpers for minting tokens and
//! driving requests with `tower::ServiceExt::oneshot`.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use consulting_api::{
    auth::{self, AuthConfig, AuthService, Role, SessionIdentity},
    config::AppConfig,
    db,
    entities::user,
    events::{process_events, EventSender},
    handlers::AppServices,
    AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str =
    "integration-test-secret-0123456789-abcdefghijklmnopqrstuvwxyz-ABCDEF";
pub const TEST_RAZORPAY_KEY_SECRET: &str = "rzp_test_key_secret_4f1c9";
pub const TEST_WEBHOOK_SECRET: &str = "rzp_test_webhook_secret_77ab2";

pub fn test_config(gateway_base: &str) -> AppConfig {
    // Deserialize through the config crate's own path so defaults stay in
    // one place
    let json = serde_json::json!({
        "database_url": "sqlite::memory:",
        "redis_url": "redis://127.0.0.1:6379",
        "jwt_secret": TEST_JWT_SECRET,
        "jwt_expiration": 3600,
        "refresh_token_expiration": 604800,
        "host": "127.0.0.1",
        "port": 18080,
        "environment": "development",
        "razorpay_key_id": "rzp_test_key",
        "razorpay_key_secret": TEST_RAZORPAY_KEY_SECRET,
        "razorpay_api_base": gateway_base,
        "payment_gateway_timeout_secs": 2,
        "payment_webhook_secret": TEST_WEBHOOK_SECRET,
    });
    serde_json::from_value(json).expect("test config deserializes")
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub auth_service: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// App wired to an unreachable gateway; payment-intent calls will fail
    pub async fn new() -> Self {
        Self::with_gateway("http://127.0.0.1:1").await
    }

    /// App whose Razorpay client points at the given base URL (wiremock)
    pub async fn with_gateway(gateway_base: &str) -> Self {
        let cfg = test_config(gateway_base);

        let pool = db::establish_connection(&cfg.database_url)
            .await
            .expect("in-memory database");
        db::run_migrations(&pool).await.expect("migrations apply");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(process_events(event_rx, None));

        let auth_service = Arc::new(AuthService::new(AuthConfig::from_app_config(&cfg)));
        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()), &cfg)
            .expect("services build");
        let redis = Arc::new(redis::Client::open(cfg.redis_url.clone()).expect("redis client"));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
            redis,
            auth: auth_service.clone(),
        };

        // Same stack as main: edge guard, auth-service injection, request ids
        let router = Router::new()
            .nest("/api/v1", consulting_api::api_v1_routes())
            .layer(axum::middleware::from_fn_with_state(
                auth_service.clone(),
                auth::provide_auth_service,
            ))
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(consulting_api::edge_guard_rules()),
                auth::guard::edge_guard_middleware,
            ))
            .layer(axum::middleware::from_fn(
                consulting_api::middleware_helpers::request_id::request_id_middleware,
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            auth_service,
            _event_task: event_task,
        }
    }

    /// Mints an access token for a fresh identity with the given role
    pub fn token_for(&self, role: Role) -> String {
        self.token_for_user(Uuid::new_v4(), role)
    }

    pub fn token_for_user(&self, user_id: Uuid, role: Role) -> String {
        let identity = SessionIdentity {
            user_id,
            name: "Asha Rao".into(),
            email: "asha@client.example".into(),
            role,
        };
        self.auth_service
            .generate_token_pair(&identity)
            .expect("token pair")
            .access_token
    }

    /// Provisions an account row the login endpoint can authenticate
    pub async fn seed_user(&self, email: &str, password: &str, role: Role) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        user::ActiveModel {
            id: Set(id),
            name: Set("Asha Rao".into()),
            email: Set(email.into()),
            password_hash: Set(auth::hash_password(password).expect("password hashes")),
            role: Set(role.to_string()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("user row inserts");
        id
    }

    /// Seeds an active catalog entry orders can reference
    pub async fn seed_service(
        &self,
        name: &str,
        price: rust_decimal::Decimal,
    ) -> consulting_api::services::catalog::ServiceResponse {
        use consulting_api::services::catalog::{BillingType, UpsertServiceRequest};

        self.state
            .services
            .catalog
            .create_service(UpsertServiceRequest {
                name: name.into(),
                description: "Full registration support".into(),
                category: "compliance".into(),
                price,
                currency: "INR".into(),
                billing_type: BillingType::OneTime,
                features: vec!["Filing".into()],
                requirements: vec!["PAN card".into()],
                deliverables: vec!["Certificate".into()],
                duration: Some("7 days".into()),
            })
            .await
            .expect("catalog entry inserts")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request builds"),
            None => builder.body(Body::empty()).expect("request builds"),
        };
        self.router.clone().oneshot(request).await.expect("response")
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub async fn expect_json(response: Response<Body>, status: StatusCode) -> Value {
    assert_eq!(response.status(), status, "unexpected response status");
    response_json(response).await
}
