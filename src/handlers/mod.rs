pub mod admin;
pub mod auth;
pub mod carts;
pub mod common;
pub mod documents;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;
pub mod services;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<crate::services::catalog::CatalogService>,
    pub cart: Arc<crate::services::carts::CartService>,
    pub order: Arc<crate::services::orders::OrderService>,
    pub payment: Arc<crate::services::payments::PaymentService>,
    pub documents: Arc<crate::services::documents::DocumentService>,
    pub reconciliation: Arc<crate::services::reconciliation::ReconciliationService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let catalog = Arc::new(crate::services::catalog::CatalogService::new(db_pool.clone()));
        let cart = Arc::new(crate::services::carts::CartService::new(db_pool.clone()));
        let order = Arc::new(crate::services::orders::OrderService::new(
            db_pool.clone(),
            Some(event_sender),
        ));
        let gateway = Arc::new(crate::services::payments::RazorpayClient::from_app_config(
            config,
        )?);
        let payment = Arc::new(crate::services::payments::PaymentService::new(
            gateway.clone(),
            order.clone(),
            config.razorpay_key_secret.clone(),
            config.order_tax_rate,
        )?);
        let documents = Arc::new(crate::services::documents::DocumentService::new(
            db_pool.clone(),
        ));
        let reconciliation = Arc::new(crate::services::reconciliation::ReconciliationService::new(
            gateway, db_pool,
        ));

        Ok(Self {
            catalog,
            cart,
            order,
            payment,
            documents,
            reconciliation,
        })
    }
}
