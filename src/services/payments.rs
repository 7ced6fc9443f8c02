use base64::Engine as _;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::services::orders::{OrderService, VerifiedPaymentOutcome};
use crate::services::signature::verify_payment_signature;

/// Order record as returned by the gateway's Orders API (amount in minor units)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetails,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetails {
    #[allow(dead_code)]
    code: Option<String>,
    description: String,
}

#[derive(Debug, Serialize)]
struct CreateGatewayOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GatewayOrderList {
    items: Vec<GatewayOrder>,
}

/// Thin typed client for the Razorpay Orders API.
///
/// Requests carry HTTP basic auth (`key_id:key_secret`) and an explicit
/// timeout; a timed-out call surfaces as a retryable error, and gateway
/// error descriptions pass through unmodified.
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client build failed: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        })
    }

    pub fn from_app_config(cfg: &crate::config::AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            cfg.razorpay_api_base.clone(),
            cfg.razorpay_key_id.clone(),
            cfg.razorpay_key_secret.clone(),
            Duration::from_secs(cfg.payment_gateway_timeout_secs),
        )
    }

    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.key_id, self.key_secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    /// Creates a gateway order for the given minor-unit amount
    pub async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let url = format!("{}/orders", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.basic_auth())
            .json(&CreateGatewayOrderBody {
                amount: amount_minor,
                currency,
                receipt,
            })
            .send()
            .await
            .map_err(map_gateway_error)?;

        if response.status().is_success() {
            response.json::<GatewayOrder>().await.map_err(|e| {
                error!(error = %e, "Gateway returned an unparseable order payload");
                ServiceError::PaymentGateway("malformed gateway response".to_string())
            })
        } else {
            Err(extract_gateway_error(response).await)
        }
    }

    /// Lists recent gateway orders; used by the reconciliation job
    pub async fn list_orders(&self, count: u32) -> Result<Vec<GatewayOrder>, ServiceError> {
        let url = format!("{}/orders?count={}", self.base_url, count);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.basic_auth())
            .send()
            .await
            .map_err(map_gateway_error)?;

        if response.status().is_success() {
            response
                .json::<GatewayOrderList>()
                .await
                .map(|list| list.items)
                .map_err(|e| {
                    error!(error = %e, "Gateway returned an unparseable order list");
                    ServiceError::PaymentGateway("malformed gateway response".to_string())
                })
        } else {
            Err(extract_gateway_error(response).await)
        }
    }
}

fn map_gateway_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        warn!("Payment gateway request timed out");
        ServiceError::GatewayTimeout
    } else {
        error!(error = %err, "Payment gateway request failed");
        ServiceError::PaymentGateway(err.to_string())
    }
}

async fn extract_gateway_error(response: reqwest::Response) -> ServiceError {
    let status = response.status();
    match response.json::<GatewayErrorBody>().await {
        // The gateway's own message is surfaced unmodified
        Ok(body) => ServiceError::PaymentGateway(body.error.description),
        Err(_) => ServiceError::PaymentGateway(format!("gateway returned status {}", status)),
    }
}

/// Applies the tax surcharge and expresses the result in the gateway's minor
/// unit. Rounding happens once, on the already-multiplied value, half away
/// from zero. `None` when the result does not fit an `i64`.
pub fn surcharged_minor_units(amount: Decimal, tax_rate: Decimal) -> Option<i64> {
    let charged = amount * (Decimal::ONE + tax_rate) * Decimal::from(100);
    charged
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Request to verify a checkout callback; all four fields are required
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,

    #[validate(length(min = 1, message = "gateway_order_id is required"))]
    pub gateway_order_id: String,

    #[validate(length(min = 1, message = "gateway_payment_id is required"))]
    pub gateway_payment_id: String,

    #[validate(length(min = 1, message = "signature is required"))]
    pub signature: String,
}

/// Payment orchestration over the gateway client and the order lifecycle
#[derive(Clone)]
pub struct PaymentService {
    gateway: Arc<RazorpayClient>,
    orders: Arc<OrderService>,
    key_secret: String,
    tax_rate: Decimal,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<RazorpayClient>,
        orders: Arc<OrderService>,
        key_secret: String,
        tax_rate: f64,
    ) -> Result<Self, ServiceError> {
        let tax_rate = Decimal::try_from(tax_rate).map_err(|_| {
            ServiceError::InternalError("order_tax_rate is not representable".to_string())
        })?;
        Ok(Self {
            gateway,
            orders,
            key_secret,
            tax_rate,
        })
    }

    /// Computes the gateway-chargeable amount: the tax surcharge is applied,
    /// the result expressed in minor units, and rounding happens once on the
    /// already-multiplied value, half away from zero.
    pub fn gateway_amount_minor(&self, amount: Decimal) -> Result<i64, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Amount must be greater than zero".to_string(),
            ));
        }
        surcharged_minor_units(amount, self.tax_rate).ok_or_else(|| {
            ServiceError::ValidationError("Amount exceeds the representable range".to_string())
        })
    }

    /// Opens a payment intent for an existing order.
    ///
    /// Two-step protocol: the gateway order is created first, then persisted
    /// onto the local order. A crash between the two leaves an orphaned
    /// gateway order for reconciliation to surface.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn open_payment_intent(
        &self,
        order_id: Uuid,
        amount: Decimal,
        currency: &str,
    ) -> Result<GatewayOrder, ServiceError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let amount_minor = self.gateway_amount_minor(amount)?;
        let gateway_order = self
            .gateway
            .create_order(amount_minor, currency, &order.order_number)
            .await?;

        self.orders
            .record_payment_intent(order_id, &gateway_order.id)
            .await?;

        info!(order_id = %order_id, gateway_order_id = %gateway_order.id, "Payment intent opened");
        Ok(gateway_order)
    }

    /// Verifies a checkout callback signature and transitions the order.
    ///
    /// An invalid signature is terminal: the order is cancelled with
    /// `payment_status=failed` and the caller receives `SignatureMismatch`.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn verify_payment(
        &self,
        request: VerifyPaymentRequest,
    ) -> Result<VerifiedPaymentOutcome, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let authentic = verify_payment_signature(
            &request.gateway_order_id,
            &request.gateway_payment_id,
            &request.signature,
            &self.key_secret,
        );

        if !authentic {
            warn!(order_id = %request.order_id, "Payment signature mismatch");
            self.orders.reject_payment(request.order_id).await?;
            return Err(ServiceError::SignatureMismatch);
        }

        self.orders
            .apply_verified_payment(request.order_id, &request.gateway_payment_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::orders::CreateOrderRequest;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn order_service() -> Arc<OrderService> {
        let pool = crate::db::establish_connection("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        Arc::new(OrderService::new(Arc::new(pool), None))
    }

    fn payment_service(gateway: RazorpayClient, orders: Arc<OrderService>) -> PaymentService {
        PaymentService::new(Arc::new(gateway), orders, "test_secret".into(), 0.18).unwrap()
    }

    fn gateway(base: &str) -> RazorpayClient {
        RazorpayClient::new(base, "rzp_key", "rzp_secret", Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn surcharged_amount_is_expressed_in_minor_units() {
        let svc = payment_service(gateway("http://localhost:1"), order_service().await);

        // 1000 x 1.18 x 100
        assert_eq!(svc.gateway_amount_minor(dec!(1000)).unwrap(), 118_000);
        assert_eq!(svc.gateway_amount_minor(dec!(499.99)).unwrap(), 58_999);
    }

    #[tokio::test]
    async fn midpoints_round_away_from_zero() {
        let svc = payment_service(gateway("http://localhost:1"), order_service().await);

        // 0.25 x 1.18 x 100 = 29.5 -> 30, not banker's 29
        assert_eq!(svc.gateway_amount_minor(dec!(0.25)).unwrap(), 30);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let svc = payment_service(gateway("http://localhost:1"), order_service().await);
        assert!(svc.gateway_amount_minor(dec!(0)).is_err());
        assert!(svc.gateway_amount_minor(dec!(-5)).is_err());
    }

    #[tokio::test]
    async fn gateway_error_description_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": "BAD_REQUEST_ERROR", "description": "amount exceeds maximum amount allowed"}
            })))
            .mount(&server)
            .await;

        let orders = order_service().await;
        let order = orders
            .create_order(CreateOrderRequest {
                client_id: Uuid::new_v4(),
                client_name: "Asha Rao".into(),
                client_email: "asha@client.example".into(),
                service_id: Uuid::new_v4(),
                service_name: "GST Registration".into(),
                amount: dec!(1000),
                currency: "INR".into(),
            })
            .await
            .unwrap();

        let svc = payment_service(gateway(&server.uri()), orders);
        let err = svc
            .open_payment_intent(order.id, dec!(1000), "INR")
            .await
            .unwrap_err();
        match err {
            ServiceError::PaymentGateway(msg) => {
                assert_eq!(msg, "amount exceeds maximum amount allowed")
            }
            other => panic!("expected PaymentGateway, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn open_intent_persists_gateway_order_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_G8xyzRzp1",
                "amount": 118000,
                "currency": "INR",
                "receipt": "ORD-TEST1234",
                "status": "created"
            })))
            .mount(&server)
            .await;

        let orders = order_service().await;
        let order = orders
            .create_order(CreateOrderRequest {
                client_id: Uuid::new_v4(),
                client_name: "Asha Rao".into(),
                client_email: "asha@client.example".into(),
                service_id: Uuid::new_v4(),
                service_name: "Company Incorporation".into(),
                amount: dec!(1000),
                currency: "INR".into(),
            })
            .await
            .unwrap();

        let svc = payment_service(gateway(&server.uri()), orders.clone());
        let gateway_order = svc
            .open_payment_intent(order.id, dec!(1000), "INR")
            .await
            .unwrap();
        assert_eq!(gateway_order.amount, 118_000);

        let stored = orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.gateway_order_id.as_deref(), Some("order_G8xyzRzp1"));
    }

    #[tokio::test]
    async fn bad_signature_cancels_order_and_fails_closed() {
        use crate::services::orders::{OrderStatus, PaymentStatus};
        use crate::services::signature::compute_payment_signature;

        let orders = order_service().await;
        let order = orders
            .create_order(CreateOrderRequest {
                client_id: Uuid::new_v4(),
                client_name: "Asha Rao".into(),
                client_email: "asha@client.example".into(),
                service_id: Uuid::new_v4(),
                service_name: "Trademark Filing".into(),
                amount: dec!(1000),
                currency: "INR".into(),
            })
            .await
            .unwrap();

        let svc = payment_service(gateway("http://localhost:1"), orders.clone());
        // Signature computed with the wrong secret must never verify
        let forged =
            compute_payment_signature("order_G8xyzRzp1", "pay_123", "attacker-secret").unwrap();

        let err = svc
            .verify_payment(VerifyPaymentRequest {
                order_id: order.id,
                gateway_order_id: "order_G8xyzRzp1".into(),
                gateway_payment_id: "pay_123".into(),
                signature: forged,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::SignatureMismatch));

        let stored = orders.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn valid_signature_verifies_payment() {
        use crate::services::orders::OrderStatus;
        use crate::services::signature::compute_payment_signature;

        let orders = order_service().await;
        let order = orders
            .create_order(CreateOrderRequest {
                client_id: Uuid::new_v4(),
                client_name: "Asha Rao".into(),
                client_email: "asha@client.example".into(),
                service_id: Uuid::new_v4(),
                service_name: "Pitch Deck Review".into(),
                amount: dec!(1500),
                currency: "INR".into(),
            })
            .await
            .unwrap();

        let svc = payment_service(gateway("http://localhost:1"), orders.clone());
        let signature =
            compute_payment_signature("order_G8xyzRzp1", "pay_123", "test_secret").unwrap();

        let outcome = svc
            .verify_payment(VerifyPaymentRequest {
                order_id: order.id,
                gateway_order_id: "order_G8xyzRzp1".into(),
                gateway_payment_id: "pay_123".into(),
                signature,
            })
            .await
            .unwrap();

        assert_eq!(outcome.order().status, OrderStatus::Processing);
        assert!(outcome.order().payment_verified);
    }
}
