//! Payment gateway integration.
//!
//! Orders are created with Razorpay when credentials are configured, and
//! with [`MockPaymentGateway`] otherwise. The choice is made once at
//! startup from configuration; a failing real gateway never falls back to
//! the mock.

use crate::config::PaymentConfig;
use crate::types::{Money, ReservationId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, PaymentGatewayError>;

/// Payment gateway error
#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    /// The gateway answered with a non-success status
    #[error("gateway rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
    /// The gateway could not be reached
    #[error("gateway unreachable: {0}")]
    Transport(String),
    /// The gateway's response could not be understood
    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

/// Order to open with the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    /// Amount in minor units (paise)
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
    /// Merchant receipt reference
    pub receipt: String,
}

impl OrderRequest {
    /// Order for a reservation's stored amount.
    #[must_use]
    pub fn for_reservation(reservation_id: ReservationId, amount: Money, currency: &str) -> Self {
        Self {
            amount: amount.minor(),
            currency: currency.to_string(),
            receipt: format!("rcpt_{reservation_id}"),
        }
    }
}

/// Order as returned to the client.
///
/// Gateway fields this service does not interpret are passed through
/// unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    /// Set on orders produced without a gateway
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mock: bool,
    /// Gateway order id
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
    /// Merchant receipt reference
    #[serde(default)]
    pub receipt: Option<String>,
    /// Remaining gateway fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Payment gateway trait
///
/// Abstraction over order-creating payment processors.
pub trait PaymentGateway: Send + Sync {
    /// Open an order for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentGatewayError`] if the gateway rejects the order or
    /// cannot be reached.
    fn create_order(
        &self,
        reservation_id: ReservationId,
        request: OrderRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentOrder>> + Send>>;
}

/// Pick the gateway for `config`: Razorpay with credentials, the mock without.
///
/// # Errors
///
/// Returns [`PaymentGatewayError::Transport`] if the HTTP client cannot be built.
pub fn from_config(config: &PaymentConfig) -> GatewayResult<Arc<dyn PaymentGateway>> {
    match config.razorpay_credentials() {
        Some((key_id, key_secret)) => {
            tracing::info!("Payment gateway: Razorpay");
            Ok(Arc::new(RazorpayGateway::new(
                &config.razorpay_base_url,
                key_id,
                key_secret,
            )?))
        }
        None => {
            tracing::info!("Payment gateway: mock (no Razorpay credentials)");
            Ok(MockPaymentGateway::shared())
        }
    }
}

// ============================================================================
// Mock
// ============================================================================

/// Mock payment gateway: deterministic orders, no network.
#[derive(Clone, Debug)]
pub struct MockPaymentGateway;

impl MockPaymentGateway {
    /// Creates a new mock payment gateway
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new())
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn create_order(
        &self,
        reservation_id: ReservationId,
        request: OrderRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentOrder>> + Send>> {
        Box::pin(async move {
            let order = PaymentOrder {
                mock: true,
                id: format!("order_mock_{reservation_id}"),
                amount: request.amount,
                currency: request.currency,
                receipt: Some(request.receipt),
                extra: serde_json::Map::new(),
            };
            tracing::info!(
                reservation_id = %reservation_id,
                amount = order.amount,
                order_id = %order.id,
                "Mock order created"
            );
            Ok(order)
        })
    }
}

// ============================================================================
// Razorpay
// ============================================================================

/// Razorpay Orders API client.
#[derive(Clone, Debug)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    orders_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    /// Client for the API at `base_url` (e.g. `https://api.razorpay.com`).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentGatewayError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, key_id: &str, key_secret: &str) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PaymentGatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            orders_url: format!("{}/v1/orders", base_url.trim_end_matches('/')),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        })
    }
}

impl PaymentGateway for RazorpayGateway {
    fn create_order(
        &self,
        reservation_id: ReservationId,
        request: OrderRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<PaymentOrder>> + Send>> {
        let gateway = self.clone();
        Box::pin(async move {
            let response = gateway
                .client
                .post(&gateway.orders_url)
                .basic_auth(&gateway.key_id, Some(&gateway.key_secret))
                .json(&request)
                .send()
                .await
                .map_err(|e| PaymentGatewayError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                tracing::error!(
                    reservation_id = %reservation_id,
                    status = status.as_u16(),
                    "Razorpay rejected order"
                );
                return Err(PaymentGatewayError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }

            let order: PaymentOrder = response
                .json()
                .await
                .map_err(|e| PaymentGatewayError::Decode(e.to_string()))?;
            tracing::info!(
                reservation_id = %reservation_id,
                order_id = %order.id,
                "Razorpay order created"
            );
            Ok(order)
        })
    }
}
