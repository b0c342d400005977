//! Boundary to the external payment gateway.
//!
//! The gateway is modelled on a Razorpay-style orders API: the server opens a
//! remote order for the amount in minor units, the client pays against it, and
//! the gateway reports the outcome through a signed webhook.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod http;
pub mod mock;
pub mod signature;
pub mod webhook;

pub use http::HttpPaymentGateway;
pub use mock::MockPaymentGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway did not respond within {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    /// Amount in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
    /// Our order number, echoed back by the gateway.
    pub receipt: String,
    pub notes: OrderNotes,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderNotes {
    pub order_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a remote order that the client will pay against.
    async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder, GatewayError>;
}
