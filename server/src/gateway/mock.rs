use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::gateway::{CreateOrderRequest, GatewayError, GatewayOrder, PaymentGateway};

/// In-process gateway for development and tests.
///
/// Opens an order with a random `order_` id for every request, or rejects
/// everything once [`MockPaymentGateway::set_failing`] is switched on.
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                body: "mock gateway unavailable".to_string(),
            });
        }

        let order = GatewayOrder {
            id: format!("order_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            currency: request.currency,
        };
        tracing::info!(
            gateway_order_id = %order.id,
            amount = order.amount,
            receipt = %request.receipt,
            "Mock gateway order created"
        );
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::OrderNotes;

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            amount: 10500,
            currency: "INR".to_string(),
            receipt: "ORD-20250101-ABCDEF01".to_string(),
            notes: OrderNotes {
                order_id: Uuid::new_v4().to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_mock_gateway_echoes_amount() {
        let gateway = MockPaymentGateway::new();
        let order = gateway.create_order(request()).await.unwrap();
        assert!(order.id.starts_with("order_"));
        assert_eq!(order.amount, 10500);
        assert_eq!(order.currency, "INR");
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_gateway_failure_mode() {
        let gateway = MockPaymentGateway::new();
        gateway.set_failing(true);
        let result = gateway.create_order(request()).await;
        assert!(matches!(result, Err(GatewayError::Rejected { status: 503, .. })));
    }
}
