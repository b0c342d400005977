//! Payment outcome notifications delivered by the gateway.
//!
//! ```json
//! {"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_x","order_id":"order_y"}}}}
//! ```

use serde::Deserialize;

pub const PAYMENT_CAPTURED: &str = "payment.captured";
pub const PAYMENT_FAILED: &str = "payment.failed";

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct Payload {
    payment: Option<Wrapped<PaymentEntity>>,
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentNotification {
    Captured {
        gateway_order_id: String,
        payment_id: String,
    },
    Failed {
        gateway_order_id: String,
        payment_id: String,
        reason: Option<String>,
    },
    /// Any other event type; acknowledged without effect.
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookParseError {
    #[error("malformed webhook body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{0} notification has no payment entity")]
    MissingPayment(String),

    #[error("{0} notification has no order reference")]
    MissingOrder(String),
}

impl PaymentNotification {
    pub fn parse(body: &[u8]) -> Result<Self, WebhookParseError> {
        let envelope: Envelope = serde_json::from_slice(body)?;

        let kind = envelope.event;
        if kind != PAYMENT_CAPTURED && kind != PAYMENT_FAILED {
            return Ok(PaymentNotification::Other(kind));
        }

        let payment = envelope
            .payload
            .payment
            .ok_or_else(|| WebhookParseError::MissingPayment(kind.clone()))?
            .entity;
        let gateway_order_id = payment
            .order_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| WebhookParseError::MissingOrder(kind.clone()))?;

        Ok(if kind == PAYMENT_CAPTURED {
            PaymentNotification::Captured {
                gateway_order_id,
                payment_id: payment.id,
            }
        } else {
            PaymentNotification::Failed {
                gateway_order_id,
                payment_id: payment.id,
                reason: payment.error_description,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_captured_payment() {
        let body = br#"{
            "entity": "event",
            "event": "payment.captured",
            "payload": {"payment": {"entity": {"id": "pay_1", "order_id": "order_9", "amount": 10500}}}
        }"#;
        assert_eq!(
            PaymentNotification::parse(body).unwrap(),
            PaymentNotification::Captured {
                gateway_order_id: "order_9".to_string(),
                payment_id: "pay_1".to_string(),
            }
        );
    }

    #[test]
    fn test_parses_failed_payment_with_reason() {
        let body = br#"{"event":"payment.failed","payload":{"payment":{"entity":{"id":"pay_2","order_id":"order_3","error_description":"Card declined"}}}}"#;
        assert_eq!(
            PaymentNotification::parse(body).unwrap(),
            PaymentNotification::Failed {
                gateway_order_id: "order_3".to_string(),
                payment_id: "pay_2".to_string(),
                reason: Some("Card declined".to_string()),
            }
        );
    }

    #[test]
    fn test_other_events_need_no_payload() {
        let body = br#"{"event":"order.paid"}"#;
        assert_eq!(
            PaymentNotification::parse(body).unwrap(),
            PaymentNotification::Other("order.paid".to_string())
        );
    }

    #[test]
    fn test_rejects_payment_without_order() {
        let body = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_1"}}}}"#;
        assert!(matches!(
            PaymentNotification::parse(body),
            Err(WebhookParseError::MissingOrder(_))
        ));
        assert!(matches!(
            PaymentNotification::parse(b"not json"),
            Err(WebhookParseError::Malformed(_))
        ));
    }
}
