use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Attendee, NewTicket, Order, OrderItem};

/// Length of the redemption token shown on a ticket.
const REDEMPTION_CODE_LEN: usize = 16;
const SALT_LEN: usize = 16;

/// Builds ticket rows for a paid order.
///
/// Uniqueness of ticket numbers and redemption codes is enforced by the
/// store; callers regenerate and retry when an insert reports a collision.
#[derive(Debug, Clone, Default)]
pub struct TicketIssuer;

impl TicketIssuer {
    pub fn new() -> Self {
        Self
    }

    /// One ticket per unit of quantity across all items of `order`.
    pub fn issue(
        &self,
        order: &Order,
        items: &[OrderItem],
        attendee: &Attendee,
        issued_at: DateTime<Utc>,
    ) -> Vec<NewTicket> {
        let mut sequence: u32 = 0;
        let mut tickets = Vec::new();

        for item in items {
            for _ in 0..item.quantity.max(0) {
                sequence += 1;
                tickets.push(NewTicket {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    order_item_id: item.id,
                    event_id: order.event_id,
                    ticket_category_id: item.ticket_category_id,
                    user_id: order.user_id,
                    ticket_number: ticket_number(order.id, issued_at, sequence),
                    redemption_code: redemption_code(
                        order.id,
                        order.event_id,
                        item.ticket_category_id,
                        sequence,
                    ),
                    attendee: attendee.clone(),
                });
            }
        }

        tickets
    }
}

/// `TKT-<order prefix>-<issue time>-<seq>`, e.g. `TKT-3F2A9C1B-18F2C4D5E6A70-001`.
fn ticket_number(order_id: Uuid, issued_at: DateTime<Utc>, sequence: u32) -> String {
    let simple = order_id.simple().to_string().to_uppercase();
    format!(
        "TKT-{}-{:X}-{:03}",
        &simple[..8],
        issued_at.timestamp_micros(),
        sequence
    )
}

/// SHA-256 over the ticket's fixed keys plus a random salt, as an uppercase hex token.
fn redemption_code(order_id: Uuid, event_id: Uuid, category_id: Uuid, unit: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(order_id.as_bytes());
    hasher.update(event_id.as_bytes());
    hasher.update(category_id.as_bytes());
    hasher.update(unit.to_be_bytes());
    hasher.update(salt);

    let digest = hex::encode_upper(hasher.finalize());
    digest[..REDEMPTION_CODE_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentStatus;
    use rust_decimal::Decimal;
    use std::collections::HashSet;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: "ORD-20250101-0000000A".to_string(),
            event_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subtotal: Decimal::new(30000, 2),
            platform_fee: Decimal::ZERO,
            total_amount: Decimal::new(30000, 2),
            currency: "INR".to_string(),
            gateway_order_id: Some("order_test".to_string()),
            gateway_payment_id: None,
            payment_status: PaymentStatus::Pending,
            expires_at: now,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(order_id: Uuid, quantity: i32) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id,
            ticket_category_id: Uuid::new_v4(),
            quantity,
            unit_price: Decimal::new(10000, 2),
            created_at: Utc::now(),
        }
    }

    fn attendee() -> Attendee {
        Attendee {
            name: "Asha Verma".to_string(),
            email: "asha@example.edu".to_string(),
            phone: Some("+91 90000 00000".to_string()),
        }
    }

    #[test]
    fn test_one_ticket_per_unit_across_items() {
        let order = order();
        let items = vec![item(order.id, 2), item(order.id, 3)];
        let tickets = TicketIssuer::new().issue(&order, &items, &attendee(), Utc::now());

        assert_eq!(tickets.len(), 5);
        assert_eq!(
            tickets
                .iter()
                .filter(|t| t.order_item_id == items[1].id)
                .count(),
            3
        );
        assert!(tickets.iter().all(|t| t.attendee == attendee()));
        assert!(tickets.iter().all(|t| t.user_id == order.user_id));
    }

    #[test]
    fn test_identifiers_are_distinct_and_well_formed() {
        let order = order();
        let items = vec![item(order.id, 4)];
        let tickets = TicketIssuer::new().issue(&order, &items, &attendee(), Utc::now());

        let numbers: HashSet<_> = tickets.iter().map(|t| t.ticket_number.clone()).collect();
        let codes: HashSet<_> = tickets.iter().map(|t| t.redemption_code.clone()).collect();
        assert_eq!(numbers.len(), 4);
        assert_eq!(codes.len(), 4);

        let prefix = order.id.simple().to_string().to_uppercase();
        for ticket in &tickets {
            assert!(ticket.ticket_number.starts_with(&format!("TKT-{}-", &prefix[..8])));
            assert_eq!(ticket.redemption_code.len(), REDEMPTION_CODE_LEN);
            assert!(ticket
                .redemption_code
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_reissue_produces_fresh_codes() {
        let order = order();
        let items = vec![item(order.id, 1)];
        let issuer = TicketIssuer::new();
        let first = issuer.issue(&order, &items, &attendee(), Utc::now());
        let second = issuer.issue(&order, &items, &attendee(), Utc::now());
        assert_ne!(first[0].redemption_code, second[0].redemption_code);
    }
}
