//! Fixtures shared by the in-memory integration tests.

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use ticketbook_server::config::Config;
use ticketbook_server::gateway::signature;
use ticketbook_server::gateway::MockPaymentGateway;
use ticketbook_server::models::{
    Attendee, Event, EventStatus, PlatformFeeType, TicketCategory,
};
use ticketbook_server::services::ReservationRequest;
use ticketbook_server::state::AppState;
use ticketbook_server::store::{InMemoryInventoryStore, InventoryStore};
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

pub struct Harness {
    pub store: Arc<InMemoryInventoryStore>,
    pub gateway: Arc<MockPaymentGateway>,
    pub state: AppState,
    pub config: Config,
    pub event_id: Uuid,
    pub category_id: Uuid,
    pub user_id: Uuid,
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "PAYMENT_WEBHOOK_SECRET" => Some(WEBHOOK_SECRET.to_string()),
        "CORS_ALLOWED_ORIGINS" => Some("http://localhost:5173".to_string()),
        _ => None,
    })
}

pub fn event(fee_percentage: &str) -> Event {
    let now = Utc::now();
    Event {
        id: Uuid::new_v4(),
        title: "Campus Hack Night".to_string(),
        status: EventStatus::Published,
        is_active: true,
        platform_fee_type: PlatformFeeType::Percentage,
        platform_fee_percentage: dec(fee_percentage),
        platform_fee_fixed: Decimal::ZERO,
        booked_count: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn category(event_id: Uuid, price: &str, quantity: i32, max_per_order: i32) -> TicketCategory {
    let now = Utc::now();
    TicketCategory {
        id: Uuid::new_v4(),
        event_id,
        name: "General Admission".to_string(),
        price: dec(price),
        quantity,
        sold_count: 0,
        sale_start_date: None,
        sale_end_date: None,
        min_per_order: 1,
        max_per_order,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn attendee() -> Attendee {
    Attendee {
        name: "Priya Nair".to_string(),
        email: "priya@example.edu".to_string(),
        phone: Some("+91 98765 43210".to_string()),
    }
}

/// A published event with one category at 100.00 and a 5% platform fee.
pub async fn harness(quantity: i32, max_per_order: i32) -> Harness {
    let store = Arc::new(InMemoryInventoryStore::new());
    let gateway = Arc::new(MockPaymentGateway::new());
    let config = test_config();

    let event = event("5");
    let category = category(event.id, "100.00", quantity, max_per_order);
    let user_id = Uuid::new_v4();
    let (event_id, category_id) = (event.id, category.id);

    store.insert_event(event).await;
    store.insert_category(category).await;
    store.insert_user(user_id, attendee()).await;

    let state = AppState::new(store.clone(), gateway.clone(), &config);

    Harness {
        store,
        gateway,
        state,
        config,
        event_id,
        category_id,
        user_id,
    }
}

impl Harness {
    pub fn request(&self, quantity: i32) -> ReservationRequest {
        ReservationRequest {
            event_id: self.event_id,
            ticket_category_id: self.category_id,
            quantity,
        }
    }

    pub async fn sold_count(&self) -> i32 {
        self.store
            .find_category(self.category_id)
            .await
            .unwrap()
            .unwrap()
            .sold_count
    }

    pub async fn booked_count(&self) -> i32 {
        self.store
            .find_event(self.event_id)
            .await
            .unwrap()
            .unwrap()
            .booked_count
    }
}

pub fn payment_body(event: &str, gateway_order_id: &str, payment_id: &str) -> Vec<u8> {
    let captured = event == "payment.captured";
    let status = if captured { "captured" } else { "failed" };
    let error_description = (!captured).then_some("Payment declined");
    serde_json::json!({
        "entity": "event",
        "event": event,
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": gateway_order_id,
                    "status": status,
                    "error_description": error_description,
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

pub fn sign(body: &[u8]) -> String {
    signature::sign(WEBHOOK_SECRET, body)
}
