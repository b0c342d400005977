use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::user::Attendee;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TicketCategory {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub price: Decimal,
    /// Total capacity of the category.
    pub quantity: i32,
    pub sold_count: i32,
    pub sale_start_date: Option<DateTime<Utc>>,
    pub sale_end_date: Option<DateTime<Utc>>,
    pub min_per_order: i32,
    pub max_per_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketCategory {
    pub fn available(&self) -> i32 {
        (self.quantity - self.sold_count).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Valid,
    Used,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Uuid,
    pub event_id: Uuid,
    pub ticket_category_id: Uuid,
    pub user_id: Uuid,
    pub ticket_number: String,
    pub redemption_code: String,
    pub attendee_name: String,
    pub attendee_email: String,
    pub attendee_phone: Option<String>,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A ticket row ready to be inserted once its order is confirmed.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_item_id: Uuid,
    pub event_id: Uuid,
    pub ticket_category_id: Uuid,
    pub user_id: Uuid,
    pub ticket_number: String,
    pub redemption_code: String,
    pub attendee: Attendee,
}
