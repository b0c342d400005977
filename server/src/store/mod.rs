//! Durable inventory of events, ticket categories, orders and tickets.
//!
//! Every mutation of `sold_count`, `booked_count` or `payment_status` goes
//! through one of the primitives on [`InventoryStore`]. Implementations must
//! apply each primitive as a single atomic unit and guard counter and status
//! changes in the same statement that performs them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Attendee, Event, NewOrder, NewOrderItem, NewTicket, Order, OrderItem, Ticket, TicketCategory,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryInventoryStore;
pub use postgres::PgInventoryStore;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    /// The category could not absorb the requested quantity at commit time.
    #[error("insufficient capacity ({available} available)")]
    CapacityExhausted { available: i32 },

    #[error("unique constraint violated: {constraint:?}")]
    UniqueViolation { constraint: Option<String> },

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation_on(&self, prefix: &str) -> bool {
        matches!(
            self,
            StoreError::UniqueViolation { constraint: Some(name) } if name.starts_with(prefix)
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return StoreError::UniqueViolation {
                    constraint: db_err.constraint().map(str::to_owned),
                };
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a guarded status transition out of `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The order had already left `pending`; nothing was written.
    Skipped,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>>;

    async fn find_category(&self, category_id: Uuid) -> StoreResult<Option<TicketCategory>>;

    async fn find_attendee(&self, user_id: Uuid) -> StoreResult<Option<Attendee>>;

    /// Inserts the pending order and its item and takes `item.quantity` from the
    /// category and event counters, all or nothing.
    ///
    /// Fails with [`StoreError::CapacityExhausted`] when the category no longer has
    /// room for the item at commit time.
    async fn reserve(&self, order: NewOrder, item: NewOrderItem) -> StoreResult<Order>;

    async fn attach_gateway_order(&self, order_id: Uuid, gateway_order_id: &str)
        -> StoreResult<()>;

    async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;

    async fn find_order_by_gateway_order(&self, gateway_order_id: &str)
        -> StoreResult<Option<Order>>;

    async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>>;

    async fn order_tickets(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>>;

    /// Moves a pending order to `completed` and inserts its tickets in the same unit.
    async fn complete_order(
        &self,
        order_id: Uuid,
        gateway_payment_id: &str,
        paid_at: DateTime<Utc>,
        tickets: &[NewTicket],
    ) -> StoreResult<Transition>;

    /// Moves a pending order to `failed` and gives its reserved quantity back.
    async fn fail_order(&self, order_id: Uuid, gateway_payment_id: Option<&str>)
        -> StoreResult<Transition>;

    /// Expires up to `limit` pending orders whose hold ended before `now`,
    /// releasing their capacity. Returns the ids that were transitioned.
    async fn expire_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Uuid>>;
}
