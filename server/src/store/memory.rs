//! Process-local [`InventoryStore`] used by tests and database-less local runs.
//!
//! A single mutex serializes every primitive, which gives each call the same
//! all-or-nothing behaviour the Postgres store gets from its transactions.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    Attendee, Event, NewOrder, NewOrderItem, NewTicket, Order, OrderItem, PaymentStatus, Ticket,
    TicketCategory, TicketStatus,
};
use crate::store::{InventoryStore, StoreError, StoreResult, Transition};

#[derive(Default)]
struct State {
    events: HashMap<Uuid, Event>,
    categories: HashMap<Uuid, TicketCategory>,
    users: HashMap<Uuid, Attendee>,
    orders: HashMap<Uuid, Order>,
    items: Vec<OrderItem>,
    tickets: Vec<Ticket>,
}

impl State {
    fn unique_violation(constraint: &str) -> StoreError {
        StoreError::UniqueViolation {
            constraint: Some(constraint.to_string()),
        }
    }

    fn release(&mut self, order_ids: &[Uuid]) {
        let mut per_category: HashMap<Uuid, i32> = HashMap::new();
        let mut per_event: HashMap<Uuid, i32> = HashMap::new();

        for item in self.items.iter().filter(|i| order_ids.contains(&i.order_id)) {
            *per_category.entry(item.ticket_category_id).or_default() += item.quantity;
            if let Some(order) = self.orders.get(&item.order_id) {
                *per_event.entry(order.event_id).or_default() += item.quantity;
            }
        }

        let now = Utc::now();
        for (category_id, quantity) in per_category {
            match self.categories.get_mut(&category_id) {
                Some(category) if category.sold_count >= quantity => {
                    category.sold_count -= quantity;
                    category.updated_at = now;
                }
                _ => tracing::warn!(
                    category_id = %category_id,
                    quantity,
                    "sold_count lower than quantity being released; counter left unchanged"
                ),
            }
        }

        for (event_id, quantity) in per_event {
            match self.events.get_mut(&event_id) {
                Some(event) if event.booked_count >= quantity => {
                    event.booked_count -= quantity;
                    event.updated_at = now;
                }
                _ => tracing::warn!(
                    event_id = %event_id,
                    quantity,
                    "booked_count lower than quantity being released; counter left unchanged"
                ),
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryInventoryStore {
    state: Mutex<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_event(&self, event: Event) {
        self.state.lock().await.events.insert(event.id, event);
    }

    pub async fn insert_category(&self, category: TicketCategory) {
        self.state
            .lock()
            .await
            .categories
            .insert(category.id, category);
    }

    pub async fn insert_user(&self, user_id: Uuid, attendee: Attendee) {
        self.state.lock().await.users.insert(user_id, attendee);
    }

    /// Overwrites an order's hold deadline.
    pub async fn set_expires_at(&self, order_id: Uuid, expires_at: DateTime<Utc>) {
        if let Some(order) = self.state.lock().await.orders.get_mut(&order_id) {
            order.expires_at = expires_at;
        }
    }

    pub async fn ticket_count(&self) -> usize {
        self.state.lock().await.tickets.len()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.state.lock().await.events.get(&event_id).cloned())
    }

    async fn find_category(&self, category_id: Uuid) -> StoreResult<Option<TicketCategory>> {
        Ok(self.state.lock().await.categories.get(&category_id).cloned())
    }

    async fn find_attendee(&self, user_id: Uuid) -> StoreResult<Option<Attendee>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn reserve(&self, order: NewOrder, item: NewOrderItem) -> StoreResult<Order> {
        let mut state = self.state.lock().await;

        if state
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(State::unique_violation("orders_order_number_key"));
        }

        let category = state
            .categories
            .get(&item.ticket_category_id)
            .filter(|c| c.event_id == order.event_id)
            .ok_or(StoreError::CapacityExhausted { available: 0 })?;
        if category.sold_count + item.quantity > category.quantity {
            return Err(StoreError::CapacityExhausted {
                available: category.available(),
            });
        }

        let now = Utc::now();
        if let Some(category) = state.categories.get_mut(&item.ticket_category_id) {
            category.sold_count += item.quantity;
            category.updated_at = now;
        }
        if let Some(event) = state.events.get_mut(&order.event_id) {
            event.booked_count += item.quantity;
            event.updated_at = now;
        }

        let created = Order {
            id: order.id,
            order_number: order.order_number,
            event_id: order.event_id,
            user_id: order.user_id,
            subtotal: order.subtotal,
            platform_fee: order.platform_fee,
            total_amount: order.total_amount,
            currency: order.currency,
            gateway_order_id: None,
            gateway_payment_id: None,
            payment_status: PaymentStatus::Pending,
            expires_at: order.expires_at,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        state.items.push(OrderItem {
            id: item.id,
            order_id: created.id,
            ticket_category_id: item.ticket_category_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            created_at: now,
        });
        state.orders.insert(created.id, created.clone());

        Ok(created)
    }

    async fn attach_gateway_order(
        &self,
        order_id: Uuid,
        gateway_order_id: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state
            .orders
            .values()
            .any(|o| o.id != order_id && o.gateway_order_id.as_deref() == Some(gateway_order_id))
        {
            return Err(State::unique_violation("orders_gateway_order_id_key"));
        }
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.gateway_order_id = Some(gateway_order_id.to_string());
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn find_order_by_gateway_order(
        &self,
        gateway_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .values()
            .find(|o| o.gateway_order_id.as_deref() == Some(gateway_order_id))
            .cloned())
    }

    async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
        Ok(self
            .state
            .lock()
            .await
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn order_tickets(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .state
            .lock()
            .await
            .tickets
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| a.ticket_number.cmp(&b.ticket_number));
        Ok(tickets)
    }

    async fn complete_order(
        &self,
        order_id: Uuid,
        gateway_payment_id: &str,
        paid_at: DateTime<Utc>,
        tickets: &[NewTicket],
    ) -> StoreResult<Transition> {
        let mut state = self.state.lock().await;

        match state.orders.get(&order_id) {
            Some(order) if order.payment_status == PaymentStatus::Pending => {}
            _ => return Ok(Transition::Skipped),
        }

        let mut numbers: HashSet<&str> = state
            .tickets
            .iter()
            .map(|t| t.ticket_number.as_str())
            .collect();
        let mut codes: HashSet<&str> = state
            .tickets
            .iter()
            .map(|t| t.redemption_code.as_str())
            .collect();
        for ticket in tickets {
            if !numbers.insert(&ticket.ticket_number) {
                return Err(State::unique_violation("tickets_ticket_number_key"));
            }
            if !codes.insert(&ticket.redemption_code) {
                return Err(State::unique_violation("tickets_redemption_code_key"));
            }
        }

        let now = Utc::now();
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.payment_status = PaymentStatus::Completed;
            order.paid_at = Some(paid_at);
            order.gateway_payment_id = Some(gateway_payment_id.to_string());
            order.updated_at = now;
        }
        state.tickets.extend(tickets.iter().map(|t| Ticket {
            id: t.id,
            order_id: t.order_id,
            order_item_id: t.order_item_id,
            event_id: t.event_id,
            ticket_category_id: t.ticket_category_id,
            user_id: t.user_id,
            ticket_number: t.ticket_number.clone(),
            redemption_code: t.redemption_code.clone(),
            attendee_name: t.attendee.name.clone(),
            attendee_email: t.attendee.email.clone(),
            attendee_phone: t.attendee.phone.clone(),
            status: TicketStatus::Valid,
            created_at: now,
            updated_at: now,
        }));

        Ok(Transition::Applied)
    }

    async fn fail_order(
        &self,
        order_id: Uuid,
        gateway_payment_id: Option<&str>,
    ) -> StoreResult<Transition> {
        let mut state = self.state.lock().await;

        match state.orders.get_mut(&order_id) {
            Some(order) if order.payment_status == PaymentStatus::Pending => {
                order.payment_status = PaymentStatus::Failed;
                if let Some(payment_id) = gateway_payment_id {
                    order.gateway_payment_id = Some(payment_id.to_string());
                }
                order.updated_at = Utc::now();
            }
            _ => return Ok(Transition::Skipped),
        }

        state.release(&[order_id]);
        Ok(Transition::Applied)
    }

    async fn expire_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Uuid>> {
        let mut state = self.state.lock().await;

        let mut due: Vec<(DateTime<Utc>, Uuid)> = state
            .orders
            .values()
            .filter(|o| o.payment_status == PaymentStatus::Pending && o.expires_at < now)
            .map(|o| (o.expires_at, o.id))
            .collect();
        due.sort();
        due.truncate(usize::try_from(limit).unwrap_or(0));

        let expired: Vec<Uuid> = due.into_iter().map(|(_, id)| id).collect();
        for id in &expired {
            if let Some(order) = state.orders.get_mut(id) {
                order.payment_status = PaymentStatus::Expired;
                order.updated_at = Utc::now();
            }
        }

        state.release(&expired);
        Ok(expired)
    }
}
