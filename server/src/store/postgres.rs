use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{
    Attendee, Event, NewOrder, NewOrderItem, NewTicket, Order, OrderItem, Ticket, TicketCategory,
};
use crate::store::{InventoryStore, StoreError, StoreResult, Transition};

#[derive(Clone)]
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Returns the quantity held by `order_ids` to their categories and events.
///
/// Callers must already have moved those orders out of `pending` inside `tx`,
/// so each order is released at most once.
async fn release_capacity(
    tx: &mut Transaction<'_, Postgres>,
    order_ids: &[Uuid],
) -> StoreResult<()> {
    if order_ids.is_empty() {
        return Ok(());
    }

    let held: Vec<(Uuid, Uuid, i32)> = sqlx::query_as(
        r#"
        SELECT oi.ticket_category_id, o.event_id, SUM(oi.quantity)::INTEGER
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE oi.order_id = ANY($1)
        GROUP BY oi.ticket_category_id, o.event_id
        "#,
    )
    .bind(order_ids)
    .fetch_all(&mut **tx)
    .await?;

    let mut per_event: HashMap<Uuid, i32> = HashMap::new();
    for (category_id, event_id, quantity) in held {
        let released = sqlx::query(
            r#"
            UPDATE ticket_categories
            SET sold_count = sold_count - $2, updated_at = now()
            WHERE id = $1 AND sold_count >= $2
            "#,
        )
        .bind(category_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        if released.rows_affected() == 0 {
            tracing::warn!(
                category_id = %category_id,
                quantity,
                "sold_count lower than quantity being released; counter left unchanged"
            );
        }

        *per_event.entry(event_id).or_default() += quantity;
    }

    for (event_id, quantity) in per_event {
        let released = sqlx::query(
            r#"
            UPDATE events
            SET booked_count = booked_count - $2, updated_at = now()
            WHERE id = $1 AND booked_count >= $2
            "#,
        )
        .bind(event_id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        if released.rows_affected() == 0 {
            tracing::warn!(
                event_id = %event_id,
                quantity,
                "booked_count lower than quantity being released; counter left unchanged"
            );
        }
    }

    Ok(())
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn find_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn find_category(&self, category_id: Uuid) -> StoreResult<Option<TicketCategory>> {
        let category =
            sqlx::query_as::<_, TicketCategory>("SELECT * FROM ticket_categories WHERE id = $1")
                .bind(category_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(category)
    }

    async fn find_attendee(&self, user_id: Uuid) -> StoreResult<Option<Attendee>> {
        let attendee =
            sqlx::query_as::<_, Attendee>("SELECT name, email, phone FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(attendee)
    }

    async fn reserve(&self, order: NewOrder, item: NewOrderItem) -> StoreResult<Order> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, order_number, event_id, user_id, subtotal, platform_fee,
                total_amount, currency, payment_status, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9)
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.event_id)
        .bind(order.user_id)
        .bind(order.subtotal)
        .bind(order.platform_fee)
        .bind(order.total_amount)
        .bind(&order.currency)
        .bind(order.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, ticket_category_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id)
        .bind(created.id)
        .bind(item.ticket_category_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *tx)
        .await?;

        let reserved = sqlx::query(
            r#"
            UPDATE ticket_categories
            SET sold_count = sold_count + $2, updated_at = now()
            WHERE id = $1 AND event_id = $3 AND sold_count + $2 <= quantity
            "#,
        )
        .bind(item.ticket_category_id)
        .bind(item.quantity)
        .bind(order.event_id)
        .execute(&mut *tx)
        .await?;

        if reserved.rows_affected() == 0 {
            let available: Option<i32> = sqlx::query_scalar(
                "SELECT GREATEST(quantity - sold_count, 0) FROM ticket_categories WHERE id = $1",
            )
            .bind(item.ticket_category_id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.rollback().await?;
            return Err(StoreError::CapacityExhausted {
                available: available.unwrap_or(0),
            });
        }

        sqlx::query(
            r#"
            UPDATE events
            SET booked_count = booked_count + $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(order.event_id)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn attach_gateway_order(
        &self,
        order_id: Uuid,
        gateway_order_id: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE orders SET gateway_order_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(order_id)
        .bind(gateway_order_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn find_order_by_gateway_order(
        &self,
        gateway_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE gateway_order_id = $1")
            .bind(gateway_order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn order_tickets(&self, order_id: Uuid) -> StoreResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE order_id = $1 ORDER BY ticket_number",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn complete_order(
        &self,
        order_id: Uuid,
        gateway_payment_id: &str,
        paid_at: DateTime<Utc>,
        tickets: &[NewTicket],
    ) -> StoreResult<Transition> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET payment_status = 'completed', paid_at = $2, gateway_payment_id = $3,
                updated_at = now()
            WHERE id = $1 AND payment_status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(paid_at)
        .bind(gateway_payment_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(Transition::Skipped);
        }

        for ticket in tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets (
                    id, order_id, order_item_id, event_id, ticket_category_id, user_id,
                    ticket_number, redemption_code, attendee_name, attendee_email,
                    attendee_phone, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'valid')
                "#,
            )
            .bind(ticket.id)
            .bind(ticket.order_id)
            .bind(ticket.order_item_id)
            .bind(ticket.event_id)
            .bind(ticket.ticket_category_id)
            .bind(ticket.user_id)
            .bind(&ticket.ticket_number)
            .bind(&ticket.redemption_code)
            .bind(&ticket.attendee.name)
            .bind(&ticket.attendee.email)
            .bind(&ticket.attendee.phone)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Transition::Applied)
    }

    async fn fail_order(
        &self,
        order_id: Uuid,
        gateway_payment_id: Option<&str>,
    ) -> StoreResult<Transition> {
        let mut tx = self.pool.begin().await?;

        let failed: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET payment_status = 'failed',
                gateway_payment_id = COALESCE($2, gateway_payment_id),
                updated_at = now()
            WHERE id = $1 AND payment_status = 'pending'
            RETURNING id
            "#,
        )
        .bind(order_id)
        .bind(gateway_payment_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(failed) = failed else {
            tx.rollback().await?;
            return Ok(Transition::Skipped);
        };

        release_capacity(&mut tx, &[failed]).await?;
        tx.commit().await?;
        Ok(Transition::Applied)
    }

    async fn expire_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;

        // Rows locked by an in-flight settlement are skipped; the outer guard
        // re-checks `pending` after any lock wait.
        let expired: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET payment_status = 'expired', updated_at = now()
            WHERE payment_status = 'pending'
              AND id IN (
                SELECT id FROM orders
                WHERE payment_status = 'pending' AND expires_at < $1
                ORDER BY expires_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
              )
            RETURNING id
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        release_capacity(&mut tx, &expired).await?;
        tx.commit().await?;
        Ok(expired)
    }
}
