use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gateway::{CreateOrderRequest, GatewayError, GatewayOrder, OrderNotes, PaymentGateway};
use crate::models::{Event, NewOrder, NewOrderItem, Order, TicketCategory};
use crate::services::pricing::PriceBreakdown;
use crate::store::{InventoryStore, StoreError};
use crate::utils::error::{insufficient_availability, AppError};

const ORDER_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct ReservationSettings {
    /// How long capacity stays held while the buyer pays.
    pub hold_duration: chrono::Duration,
    pub currency: String,
    pub gateway_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub event_id: Uuid,
    pub ticket_category_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCheckout {
    pub order_id: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationReceipt {
    pub order_id: Uuid,
    pub order_number: String,
    pub pricing: PriceBreakdown,
    pub gateway: GatewayCheckout,
    pub expires_at: DateTime<Utc>,
}

pub struct ReservationService {
    store: Arc<dyn InventoryStore>,
    gateway: Arc<dyn PaymentGateway>,
    settings: ReservationSettings,
}

impl ReservationService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        gateway: Arc<dyn PaymentGateway>,
        settings: ReservationSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    pub async fn reserve(
        &self,
        user_id: Uuid,
        request: ReservationRequest,
    ) -> Result<ReservationReceipt, AppError> {
        self.reserve_at(user_id, request, Utc::now()).await
    }

    /// Holds `request.quantity` tickets for `user_id` and opens the matching
    /// gateway order. Nothing is written unless every precondition holds.
    pub async fn reserve_at(
        &self,
        user_id: Uuid,
        request: ReservationRequest,
        now: DateTime<Utc>,
    ) -> Result<ReservationReceipt, AppError> {
        let event = self
            .store
            .find_event(request.event_id)
            .await?
            .filter(Event::is_bookable)
            .ok_or_else(|| AppError::NotFound("Event is not available for booking".to_string()))?;

        let category = self
            .store
            .find_category(request.ticket_category_id)
            .await?
            .filter(|c| c.event_id == event.id && c.is_active)
            .ok_or_else(|| AppError::NotFound("Ticket category not found".to_string()))?;

        check_order_limits(&category, request.quantity)?;
        check_sale_window(&category, now)?;
        if request.quantity > category.available() {
            return Err(AppError::Conflict(insufficient_availability(
                category.available(),
            )));
        }

        let pricing = PriceBreakdown::compute(category.price, request.quantity, &event.fee_policy());
        let amount = pricing.gateway_amount()?;
        let expires_at = now + self.settings.hold_duration;

        let order = self
            .hold_capacity(user_id, &event, &category, &pricing, expires_at, now)
            .await?;

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            event_id = %event.id,
            ticket_category_id = %category.id,
            quantity = request.quantity,
            "Tickets reserved"
        );

        // No transaction may span the gateway call.
        let gateway_order = self
            .open_gateway_order(CreateOrderRequest {
                amount,
                currency: self.settings.currency.clone(),
                receipt: order.order_number.clone(),
                notes: OrderNotes {
                    order_id: order.id.to_string(),
                },
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    order_id = %order.id,
                    error = %e,
                    "Could not open gateway order; hold will lapse at expiry"
                );
                AppError::ExternalServiceError(
                    "Payment provider is unavailable, please try again shortly".to_string(),
                )
            })?;

        self.store
            .attach_gateway_order(order.id, &gateway_order.id)
            .await?;

        Ok(ReservationReceipt {
            order_id: order.id,
            order_number: order.order_number,
            pricing,
            gateway: GatewayCheckout {
                order_id: gateway_order.id,
                amount: gateway_order.amount,
                currency: gateway_order.currency,
            },
            expires_at: order.expires_at,
        })
    }

    async fn hold_capacity(
        &self,
        user_id: Uuid,
        event: &Event,
        category: &TicketCategory,
        pricing: &PriceBreakdown,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Order, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let order = NewOrder {
                id: Uuid::new_v4(),
                order_number: order_number(now),
                event_id: event.id,
                user_id,
                subtotal: pricing.subtotal,
                platform_fee: pricing.platform_fee,
                total_amount: pricing.total_amount,
                currency: self.settings.currency.clone(),
                expires_at,
            };
            let item = NewOrderItem {
                id: Uuid::new_v4(),
                ticket_category_id: category.id,
                quantity: pricing.quantity,
                unit_price: pricing.unit_price,
            };

            match self.store.reserve(order, item).await {
                Ok(order) => return Ok(order),
                Err(e)
                    if e.is_unique_violation_on("orders_order_number")
                        && attempt < ORDER_NUMBER_ATTEMPTS =>
                {
                    tracing::warn!(attempt, "Order number collision, retrying");
                }
                Err(StoreError::CapacityExhausted { available }) => {
                    tracing::info!(
                        ticket_category_id = %category.id,
                        requested = pricing.quantity,
                        available,
                        "Reservation lost capacity race"
                    );
                    return Err(AppError::Conflict(insufficient_availability(available)));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn open_gateway_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<GatewayOrder, GatewayError> {
        let timeout = self.settings.gateway_timeout;
        tokio::time::timeout(timeout, self.gateway.create_order(request))
            .await
            .map_err(|_| GatewayError::Timeout(timeout))?
    }
}

fn check_order_limits(category: &TicketCategory, quantity: i32) -> Result<(), AppError> {
    if quantity < category.min_per_order || quantity > category.max_per_order {
        return Err(AppError::ValidationError(format!(
            "Quantity must be between {} and {} for this category",
            category.min_per_order, category.max_per_order
        )));
    }
    Ok(())
}

fn check_sale_window(category: &TicketCategory, now: DateTime<Utc>) -> Result<(), AppError> {
    if category.sale_start_date.is_some_and(|start| now < start) {
        return Err(AppError::ValidationError(
            "Ticket sales have not started yet".to_string(),
        ));
    }
    if category.sale_end_date.is_some_and(|end| now > end) {
        return Err(AppError::ValidationError(
            "Ticket sales have ended".to_string(),
        ));
    }
    Ok(())
}

/// `ORD-YYYYMMDD-XXXXXXXX` with a random uppercase hex suffix.
fn order_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("ORD-{}-{:08X}", now.format("%Y%m%d"), suffix)
}
