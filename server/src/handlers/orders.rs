use axum::extract::{Path, State};
use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::handlers::auth::AuthUser;
use crate::models::{Order, OrderItem, Ticket};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub tickets: Vec<Ticket>,
}

/// Lets a buyer poll the outcome of their reservation.
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = state
        .store
        .find_order(order_id)
        .await?
        .filter(|order| order.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Order '{}' was not found", order_id)))?;

    let items = state.store.order_items(order.id).await?;
    let tickets = state.store.order_tickets(order.id).await?;

    Ok(success(
        OrderDetail {
            order,
            items,
            tickets,
        },
        "Order retrieved",
    ))
}
