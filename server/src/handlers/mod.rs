use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod auth;
pub mod orders;
pub mod reservations;
pub mod sweep;
pub mod webhooks;

pub use orders::get_order;
pub use reservations::create_reservation;
pub use sweep::expire_orders;
pub use webhooks::payment_webhook;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "ticketbook-api",
    };

    success(payload, "Health check successful")
}
