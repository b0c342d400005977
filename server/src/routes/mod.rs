use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, Config, SecurityHeaders};
use crate::handlers::{
    create_reservation, expire_orders, get_order, health_check, payment_webhook,
};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/reservations", post(create_reservation))
        .route("/orders/:order_id", get(get_order))
        .route("/webhooks/payments", post(payment_webhook))
        .route("/internal/orders/expire", post(expire_orders))
        .with_state(state);

    SecurityHeaders::new(config.production)
        .apply(router)
        .layer(create_cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}
