use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use ticketbook_server::config::Config;
use ticketbook_server::gateway::{HttpPaymentGateway, MockPaymentGateway, PaymentGateway};
use ticketbook_server::routes::create_routes;
use ticketbook_server::state::AppState;
use ticketbook_server::store::PgInventoryStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ticketbook_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let gateway: Arc<dyn PaymentGateway> = match &config.gateway_credentials {
        Some(credentials) => Arc::new(
            HttpPaymentGateway::new(
                &config.gateway_url,
                &credentials.key_id,
                &credentials.key_secret,
                config.gateway_timeout,
            )
            .expect("Failed to build payment gateway client"),
        ),
        None => {
            tracing::warn!("Payment gateway credentials not set, using mock gateway");
            MockPaymentGateway::shared()
        }
    };

    if config.webhook_secret.is_none() {
        tracing::warn!("PAYMENT_WEBHOOK_SECRET not set, payment webhooks will be rejected");
    }

    let store = Arc::new(PgInventoryStore::new(pool));
    let state = AppState::new(store, gateway, &config);

    if let Some(every) = config.sweep_interval {
        tracing::info!(interval_secs = every.as_secs(), "Starting in-process expiry sweeper");
        state.sweeper.clone().spawn_ticker(every);
    }

    let app = create_routes(state, &config);

    tracing::info!("🚀 Server running at http://{}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
