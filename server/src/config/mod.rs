use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::SecurityHeaders;

use crate::services::sweeper::DEFAULT_BATCH_SIZE;
use crate::services::ReservationSettings;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/ticketbook";
const DEFAULT_HOLD_SECS: i64 = 15 * 60;
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_GATEWAY_URL: &str = "https://api.razorpay.com/v1";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct GatewayCredentials {
    pub key_id: String,
    pub key_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub reservation_hold_secs: i64,
    pub currency: String,
    pub gateway_url: String,
    /// `None` runs against the in-process mock gateway.
    pub gateway_credentials: Option<GatewayCredentials>,
    pub gateway_timeout: Duration,
    pub webhook_secret: Option<String>,
    /// In-process sweep cadence; `None` leaves sweeping to an external scheduler.
    pub sweep_interval: Option<Duration>,
    pub sweep_batch_size: i64,
    pub cors_allowed_origins: String,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let gateway_credentials = match (
            text("PAYMENT_GATEWAY_KEY_ID"),
            text("PAYMENT_GATEWAY_KEY_SECRET"),
        ) {
            (Some(key_id), Some(key_secret)) => Some(GatewayCredentials { key_id, key_secret }),
            _ => None,
        };

        Self {
            database_url: text("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5),
            bind_addr: parse_or(&lookup, "BIND_ADDR", default_bind_addr()),
            reservation_hold_secs: parse_or(&lookup, "RESERVATION_HOLD_SECS", DEFAULT_HOLD_SECS)
                .max(1),
            currency: text("PAYMENT_CURRENCY")
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            gateway_url: text("PAYMENT_GATEWAY_URL")
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            gateway_credentials,
            gateway_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PAYMENT_GATEWAY_TIMEOUT_SECS",
                DEFAULT_GATEWAY_TIMEOUT_SECS,
            )),
            webhook_secret: text("PAYMENT_WEBHOOK_SECRET"),
            sweep_interval: text("EXPIRY_SWEEP_INTERVAL_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            sweep_batch_size: parse_or(&lookup, "EXPIRY_SWEEP_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            cors_allowed_origins: text("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
            production: text("RUST_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production")),
        }
    }

    pub fn reservation_settings(&self) -> ReservationSettings {
        ReservationSettings {
            hold_duration: chrono::Duration::seconds(self.reservation_hold_secs),
            currency: self.currency.clone(),
            gateway_timeout: self.gateway_timeout,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3001))
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Config: invalid value '{}' for {}, using default", raw, key);
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3001");
        assert_eq!(config.reservation_hold_secs, 900);
        assert_eq!(config.currency, "INR");
        assert!(config.gateway_credentials.is_none());
        assert!(config.webhook_secret.is_none());
        assert!(config.sweep_interval.is_none());
        assert_eq!(config.sweep_batch_size, DEFAULT_BATCH_SIZE);
        assert!(!config.production);
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("RESERVATION_HOLD_SECS", "600"),
            ("PAYMENT_CURRENCY", "usd"),
            ("PAYMENT_GATEWAY_KEY_ID", "rzp_test"),
            ("PAYMENT_GATEWAY_KEY_SECRET", "secret"),
            ("PAYMENT_WEBHOOK_SECRET", "whsec"),
            ("EXPIRY_SWEEP_INTERVAL_SECS", "60"),
            ("RUST_ENV", "Production"),
        ]);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.reservation_settings().hold_duration, chrono::Duration::minutes(10));
        assert_eq!(config.currency, "USD");
        assert_eq!(config.gateway_credentials.unwrap().key_id, "rzp_test");
        assert_eq!(config.webhook_secret.as_deref(), Some("whsec"));
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(60)));
        assert!(config.production);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_with(&[
            ("DATABASE_MAX_CONNECTIONS", "many"),
            ("EXPIRY_SWEEP_INTERVAL_SECS", "0"),
            ("PAYMENT_GATEWAY_KEY_ID", "rzp_test"),
        ]);
        assert_eq!(config.database_max_connections, 5);
        assert!(config.sweep_interval.is_none());
        // A key id without its secret is not usable.
        assert!(config.gateway_credentials.is_none());
    }
}
