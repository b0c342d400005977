use std::sync::Arc;

use crate::config::Config;
use crate::gateway::PaymentGateway;
use crate::services::{ExpirySweeper, ReservationService, SettlementHandler, TicketIssuer};
use crate::store::InventoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InventoryStore>,
    pub reservations: Arc<ReservationService>,
    pub settlement: Arc<SettlementHandler>,
    pub sweeper: Arc<ExpirySweeper>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: &Config,
    ) -> Self {
        let reservations = ReservationService::new(
            store.clone(),
            gateway,
            config.reservation_settings(),
        );
        let settlement = SettlementHandler::new(
            store.clone(),
            TicketIssuer::new(),
            config.webhook_secret.clone(),
        );
        let sweeper = ExpirySweeper::new(store.clone(), config.sweep_batch_size);

        Self {
            store,
            reservations: Arc::new(reservations),
            settlement: Arc::new(settlement),
            sweeper: Arc::new(sweeper),
        }
    }
}
