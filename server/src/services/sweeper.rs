use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::store::InventoryStore;
use crate::utils::error::AppError;

pub const DEFAULT_BATCH_SIZE: i64 = 500;

/// Expires abandoned holds and gives their capacity back.
///
/// Safe to run repeatedly and concurrently: each batch only touches orders
/// still `pending` at the moment it is written.
pub struct ExpirySweeper {
    store: Arc<dyn InventoryStore>,
    batch_size: i64,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn InventoryStore>, batch_size: i64) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn sweep(&self) -> Result<u64, AppError> {
        self.sweep_at(Utc::now()).await
    }

    /// Returns the number of orders moved to `expired`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut total: u64 = 0;
        loop {
            let expired = self.store.expire_pending(now, self.batch_size).await?;
            total += expired.len() as u64;

            if !expired.is_empty() {
                tracing::debug!(batch = expired.len(), "Expired reservation batch");
            }
            if (expired.len() as i64) < self.batch_size {
                break;
            }
        }

        if total > 0 {
            tracing::info!(expired = total, "Released expired reservations");
        }
        Ok(total)
    }

    /// Runs [`ExpirySweeper::sweep`] every `every`; failed runs are retried on the next tick.
    pub fn spawn_ticker(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = self.sweep().await {
                    tracing::error!(error = %e, "Expiry sweep failed");
                }
            }
        })
    }
}
