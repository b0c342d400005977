use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Serialize)]
pub struct SweepResult {
    pub expired: u64,
}

/// Trigger for an external scheduler; safe to call at any cadence.
pub async fn expire_orders(State(state): State<AppState>) -> Result<Response, AppError> {
    let expired = state.sweeper.sweep().await?;
    Ok(success(SweepResult { expired }, "Expiry sweep completed"))
}
