use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Receives gateway notifications. The body is taken as raw bytes so the
/// signature is checked against exactly what was sent.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.settlement.handle(&body, signature).await?;
    Ok(success(outcome, "Webhook processed"))
}
