use axum::extract::State;
use axum::response::Response;
use axum::Json;

use crate::handlers::auth::AuthUser;
use crate::services::ReservationRequest;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::created;

pub async fn create_reservation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<ReservationRequest>,
) -> Result<Response, AppError> {
    let receipt = state.reservations.reserve(user_id, request).await?;
    Ok(created(receipt, "Tickets reserved, complete payment before the hold expires"))
}
