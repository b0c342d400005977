use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Purchaser details copied onto each ticket at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Attendee {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}
