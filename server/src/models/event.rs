use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::pricing::FeePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "platform_fee_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlatformFeeType {
    Percentage,
    Fixed,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub status: EventStatus,
    pub is_active: bool,
    pub platform_fee_type: PlatformFeeType,
    pub platform_fee_percentage: Decimal,
    pub platform_fee_fixed: Decimal,
    /// Tickets currently held or sold across every category of the event.
    pub booked_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Only published, active events accept reservations.
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.status == EventStatus::Published
    }

    pub fn fee_policy(&self) -> FeePolicy {
        match self.platform_fee_type {
            PlatformFeeType::Percentage => FeePolicy::Percentage(self.platform_fee_percentage),
            PlatformFeeType::Fixed => FeePolicy::Fixed(self.platform_fee_fixed),
            PlatformFeeType::Both => FeePolicy::Both {
                percentage: self.platform_fee_percentage,
                fixed: self.platform_fee_fixed,
            },
        }
    }
}
