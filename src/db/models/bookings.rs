//! Database models for bookings.

use crate::api::models::bookings::BookingStatus;
use crate::types::{BookingId, LawyerId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct BookingCreateDBRequest {
    pub client_id: UserId,
    pub lawyer_id: LawyerId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    /// Server-computed price; client input never lands here.
    pub amount: Decimal,
    pub currency: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BookingDBResponse {
    pub id: BookingId,
    pub client_id: UserId,
    pub lawyer_id: LawyerId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: BookingStatus,
    pub amount: Decimal,
    pub currency: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
