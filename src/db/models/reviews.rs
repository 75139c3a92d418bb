//! Database models for reviews.

use crate::types::{BookingId, LawyerId, ReviewId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct ReviewCreateDBRequest {
    pub booking_id: BookingId,
    pub client_id: UserId,
    pub lawyer_id: LawyerId,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReviewDBResponse {
    pub id: ReviewId,
    pub booking_id: BookingId,
    pub client_id: UserId,
    pub lawyer_id: LawyerId,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}
