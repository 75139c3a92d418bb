//! Database models for lawyer profiles.

use crate::api::models::lawyers::VerificationStatus;
use crate::types::{LawyerId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct LawyerCreateDBRequest {
    pub user_id: UserId,
    pub bar_number: String,
    pub specializations: Vec<String>,
    pub bio: Option<String>,
    pub years_experience: i32,
    pub consultation_rate: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Default)]
pub struct LawyerUpdateDBRequest {
    pub specializations: Option<Vec<String>>,
    pub bio: Option<String>,
    pub years_experience: Option<i32>,
    pub consultation_rate: Option<Decimal>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LawyerDBResponse {
    pub id: LawyerId,
    pub user_id: UserId,
    pub bar_number: String,
    pub specializations: Vec<String>,
    pub bio: Option<String>,
    pub years_experience: i32,
    pub consultation_rate: Decimal,
    pub currency: String,
    pub verification_status: VerificationStatus,
    pub rating_avg: Decimal,
    pub rating_count: i32,
    pub bookings_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
