//! API request/response models for lawyer profiles.

use super::pagination::Pagination;
use crate::db::models::lawyers::LawyerDBResponse;
use crate::types::{LawyerId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Gate for whether a profile is publicly bookable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, ToSchema)]
#[sqlx(type_name = "verification_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

/// Profile fields supplied when standing up a lawyer profile.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LawyerProfileCreate {
    pub bar_number: String,
    pub specializations: Vec<String>,
    pub bio: Option<String>,
    pub years_experience: i32,
    #[schema(value_type = String)]
    pub consultation_rate: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LawyerUpdate {
    pub specializations: Option<Vec<String>>,
    pub bio: Option<String>,
    pub years_experience: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub consultation_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerificationUpdate {
    pub verification_status: VerificationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LawyerResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: LawyerId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub bar_number: String,
    pub specializations: Vec<String>,
    pub bio: Option<String>,
    pub years_experience: i32,
    #[schema(value_type = String)]
    pub consultation_rate: Decimal,
    pub currency: String,
    pub verification_status: VerificationStatus,
    #[schema(value_type = String)]
    pub rating_avg: Decimal,
    pub rating_count: i32,
    pub bookings_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LawyerDBResponse> for LawyerResponse {
    fn from(db: LawyerDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            bar_number: db.bar_number,
            specializations: db.specializations,
            bio: db.bio,
            years_experience: db.years_experience,
            consultation_rate: db.consultation_rate,
            currency: db.currency,
            verification_status: db.verification_status,
            rating_avg: db.rating_avg,
            rating_count: db.rating_count,
            bookings_count: db.bookings_count,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for the public lawyer directory
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListLawyersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Filter by practice area
    pub specialization: Option<String>,
    /// Minimum hourly rate
    #[param(value_type = Option<String>)]
    pub min_rate: Option<Decimal>,
    /// Maximum hourly rate
    #[param(value_type = Option<String>)]
    pub max_rate: Option<Decimal>,
    /// Case-insensitive substring match on name or bio
    pub search: Option<String>,
}
