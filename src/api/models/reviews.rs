//! API request/response models for reviews.

use super::pagination::Pagination;
use crate::db::models::reviews::ReviewDBResponse;
use crate::types::{BookingId, LawyerId, ReviewId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewCreate {
    /// 1 through 5
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ReviewId,
    #[schema(value_type = String, format = "uuid")]
    pub booking_id: BookingId,
    #[schema(value_type = String, format = "uuid")]
    pub client_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub lawyer_id: LawyerId,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewDBResponse> for ReviewResponse {
    fn from(db: ReviewDBResponse) -> Self {
        Self {
            id: db.id,
            booking_id: db.booking_id,
            client_id: db.client_id,
            lawyer_id: db.lawyer_id,
            rating: db.rating,
            comment: db.comment,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListReviewsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
