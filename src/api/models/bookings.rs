//! API request/response models for bookings.

use super::pagination::Pagination;
use crate::db::models::bookings::BookingDBResponse;
use crate::types::{BookingId, LawyerId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, ToSchema)]
#[sqlx(type_name = "booking_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

/// Checkout request. The price is not here on purpose: the server computes
/// it from the lawyer's stored rate.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BookingCreate {
    #[schema(value_type = String, format = "uuid")]
    pub lawyer_id: LawyerId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: BookingId,
    #[schema(value_type = String, format = "uuid")]
    pub client_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub lawyer_id: LawyerId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: BookingStatus,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub currency: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BookingDBResponse> for BookingResponse {
    fn from(db: BookingDBResponse) -> Self {
        Self {
            id: db.id,
            client_id: db.client_id,
            lawyer_id: db.lawyer_id,
            scheduled_at: db.scheduled_at,
            duration_minutes: db.duration_minutes,
            status: db.status,
            amount: db.amount,
            currency: db.currency,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Booking plus its payment, returned from checkout so the client can start
/// paying immediately.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingCheckoutResponse {
    pub booking: BookingResponse,
    pub payment: super::payments::PaymentResponse,
}

/// Query parameters for listing bookings
#[serde_with::serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListBookingsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<BookingStatus>,
    /// Admin only: list every booking instead of one's own
    #[serde_as(as = "Option<serde_with::DisplayFromStr>")]
    pub all: Option<bool>,
}
