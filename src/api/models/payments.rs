//! API request/response models for payments.

use super::pagination::Pagination;
use crate::db::models::payments::{CasePaymentDBResponse, PaymentDBResponse};
use crate::types::{BookingId, CaseId, CasePaymentId, PaymentId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PaymentId,
    #[schema(value_type = String, format = "uuid")]
    pub booking_id: BookingId,
    #[schema(value_type = String, format = "uuid")]
    pub payer_id: UserId,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub provider: Option<String>,
    pub provider_order_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PaymentDBResponse> for PaymentResponse {
    fn from(db: PaymentDBResponse) -> Self {
        Self {
            id: db.id,
            booking_id: db.booking_id,
            payer_id: db.payer_id,
            amount: db.amount,
            currency: db.currency,
            status: db.status,
            provider: db.provider,
            provider_order_id: db.provider_order_id,
            failure_reason: db.failure_reason,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Checkout start: where to send the user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub order_id: String,
}

/// Manual confirmation outcome.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentConfirmResponse {
    pub status: PaymentStatus,
    pub message: String,
}

/// Query parameters for listing payments
#[serde_with::serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListPaymentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<PaymentStatus>,
    /// Admin only: list every payment instead of one's own
    #[serde_as(as = "Option<serde_with::DisplayFromStr>")]
    pub all: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CasePaymentCreate {
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CasePaymentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CasePaymentId,
    #[schema(value_type = String, format = "uuid")]
    pub case_id: CaseId,
    #[schema(value_type = String, format = "uuid")]
    pub requested_by: UserId,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
    pub status: PaymentStatus,
    pub provider_order_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<CasePaymentDBResponse> for CasePaymentResponse {
    fn from(db: CasePaymentDBResponse) -> Self {
        Self {
            id: db.id,
            case_id: db.case_id,
            requested_by: db.requested_by,
            amount: db.amount,
            currency: db.currency,
            description: db.description,
            status: db.status,
            provider_order_id: db.provider_order_id,
            paid_at: db.paid_at,
            created_at: db.created_at,
        }
    }
}
