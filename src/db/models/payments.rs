//! Database models for booking payments and case payment requests.

use crate::api::models::payments::PaymentStatus;
use crate::types::{BookingId, CaseId, CasePaymentId, PaymentId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct PaymentCreateDBRequest {
    pub booking_id: BookingId,
    pub payer_id: UserId,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentDBResponse {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub payer_id: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub provider: Option<String>,
    pub provider_order_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CasePaymentCreateDBRequest {
    pub case_id: CaseId,
    pub requested_by: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CasePaymentDBResponse {
    pub id: CasePaymentId,
    pub case_id: CaseId,
    pub requested_by: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
    pub status: PaymentStatus,
    pub provider_order_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
