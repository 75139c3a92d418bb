//! Database repositories for booking payments and case payment requests.
//!
//! Webhook-driven status transitions are guarded on the current status so a
//! replayed event can never apply twice; callers treat `None` as "already
//! reconciled" and acknowledge.

use crate::types::{abbrev_uuid, BookingId, CaseId, CasePaymentId, PaymentId, UserId};
use crate::{
    api::models::payments::PaymentStatus,
    db::{
        errors::Result,
        models::payments::{
            CasePaymentCreateDBRequest, CasePaymentDBResponse, PaymentCreateDBRequest, PaymentDBResponse,
        },
    },
};
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing payments.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub payer_id: Option<UserId>,
    pub status: Option<PaymentStatus>,
    pub skip: i64,
    pub limit: i64,
}

pub struct Payments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Payments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(booking_id = %abbrev_uuid(&request.booking_id)), err)]
    pub async fn create(&mut self, request: &PaymentCreateDBRequest) -> Result<PaymentDBResponse> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            INSERT INTO payments (booking_id, payer_id, amount, currency)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.booking_id)
        .bind(request.payer_id)
        .bind(request.amount)
        .bind(&request.currency)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(payment)
    }

    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: PaymentId) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>("SELECT * FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(payment)
    }

    pub async fn get_by_booking(&mut self, booking_id: BookingId) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>("SELECT * FROM payments WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(payment)
    }

    /// Resolve a payment from the order id the gateway echoes back in webhooks.
    pub async fn get_by_provider_order(&mut self, provider_order_id: &str) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>("SELECT * FROM payments WHERE provider_order_id = $1")
            .bind(provider_order_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(payment)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &PaymentFilter) -> Result<Vec<PaymentDBResponse>> {
        let payments = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            SELECT * FROM payments
            WHERE ($1::uuid IS NULL OR payer_id = $1)
              AND ($2::payment_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.payer_id)
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(payments)
    }

    pub async fn count(&mut self, filter: &PaymentFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM payments
            WHERE ($1::uuid IS NULL OR payer_id = $1)
              AND ($2::payment_status IS NULL OR status = $2)
            "#,
        )
        .bind(filter.payer_id)
        .bind(filter.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    /// Attach the gateway order and move to PROCESSING. Applies only from
    /// PENDING; a second checkout attempt on a processed payment is rejected
    /// upstream.
    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    pub async fn attach_provider_order(
        &mut self,
        id: PaymentId,
        provider: &str,
        provider_order_id: &str,
    ) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            UPDATE payments
            SET provider = $2, provider_order_id = $3, status = 'PROCESSING', updated_at = NOW()
            WHERE id = $1 AND status IN ('PENDING', 'PROCESSING')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(provider)
        .bind(provider_order_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(payment)
    }

    /// PENDING/PROCESSING -> COMPLETED. `None` means the payment was already
    /// reconciled (or does not exist); the caller checks which.
    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_completed(
        &mut self,
        id: PaymentId,
        provider_payment_id: Option<&str>,
    ) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            UPDATE payments
            SET status = 'COMPLETED', provider_payment_id = COALESCE($2, provider_payment_id), updated_at = NOW()
            WHERE id = $1 AND status IN ('PENDING', 'PROCESSING')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(provider_payment_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(payment)
    }

    /// PENDING/PROCESSING -> FAILED with the gateway's reason.
    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_failed(&mut self, id: PaymentId, reason: Option<&str>) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            UPDATE payments
            SET status = 'FAILED', failure_reason = $2, updated_at = NOW()
            WHERE id = $1 AND status IN ('PENDING', 'PROCESSING')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(payment)
    }

    /// COMPLETED -> REFUNDED.
    #[instrument(skip(self), fields(payment_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_refunded(&mut self, id: PaymentId) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentDBResponse>(
            r#"
            UPDATE payments
            SET status = 'REFUNDED', updated_at = NOW()
            WHERE id = $1 AND status = 'COMPLETED'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(payment)
    }
}

pub struct CasePayments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> CasePayments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(case_id = %abbrev_uuid(&request.case_id)), err)]
    pub async fn create(&mut self, request: &CasePaymentCreateDBRequest) -> Result<CasePaymentDBResponse> {
        let payment = sqlx::query_as::<_, CasePaymentDBResponse>(
            r#"
            INSERT INTO case_payments (case_id, requested_by, amount, currency, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.case_id)
        .bind(request.requested_by)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(payment)
    }

    pub async fn get_by_id(&mut self, id: CasePaymentId) -> Result<Option<CasePaymentDBResponse>> {
        let payment = sqlx::query_as::<_, CasePaymentDBResponse>("SELECT * FROM case_payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(payment)
    }

    pub async fn get_by_provider_order(&mut self, provider_order_id: &str) -> Result<Option<CasePaymentDBResponse>> {
        let payment =
            sqlx::query_as::<_, CasePaymentDBResponse>("SELECT * FROM case_payments WHERE provider_order_id = $1")
                .bind(provider_order_id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(payment)
    }

    pub async fn list_for_case(&mut self, case_id: CaseId) -> Result<Vec<CasePaymentDBResponse>> {
        let payments = sqlx::query_as::<_, CasePaymentDBResponse>(
            "SELECT * FROM case_payments WHERE case_id = $1 ORDER BY created_at DESC",
        )
        .bind(case_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(payments)
    }

    pub async fn attach_provider_order(
        &mut self,
        id: CasePaymentId,
        provider_order_id: &str,
    ) -> Result<Option<CasePaymentDBResponse>> {
        let payment = sqlx::query_as::<_, CasePaymentDBResponse>(
            r#"
            UPDATE case_payments
            SET provider_order_id = $2, status = 'PROCESSING', updated_at = NOW()
            WHERE id = $1 AND status IN ('PENDING', 'PROCESSING')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(provider_order_id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(payment)
    }

    pub async fn mark_completed(&mut self, id: CasePaymentId) -> Result<Option<CasePaymentDBResponse>> {
        let payment = sqlx::query_as::<_, CasePaymentDBResponse>(
            r#"
            UPDATE case_payments
            SET status = 'COMPLETED', paid_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status IN ('PENDING', 'PROCESSING')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(payment)
    }

    pub async fn mark_failed(&mut self, id: CasePaymentId) -> Result<Option<CasePaymentDBResponse>> {
        let payment = sqlx::query_as::<_, CasePaymentDBResponse>(
            r#"
            UPDATE case_payments
            SET status = 'FAILED', updated_at = NOW()
            WHERE id = $1 AND status IN ('PENDING', 'PROCESSING')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::{Bookings, Lawyers, Repository, Users};
    use crate::db::models::bookings::BookingCreateDBRequest;
    use crate::db::models::lawyers::LawyerCreateDBRequest;
    use crate::db::models::users::UserCreateDBRequest;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    async fn seed_payment(conn: &mut PgConnection) -> PaymentDBResponse {
        let mut users = Users::new(conn);
        let client = users
            .create(&UserCreateDBRequest {
                email: format!("payer-{}@example.com", uuid::Uuid::new_v4().simple()),
                password_hash: None,
                full_name: "Payer".to_string(),
                phone: None,
                avatar_url: None,
                role: Role::User,
            })
            .await
            .unwrap();
        let lawyer_user = users
            .create(&UserCreateDBRequest {
                email: format!("adv-{}@example.com", uuid::Uuid::new_v4().simple()),
                password_hash: None,
                full_name: "Advocate".to_string(),
                phone: None,
                avatar_url: None,
                role: Role::Lawyer,
            })
            .await
            .unwrap();

        let mut lawyers = Lawyers::new(conn);
        let lawyer = lawyers
            .create(&LawyerCreateDBRequest {
                user_id: lawyer_user.id,
                bar_number: format!("BAR-{}", uuid::Uuid::new_v4().simple()),
                specializations: vec![],
                bio: None,
                years_experience: 3,
                consultation_rate: Decimal::new(900, 0),
                currency: "INR".to_string(),
            })
            .await
            .unwrap();

        let mut bookings = Bookings::new(conn);
        let booking = bookings
            .create(&BookingCreateDBRequest {
                client_id: client.id,
                lawyer_id: lawyer.id,
                scheduled_at: Utc::now() + Duration::days(1),
                duration_minutes: 60,
                amount: Decimal::new(900, 0),
                currency: "INR".to_string(),
                notes: None,
            })
            .await
            .unwrap();

        let mut payments = Payments::new(conn);
        payments
            .create(&PaymentCreateDBRequest {
                booking_id: booking.id,
                payer_id: client.id,
                amount: booking.amount,
                currency: "INR".to_string(),
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_capture_is_idempotent(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let payment = seed_payment(&mut conn).await;
        let mut repo = Payments::new(&mut conn);

        let first = repo.mark_completed(payment.id, Some("pay_abc")).await.unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().status, PaymentStatus::Completed);

        // Replay of the same capture event applies nothing
        let replay = repo.mark_completed(payment.id, Some("pay_abc")).await.unwrap();
        assert!(replay.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_refund_requires_completed(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let payment = seed_payment(&mut conn).await;
        let mut repo = Payments::new(&mut conn);

        // Not yet captured: refund must not apply
        assert!(repo.mark_refunded(payment.id).await.unwrap().is_none());

        repo.mark_completed(payment.id, None).await.unwrap().unwrap();
        let refunded = repo.mark_refunded(payment.id).await.unwrap().unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failed_payment_cannot_complete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let payment = seed_payment(&mut conn).await;
        let mut repo = Payments::new(&mut conn);

        repo.mark_failed(payment.id, Some("card_declined")).await.unwrap().unwrap();
        assert!(repo.mark_completed(payment.id, None).await.unwrap().is_none());

        let row = repo.get_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(row.status, PaymentStatus::Failed);
        assert_eq!(row.failure_reason.as_deref(), Some("card_declined"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_lookup_by_provider_order(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let payment = seed_payment(&mut conn).await;
        let mut repo = Payments::new(&mut conn);

        repo.attach_provider_order(payment.id, "razorpay", "order_xyz")
            .await
            .unwrap()
            .unwrap();

        let found = repo.get_by_provider_order("order_xyz").await.unwrap().unwrap();
        assert_eq!(found.id, payment.id);
        assert_eq!(found.status, PaymentStatus::Processing);
    }
}
