//! Database repository for bookings.

use crate::types::{abbrev_uuid, BookingId, LawyerId, UserId};
use crate::{
    api::models::bookings::BookingStatus,
    db::{
        errors::Result,
        models::bookings::{BookingCreateDBRequest, BookingDBResponse},
    },
};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing bookings.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Bookings where this user is the client
    pub client_id: Option<UserId>,
    /// Bookings on this lawyer profile
    pub lawyer_id: Option<LawyerId>,
    pub status: Option<BookingStatus>,
    pub skip: i64,
    pub limit: i64,
}

pub struct Bookings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Bookings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(lawyer_id = %abbrev_uuid(&request.lawyer_id)), err)]
    pub async fn create(&mut self, request: &BookingCreateDBRequest) -> Result<BookingDBResponse> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            INSERT INTO bookings (client_id, lawyer_id, scheduled_at, duration_minutes, amount, currency, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.client_id)
        .bind(request.lawyer_id)
        .bind(request.scheduled_at)
        .bind(request.duration_minutes)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(&request.notes)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(booking)
    }

    #[instrument(skip(self), fields(booking_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: BookingId) -> Result<Option<BookingDBResponse>> {
        let booking = sqlx::query_as::<_, BookingDBResponse>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(booking)
    }

    /// Whether the lawyer already holds a live (PENDING/CONFIRMED) booking at
    /// this slot. The partial unique index backs this up against races.
    #[instrument(skip(self), fields(lawyer_id = %abbrev_uuid(&lawyer_id)), err)]
    pub async fn slot_taken(&mut self, lawyer_id: LawyerId, scheduled_at: DateTime<Utc>) -> Result<bool> {
        let existing = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE lawyer_id = $1 AND scheduled_at = $2 AND status IN ('PENDING', 'CONFIRMED')
            "#,
        )
        .bind(lawyer_id)
        .bind(scheduled_at)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(existing > 0)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &BookingFilter) -> Result<Vec<BookingDBResponse>> {
        let bookings = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            SELECT * FROM bookings
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::uuid IS NULL OR lawyer_id = $2)
              AND ($3::booking_status IS NULL OR status = $3)
            ORDER BY scheduled_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.client_id)
        .bind(filter.lawyer_id)
        .bind(filter.status)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(bookings)
    }

    pub async fn count(&mut self, filter: &BookingFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::uuid IS NULL OR lawyer_id = $2)
              AND ($3::booking_status IS NULL OR status = $3)
            "#,
        )
        .bind(filter.client_id)
        .bind(filter.lawyer_id)
        .bind(filter.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    /// Guarded status transition: the update applies only when the booking is
    /// currently in one of `from`. Returns `None` when the booking exists but
    /// is not in an eligible state, so callers can distinguish a replay from a
    /// missing row.
    #[instrument(skip(self), fields(booking_id = %abbrev_uuid(&id), to = ?to), err)]
    pub async fn transition(
        &mut self,
        id: BookingId,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Option<BookingDBResponse>> {
        let booking = sqlx::query_as::<_, BookingDBResponse>(
            r#"
            UPDATE bookings SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(booking)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::{Lawyers, Repository, Users};
    use crate::db::models::lawyers::LawyerCreateDBRequest;
    use crate::db::models::users::UserCreateDBRequest;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    async fn seed(conn: &mut PgConnection) -> (UserId, LawyerId) {
        let mut users = Users::new(conn);
        let client = users
            .create(&UserCreateDBRequest {
                email: format!("client-{}@example.com", uuid::Uuid::new_v4().simple()),
                password_hash: None,
                full_name: "Client".to_string(),
                phone: None,
                avatar_url: None,
                role: Role::User,
            })
            .await
            .unwrap();
        let lawyer_user = users
            .create(&UserCreateDBRequest {
                email: format!("lawyer-{}@example.com", uuid::Uuid::new_v4().simple()),
                password_hash: None,
                full_name: "Lawyer".to_string(),
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
                specializations: vec!["civil".to_string()],
                bio: None,
                years_experience: 5,
                consultation_rate: Decimal::new(1200, 0),
                currency: "INR".to_string(),
            })
            .await
            .unwrap();

        (client.id, lawyer.id)
    }

    fn booking(client: UserId, lawyer: LawyerId, slot: DateTime<Utc>) -> BookingCreateDBRequest {
        BookingCreateDBRequest {
            client_id: client,
            lawyer_id: lawyer,
            scheduled_at: slot,
            duration_minutes: 60,
            amount: Decimal::new(1200, 0),
            currency: "INR".to_string(),
            notes: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_slot_conflict_detection(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (client, lawyer) = seed(&mut conn).await;
        let slot = Utc::now() + Duration::days(1);

        let mut repo = Bookings::new(&mut conn);
        repo.create(&booking(client, lawyer, slot)).await.unwrap();

        assert!(repo.slot_taken(lawyer, slot).await.unwrap());
        assert!(!repo.slot_taken(lawyer, slot + Duration::hours(1)).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_slot_hits_unique_index(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (client, lawyer) = seed(&mut conn).await;
        let slot = Utc::now() + Duration::days(1);

        let mut repo = Bookings::new(&mut conn);
        repo.create(&booking(client, lawyer, slot)).await.unwrap();
        let err = repo.create(&booking(client, lawyer, slot)).await.unwrap_err();
        assert!(err.is_unique_violation_on("bookings_lawyer_slot_unique"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancelled_slot_can_be_rebooked(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (client, lawyer) = seed(&mut conn).await;
        let slot = Utc::now() + Duration::days(1);

        let mut repo = Bookings::new(&mut conn);
        let first = repo.create(&booking(client, lawyer, slot)).await.unwrap();
        repo.transition(first.id, &[BookingStatus::Pending], BookingStatus::Cancelled)
            .await
            .unwrap()
            .expect("transition should apply");

        // The partial unique index no longer covers the cancelled row
        repo.create(&booking(client, lawyer, slot)).await.unwrap();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_guarded_transition_rejects_wrong_state(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (client, lawyer) = seed(&mut conn).await;
        let slot = Utc::now() + Duration::days(2);

        let mut repo = Bookings::new(&mut conn);
        let created = repo.create(&booking(client, lawyer, slot)).await.unwrap();

        // PENDING -> COMPLETED is not legal (must be CONFIRMED first)
        let result = repo
            .transition(created.id, &[BookingStatus::Confirmed], BookingStatus::Completed)
            .await
            .unwrap();
        assert!(result.is_none());

        // PENDING -> CONFIRMED -> COMPLETED is
        repo.transition(created.id, &[BookingStatus::Pending], BookingStatus::Confirmed)
            .await
            .unwrap()
            .expect("confirm should apply");
        let completed = repo
            .transition(created.id, &[BookingStatus::Confirmed], BookingStatus::Completed)
            .await
            .unwrap()
            .expect("complete should apply");
        assert_eq!(completed.status, BookingStatus::Completed);
    }
}
