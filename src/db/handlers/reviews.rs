//! Database repository for reviews.
//!
//! Review insertion and the lawyer rating aggregates move together inside one
//! transaction, so a concurrent reader never observes a half-applied rating.

use crate::types::{abbrev_uuid, BookingId, LawyerId};
use crate::db::{
    errors::Result,
    models::reviews::{ReviewCreateDBRequest, ReviewDBResponse},
};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

pub struct Reviews<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Reviews<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(booking_id = %abbrev_uuid(&request.booking_id)), err)]
    pub async fn create(&mut self, request: &ReviewCreateDBRequest) -> Result<ReviewDBResponse> {
        let mut tx = self.db.begin().await?;

        let review = sqlx::query_as::<_, ReviewDBResponse>(
            r#"
            INSERT INTO reviews (booking_id, client_id, lawyer_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.booking_id)
        .bind(request.client_id)
        .bind(request.lawyer_id)
        .bind(request.rating)
        .bind(&request.comment)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE lawyers SET
                rating_avg = ROUND((rating_avg * rating_count + $2) / (rating_count + 1), 2),
                rating_count = rating_count + 1,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(request.lawyer_id)
        .bind(request.rating)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(review)
    }

    pub async fn get_by_booking(&mut self, booking_id: BookingId) -> Result<Option<ReviewDBResponse>> {
        let review = sqlx::query_as::<_, ReviewDBResponse>("SELECT * FROM reviews WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(review)
    }

    #[instrument(skip(self), fields(lawyer_id = %abbrev_uuid(&lawyer_id)), err)]
    pub async fn list_for_lawyer(&mut self, lawyer_id: LawyerId, skip: i64, limit: i64) -> Result<Vec<ReviewDBResponse>> {
        let reviews = sqlx::query_as::<_, ReviewDBResponse>(
            r#"
            SELECT * FROM reviews
            WHERE lawyer_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(lawyer_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(reviews)
    }

    pub async fn count_for_lawyer(&mut self, lawyer_id: LawyerId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE lawyer_id = $1")
            .bind(lawyer_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}
