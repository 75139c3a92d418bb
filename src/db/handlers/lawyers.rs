//! Database repository for lawyer profiles.

use crate::types::{abbrev_uuid, LawyerId, UserId};
use crate::{
    api::models::lawyers::VerificationStatus,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::lawyers::{LawyerCreateDBRequest, LawyerDBResponse, LawyerUpdateDBRequest},
    },
};
use rust_decimal::Decimal;
use sqlx::{PgConnection, QueryBuilder};
use tracing::instrument;

/// Filter for the lawyer directory.
#[derive(Debug, Clone, Default)]
pub struct LawyerFilter {
    /// Restrict to VERIFIED profiles (the public directory view)
    pub verified_only: bool,
    pub specialization: Option<String>,
    pub min_rate: Option<Decimal>,
    pub max_rate: Option<Decimal>,
    /// Substring match on the lawyer's name or bio
    pub search: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

pub struct Lawyers<'c> {
    db: &'c mut PgConnection,
}

impl LawyerFilter {
    fn push_conditions<'a>(&'a self, builder: &mut QueryBuilder<'a, sqlx::Postgres>) {
        builder.push(" WHERE TRUE");
        if self.verified_only {
            builder.push(" AND l.verification_status = 'VERIFIED' AND u.is_active");
        }
        if let Some(spec) = &self.specialization {
            builder.push(" AND ").push_bind(spec).push(" = ANY(l.specializations)");
        }
        if let Some(min) = &self.min_rate {
            builder.push(" AND l.consultation_rate >= ").push_bind(min);
        }
        if let Some(max) = &self.max_rate {
            builder.push(" AND l.consultation_rate <= ").push_bind(max);
        }
        if let Some(search) = &self.search {
            let pattern = format!("%{search}%");
            builder
                .push(" AND (u.full_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR l.bio ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Lawyers<'c> {
    type CreateRequest = LawyerCreateDBRequest;
    type UpdateRequest = LawyerUpdateDBRequest;
    type Response = LawyerDBResponse;
    type Id = LawyerId;
    type Filter = LawyerFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let lawyer = sqlx::query_as::<_, LawyerDBResponse>(
            r#"
            INSERT INTO lawyers (user_id, bar_number, specializations, bio, years_experience, consultation_rate, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(&request.bar_number)
        .bind(&request.specializations)
        .bind(&request.bio)
        .bind(request.years_experience)
        .bind(request.consultation_rate)
        .bind(&request.currency)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(lawyer)
    }

    #[instrument(skip(self), fields(lawyer_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let lawyer = sqlx::query_as::<_, LawyerDBResponse>("SELECT * FROM lawyers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(lawyer)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT l.* FROM lawyers l JOIN users u ON u.id = l.user_id");
        filter.push_conditions(&mut builder);
        builder
            .push(" ORDER BY l.rating_avg DESC, l.rating_count DESC, l.created_at ASC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.skip);

        let lawyers = builder
            .build_query_as::<LawyerDBResponse>()
            .fetch_all(&mut *self.db)
            .await?;
        Ok(lawyers)
    }

    #[instrument(skip(self), fields(lawyer_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM lawyers WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(lawyer_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let lawyer = sqlx::query_as::<_, LawyerDBResponse>(
            r#"
            UPDATE lawyers SET
                specializations = COALESCE($2, specializations),
                bio = COALESCE($3, bio),
                years_experience = COALESCE($4, years_experience),
                consultation_rate = COALESCE($5, consultation_rate),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.specializations)
        .bind(&request.bio)
        .bind(request.years_experience)
        .bind(request.consultation_rate)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(lawyer)
    }
}

impl<'c> Lawyers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_by_user_id(&mut self, user_id: UserId) -> Result<Option<LawyerDBResponse>> {
        let lawyer = sqlx::query_as::<_, LawyerDBResponse>("SELECT * FROM lawyers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(lawyer)
    }

    #[instrument(skip(self), fields(lawyer_id = %abbrev_uuid(&id)), err)]
    pub async fn set_verification(&mut self, id: LawyerId, status: VerificationStatus) -> Result<LawyerDBResponse> {
        let lawyer = sqlx::query_as::<_, LawyerDBResponse>(
            "UPDATE lawyers SET verification_status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;
        Ok(lawyer)
    }

    /// Adjust the denormalized live-booking counter.
    pub async fn adjust_bookings_count(&mut self, id: LawyerId, delta: i32) -> Result<()> {
        sqlx::query("UPDATE lawyers SET bookings_count = GREATEST(bookings_count + $2, 0) WHERE id = $1")
            .bind(id)
            .bind(delta)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    pub async fn count(&mut self, filter: &LawyerFilter) -> Result<i64> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM lawyers l JOIN users u ON u.id = l.user_id");
        filter.push_conditions(&mut builder);
        let count = builder.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    async fn create_user(conn: &mut PgConnection, email: &str) -> UserId {
        let mut users = crate::db::handlers::Users::new(conn);
        users
            .create(&UserCreateDBRequest {
                email: email.to_string(),
                password_hash: None,
                full_name: "Adv. Test".to_string(),
                phone: None,
                avatar_url: None,
                role: Role::Lawyer,
            })
            .await
            .unwrap()
            .id
    }

    fn profile(user_id: UserId, bar: &str, rate: i64) -> LawyerCreateDBRequest {
        LawyerCreateDBRequest {
            user_id,
            bar_number: bar.to_string(),
            specializations: vec!["family".to_string(), "property".to_string()],
            bio: Some("Decade of family law practice".to_string()),
            years_experience: 10,
            consultation_rate: Decimal::new(rate, 0),
            currency: "INR".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_starts_pending(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = create_user(&mut conn, "lawyer@example.com").await;
        let mut repo = Lawyers::new(&mut conn);

        let lawyer = repo.create(&profile(user_id, "BAR-1", 1500)).await.unwrap();
        assert_eq!(lawyer.verification_status, VerificationStatus::Pending);
        assert_eq!(lawyer.rating_count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_one_profile_per_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = create_user(&mut conn, "single@example.com").await;
        let mut repo = Lawyers::new(&mut conn);

        repo.create(&profile(user_id, "BAR-2", 1000)).await.unwrap();
        let err = repo.create(&profile(user_id, "BAR-3", 1000)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_directory_only_lists_verified(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let pending_user = create_user(&mut conn, "pending@example.com").await;
        let verified_user = create_user(&mut conn, "verified@example.com").await;

        let mut repo = Lawyers::new(&mut conn);
        repo.create(&profile(pending_user, "BAR-P", 1000)).await.unwrap();
        let verified = repo.create(&profile(verified_user, "BAR-V", 2000)).await.unwrap();
        repo.set_verification(verified.id, VerificationStatus::Verified)
            .await
            .unwrap();

        let listed = repo
            .list(&LawyerFilter {
                verified_only: true,
                skip: 0,
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, verified.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_directory_rate_and_specialization_filters(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let cheap_user = create_user(&mut conn, "cheap@example.com").await;
        let dear_user = create_user(&mut conn, "dear@example.com").await;

        let mut repo = Lawyers::new(&mut conn);
        let cheap = repo.create(&profile(cheap_user, "BAR-C", 500)).await.unwrap();
        let dear = repo.create(&profile(dear_user, "BAR-D", 5000)).await.unwrap();
        repo.set_verification(cheap.id, VerificationStatus::Verified).await.unwrap();
        repo.set_verification(dear.id, VerificationStatus::Verified).await.unwrap();

        let filtered = repo
            .list(&LawyerFilter {
                verified_only: true,
                max_rate: Some(Decimal::new(1000, 0)),
                specialization: Some("family".to_string()),
                skip: 0,
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, cheap.id);
    }
}
