//! Database repository for users.

use crate::types::{abbrev_uuid, UserId};
use crate::{
    api::models::users::Role,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub search: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

impl UserFilter {
    pub fn new(search: Option<String>, skip: i64, limit: i64) -> Self {
        Self { search, skip, limit }
    }
}

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (email, password_hash, full_name, phone, avatar_url, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(&request.full_name)
        .bind(&request.phone)
        .bind(&request.avatar_url)
        .bind(&request.role)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let pattern = filter.search.as_ref().map(|s| format!("%{s}%"));
        let users = sqlx::query_as::<_, UserDBResponse>(
            r#"
            SELECT * FROM users
            WHERE ($1::text IS NULL OR full_name ILIKE $1 OR email ILIKE $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(pattern)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET
                full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                avatar_url = COALESCE($4, avatar_url),
                password_hash = COALESCE($5, password_hash),
                role = COALESCE($6, role),
                is_active = COALESCE($7, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.full_name)
        .bind(&request.phone)
        .bind(&request.avatar_url)
        .bind(&request.password_hash)
        .bind(&request.role)
        .bind(request.is_active)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(user)
    }

    pub async fn touch_last_login(&mut self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    pub async fn count(&mut self, filter: &UserFilter) -> Result<i64> {
        let pattern = filter.search.as_ref().map(|s| format!("%{s}%"));
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR full_name ILIKE $1 OR email ILIKE $1)",
        )
        .bind(pattern)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn sample_create(email: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            email: email.to_string(),
            password_hash: None,
            full_name: "Test User".to_string(),
            phone: None,
            avatar_url: None,
            role: Role::User,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_fetch_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo.create(&sample_create("test@example.com")).await.unwrap();
        assert_eq!(created.email, "test@example.com");
        assert_eq!(created.role, Role::User);
        assert!(created.is_active);

        let by_email = repo.get_by_email("test@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        let by_id = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, created.email);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_email_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&sample_create("dup@example.com")).await.unwrap();
        let err = repo.create(&sample_create("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_partial_fields(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let created = repo.create(&sample_create("patch@example.com")).await.unwrap();
        let updated = repo
            .update(
                created.id,
                &UserUpdateDBRequest {
                    full_name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Renamed");
        // untouched fields survive
        assert_eq!(updated.email, "patch@example.com");
        assert_eq!(updated.role, Role::User);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_search_filter(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&sample_create("alice@example.com")).await.unwrap();
        repo.create(&sample_create("bob@example.com")).await.unwrap();

        let found = repo
            .list(&UserFilter::new(Some("alice".to_string()), 0, 10))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "alice@example.com");
    }
}
