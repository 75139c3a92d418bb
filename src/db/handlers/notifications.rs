//! Database repository for in-app notifications.

use crate::types::{abbrev_uuid, NotificationId, UserId};
use crate::db::{
    errors::Result,
    models::notifications::{NotificationCreateDBRequest, NotificationDBResponse},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Notifications<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Notifications<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id), kind = %request.kind), err)]
    pub async fn create(&mut self, request: &NotificationCreateDBRequest) -> Result<NotificationDBResponse> {
        let notification = sqlx::query_as::<_, NotificationDBResponse>(
            r#"
            INSERT INTO notifications (user_id, kind, title, body)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(&request.kind)
        .bind(&request.title)
        .bind(&request.body)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(notification)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(
        &mut self,
        user_id: UserId,
        unread_only: bool,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<NotificationDBResponse>> {
        let notifications = sqlx::query_as::<_, NotificationDBResponse>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT read)
            ORDER BY read ASC, created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(notifications)
    }

    /// Mark one notification read; scoped to the owner so a foreign id is a
    /// no-op.
    pub async fn mark_read(&mut self, id: NotificationId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_for_user(&mut self, user_id: UserId, unread_only: bool) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT read)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    pub async fn unread_count(&mut self, user_id: UserId) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
                .bind(user_id)
                .fetch_one(&mut *self.db)
                .await?;
        Ok(count)
    }
}
