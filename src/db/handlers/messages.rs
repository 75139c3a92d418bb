//! Database repository for chat messages.

use crate::types::{abbrev_uuid, CaseId, MessageId, UserId};
use crate::db::{
    errors::Result,
    models::messages::{MessageCreateDBRequest, MessageDBResponse},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Messages<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Messages<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(case_id = %abbrev_uuid(&request.case_id)), err)]
    pub async fn create(&mut self, request: &MessageCreateDBRequest) -> Result<MessageDBResponse> {
        let message = sqlx::query_as::<_, MessageDBResponse>(
            r#"
            INSERT INTO messages (case_id, sender_id, body)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(request.case_id)
        .bind(request.sender_id)
        .bind(&request.body)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(message)
    }

    pub async fn get_by_id(&mut self, id: MessageId) -> Result<Option<MessageDBResponse>> {
        let message = sqlx::query_as::<_, MessageDBResponse>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(message)
    }

    /// Newest messages first; the page is reversed client-side for display.
    #[instrument(skip(self), fields(case_id = %abbrev_uuid(&case_id)), err)]
    pub async fn list_for_case(&mut self, case_id: CaseId, skip: i64, limit: i64) -> Result<Vec<MessageDBResponse>> {
        let messages = sqlx::query_as::<_, MessageDBResponse>(
            r#"
            SELECT * FROM messages
            WHERE case_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(case_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(messages)
    }

    /// Mark every message from the counterpart as read. Returns the number of
    /// rows that flipped, so a read receipt is only broadcast when something
    /// actually changed.
    #[instrument(skip(self), fields(case_id = %abbrev_uuid(&case_id)), err)]
    pub async fn mark_read(&mut self, case_id: CaseId, reader_id: UserId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET read_at = NOW()
            WHERE case_id = $1 AND sender_id != $2 AND read_at IS NULL
            "#,
        )
        .bind(case_id)
        .bind(reader_id)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_for_case(&mut self, case_id: CaseId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE case_id = $1")
            .bind(case_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::{Cases, Lawyers, Repository, Users};
    use crate::db::models::cases::CaseCreateDBRequest;
    use crate::db::models::lawyers::LawyerCreateDBRequest;
    use crate::db::models::users::UserCreateDBRequest;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    async fn seed(conn: &mut PgConnection) -> (CaseId, UserId, UserId) {
        let mut users = Users::new(conn);
        let client = users
            .create(&UserCreateDBRequest {
                email: format!("mc-{}@example.com", uuid::Uuid::new_v4().simple()),
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
                email: format!("ml-{}@example.com", uuid::Uuid::new_v4().simple()),
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
                specializations: vec![],
                bio: None,
                years_experience: 2,
                consultation_rate: Decimal::new(700, 0),
                currency: "INR".to_string(),
            })
            .await
            .unwrap();
        let mut cases = Cases::new(conn);
        let case = cases
            .create(&CaseCreateDBRequest {
                client_id: client.id,
                lawyer_id: lawyer.id,
                title: "Contract review".to_string(),
                description: None,
            })
            .await
            .unwrap();
        (case.id, client.id, lawyer_user.id)
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_messages_ordered_and_paginated(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (case_id, client_id, _lawyer_id) = seed(&mut conn).await;
        let mut repo = Messages::new(&mut conn);

        for i in 0..5 {
            repo.create(&MessageCreateDBRequest {
                case_id,
                sender_id: client_id,
                body: format!("message {i}"),
            })
            .await
            .unwrap();
        }

        let page = repo.list_for_case(case_id, 0, 3).await.unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].body, "message 4");

        assert_eq!(repo.count_for_case(case_id).await.unwrap(), 5);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_mark_read_only_counterpart_messages(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let (case_id, client_id, lawyer_id) = seed(&mut conn).await;
        let mut repo = Messages::new(&mut conn);

        repo.create(&MessageCreateDBRequest {
            case_id,
            sender_id: client_id,
            body: "from client".to_string(),
        })
        .await
        .unwrap();
        repo.create(&MessageCreateDBRequest {
            case_id,
            sender_id: lawyer_id,
            body: "from lawyer".to_string(),
        })
        .await
        .unwrap();

        // Client reads: only the lawyer's message flips
        let flipped = repo.mark_read(case_id, client_id).await.unwrap();
        assert_eq!(flipped, 1);

        // Second read is a no-op
        let again = repo.mark_read(case_id, client_id).await.unwrap();
        assert_eq!(again, 0);
    }
}
