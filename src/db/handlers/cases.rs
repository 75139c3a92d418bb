//! Database repository for case threads.

use crate::types::{abbrev_uuid, CaseId, LawyerId, UserId};
use crate::{
    api::models::cases::CaseStatus,
    db::{
        errors::Result,
        models::cases::{CaseCreateDBRequest, CaseDBResponse},
    },
};
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing cases.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub client_id: Option<UserId>,
    pub lawyer_id: Option<LawyerId>,
    pub status: Option<CaseStatus>,
    pub skip: i64,
    pub limit: i64,
}

pub struct Cases<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Cases<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(lawyer_id = %abbrev_uuid(&request.lawyer_id)), err)]
    pub async fn create(&mut self, request: &CaseCreateDBRequest) -> Result<CaseDBResponse> {
        let case = sqlx::query_as::<_, CaseDBResponse>(
            r#"
            INSERT INTO cases (client_id, lawyer_id, title, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(request.client_id)
        .bind(request.lawyer_id)
        .bind(&request.title)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(case)
    }

    #[instrument(skip(self), fields(case_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: CaseId) -> Result<Option<CaseDBResponse>> {
        let case = sqlx::query_as::<_, CaseDBResponse>("SELECT * FROM cases WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(case)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &CaseFilter) -> Result<Vec<CaseDBResponse>> {
        let cases = sqlx::query_as::<_, CaseDBResponse>(
            r#"
            SELECT * FROM cases
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::uuid IS NULL OR lawyer_id = $2)
              AND ($3::case_status IS NULL OR status = $3)
            ORDER BY updated_at DESC
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
        Ok(cases)
    }

    pub async fn count(&mut self, filter: &CaseFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM cases
            WHERE ($1::uuid IS NULL OR client_id = $1)
              AND ($2::uuid IS NULL OR lawyer_id = $2)
              AND ($3::case_status IS NULL OR status = $3)
            "#,
        )
        .bind(filter.client_id)
        .bind(filter.lawyer_id)
        .bind(filter.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    /// Whether `user_id` is a participant of the case (its client, or the
    /// user behind its lawyer profile).
    pub async fn is_participant(&mut self, case_id: CaseId, user_id: UserId) -> Result<bool> {
        let participant = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM cases c
                JOIN lawyers l ON l.id = c.lawyer_id
                WHERE c.id = $1 AND (c.client_id = $2 OR l.user_id = $2)
            )
            "#,
        )
        .bind(case_id)
        .bind(user_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(participant)
    }

    /// Guarded lifecycle transition; `None` when the case is not in one of the
    /// `from` states.
    #[instrument(skip(self), fields(case_id = %abbrev_uuid(&id), to = ?to), err)]
    pub async fn transition(
        &mut self,
        id: CaseId,
        from: &[CaseStatus],
        to: CaseStatus,
    ) -> Result<Option<CaseDBResponse>> {
        let case = sqlx::query_as::<_, CaseDBResponse>(
            r#"
            UPDATE cases SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(case)
    }
}
