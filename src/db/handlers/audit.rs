//! Database repository for the audit trail.

use crate::db::{
    errors::Result,
    models::audit::{AuditLogCreateDBRequest, AuditLogDBResponse},
};
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub skip: i64,
    pub limit: i64,
}

pub struct AuditLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AuditLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(action = %request.action, entity = %request.entity_type), err)]
    pub async fn record(&mut self, request: &AuditLogCreateDBRequest) -> Result<AuditLogDBResponse> {
        let entry = sqlx::query_as::<_, AuditLogDBResponse>(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, detail)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.actor_id)
        .bind(&request.action)
        .bind(&request.entity_type)
        .bind(&request.entity_id)
        .bind(&request.detail)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(entry)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &AuditLogFilter) -> Result<Vec<AuditLogDBResponse>> {
        let entries = sqlx::query_as::<_, AuditLogDBResponse>(
            r#"
            SELECT * FROM audit_logs
            WHERE ($1::text IS NULL OR action = $1)
              AND ($2::text IS NULL OR entity_type = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.action)
        .bind(&filter.entity_type)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(entries)
    }

    pub async fn count(&mut self, filter: &AuditLogFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM audit_logs
            WHERE ($1::text IS NULL OR action = $1)
              AND ($2::text IS NULL OR entity_type = $2)
            "#,
        )
        .bind(&filter.action)
        .bind(&filter.entity_type)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }
}
