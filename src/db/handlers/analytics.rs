//! Database repository for analytics events.
//!
//! Events are ingested raw and aggregated on demand with plain SQL.

use crate::db::{
    errors::Result,
    models::analytics::{
        AnalyticsEventCreateDBRequest, DailyCountDBResponse, EventTypeCountDBResponse, PathCountDBResponse,
        SearchCountDBResponse,
    },
};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Analytics<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Analytics<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(event_type = %request.event_type), err)]
    pub async fn insert_event(&mut self, request: &AnalyticsEventCreateDBRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analytics_events (event_type, path, search_query, user_id, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&request.event_type)
        .bind(&request.path)
        .bind(&request.search_query)
        .bind(request.user_id)
        .bind(&request.metadata)
        .execute(&mut *self.db)
        .await?;
        Ok(())
    }

    pub async fn counts_by_type(
        &mut self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<EventTypeCountDBResponse>> {
        let counts = sqlx::query_as::<_, EventTypeCountDBResponse>(
            r#"
            SELECT event_type, COUNT(*) AS count
            FROM analytics_events
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY event_type
            ORDER BY count DESC
            "#,
        )
        .bind(since)
        .bind(until)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(counts)
    }

    pub async fn daily_counts(
        &mut self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<DailyCountDBResponse>> {
        let counts = sqlx::query_as::<_, DailyCountDBResponse>(
            r#"
            SELECT date_trunc('day', created_at) AS day, COUNT(*) AS count
            FROM analytics_events
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(since)
        .bind(until)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(counts)
    }

    pub async fn top_pages(
        &mut self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PathCountDBResponse>> {
        let counts = sqlx::query_as::<_, PathCountDBResponse>(
            r#"
            SELECT path, COUNT(*) AS count
            FROM analytics_events
            WHERE event_type = 'page_view' AND path IS NOT NULL
              AND created_at >= $1 AND created_at < $2
            GROUP BY path
            ORDER BY count DESC
            LIMIT $3
            "#,
        )
        .bind(since)
        .bind(until)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(counts)
    }

    pub async fn top_searches(
        &mut self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SearchCountDBResponse>> {
        let counts = sqlx::query_as::<_, SearchCountDBResponse>(
            r#"
            SELECT search_query, COUNT(*) AS count
            FROM analytics_events
            WHERE event_type = 'search' AND search_query IS NOT NULL
              AND created_at >= $1 AND created_at < $2
            GROUP BY search_query
            ORDER BY count DESC
            LIMIT $3
            "#,
        )
        .bind(since)
        .bind(until)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(counts)
    }
}
