//! HTTP handlers for analytics ingest and aggregates.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};

use crate::{
    api::models::analytics::{
        AnalyticsEventCreate, AnalyticsSummaryResponse, AnalyticsWindowQuery, DailyCount, EventTypeCount, PathCount,
        SearchCount,
    },
    auth::{
        current_user::MaybeUser,
        permissions::{operation, resource, RequiresPermission},
    },
    db::{handlers::Analytics, models::analytics::AnalyticsEventCreateDBRequest},
    errors::{Error, Result},
    AppState,
};

const KNOWN_EVENT_TYPES: &[&str] = &["page_view", "event", "search", "api_call"];

impl AnalyticsWindowQuery {
    fn window(&self) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
        let until = self.until.unwrap_or_else(Utc::now);
        let since = self.since.unwrap_or(until - Duration::days(30));
        (since, until)
    }

    fn top_limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }
}

/// Ingest a frontend beacon. Always 202; analytics never fail a page.
#[utoipa::path(
    post,
    path = "/analytics/events",
    tag = "analytics",
    request_body = AnalyticsEventCreate,
    responses(
        (status = 202, description = "Event accepted"),
        (status = 400, description = "Unknown event type"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn ingest_event(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(request): Json<AnalyticsEventCreate>,
) -> Result<StatusCode> {
    if !KNOWN_EVENT_TYPES.contains(&request.event_type.as_str()) {
        return Err(Error::BadRequest {
            message: format!("Unknown event type: {}", request.event_type),
        });
    }

    let event = AnalyticsEventCreateDBRequest {
        event_type: request.event_type,
        path: request.path,
        search_query: request.search_query,
        user_id: user.map(|u| u.id),
        metadata: request.metadata,
    };

    // Fire-and-forget: the beacon response never waits on the insert
    let db = state.db.clone();
    tokio::spawn(async move {
        let mut conn = match db.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Failed to acquire connection for analytics event: {e}");
                return;
            }
        };
        let mut repo = Analytics::new(&mut conn);
        if let Err(e) = repo.insert_event(&event).await {
            tracing::warn!("Failed to record analytics event: {e}");
        }
    });

    Ok(StatusCode::ACCEPTED)
}

/// Event totals and daily counts in a window (admin)
#[utoipa::path(
    get,
    path = "/analytics/summary",
    tag = "analytics",
    params(AnalyticsWindowQuery),
    responses(
        (status = 200, description = "Summary", body = AnalyticsSummaryResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn summary(
    State(state): State<AppState>,
    _perm: RequiresPermission<resource::Analytics, operation::ReadAll>,
    Query(query): Query<AnalyticsWindowQuery>,
) -> Result<Json<AnalyticsSummaryResponse>> {
    let (since, until) = query.window();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Analytics::new(&mut pool_conn);

    let totals = repo
        .counts_by_type(since, until)
        .await?
        .into_iter()
        .map(|c| EventTypeCount {
            event_type: c.event_type,
            count: c.count,
        })
        .collect();
    let daily = repo
        .daily_counts(since, until)
        .await?
        .into_iter()
        .map(|c| DailyCount {
            day: c.day,
            count: c.count,
        })
        .collect();

    Ok(Json(AnalyticsSummaryResponse {
        since,
        until,
        totals,
        daily,
    }))
}

/// Most-viewed pages in a window (admin)
#[utoipa::path(
    get,
    path = "/analytics/top-pages",
    tag = "analytics",
    params(AnalyticsWindowQuery),
    responses(
        (status = 200, description = "Top pages", body = [PathCount]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn top_pages(
    State(state): State<AppState>,
    _perm: RequiresPermission<resource::Analytics, operation::ReadAll>,
    Query(query): Query<AnalyticsWindowQuery>,
) -> Result<Json<Vec<PathCount>>> {
    let (since, until) = query.window();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Analytics::new(&mut pool_conn);

    let pages = repo
        .top_pages(since, until, query.top_limit())
        .await?
        .into_iter()
        .map(|c| PathCount {
            path: c.path,
            count: c.count,
        })
        .collect();

    Ok(Json(pages))
}

/// Most-frequent search terms in a window (admin)
#[utoipa::path(
    get,
    path = "/analytics/top-searches",
    tag = "analytics",
    params(AnalyticsWindowQuery),
    responses(
        (status = 200, description = "Top searches", body = [SearchCount]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn top_searches(
    State(state): State<AppState>,
    _perm: RequiresPermission<resource::Analytics, operation::ReadAll>,
    Query(query): Query<AnalyticsWindowQuery>,
) -> Result<Json<Vec<SearchCount>>> {
    let (since, until) = query.window();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Analytics::new(&mut pool_conn);

    let searches = repo
        .top_searches(since, until, query.top_limit())
        .await?
        .into_iter()
        .map(|c| SearchCount {
            search_query: c.search_query,
            count: c.count,
        })
        .collect();

    Ok(Json(searches))
}
