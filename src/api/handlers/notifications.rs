//! HTTP handlers for in-app notifications.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    api::models::{
        notifications::{ListNotificationsQuery, MarkAllReadResponse, NotificationResponse},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    db::handlers::Notifications,
    errors::{Error, Result},
    types::NotificationId,
    AppState,
};

/// List one's notifications, unread first
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Paginated notifications", body = PaginatedResponse<NotificationResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<NotificationResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();
    let unread_only = query.unread_only.unwrap_or(false);

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Notifications::new(&mut pool_conn);

    let notifications = repo.list_for_user(current_user.id, unread_only, skip, limit).await?;
    let total_count = repo.count_for_user(current_user.id, unread_only).await?;

    Ok(Json(PaginatedResponse::new(
        notifications.into_iter().map(NotificationResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Mark one notification read
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    params(("id" = String, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked read"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
    current_user: CurrentUser,
) -> Result<Json<serde_json::Value>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Notifications::new(&mut pool_conn);

    if !repo.mark_read(id, current_user.id).await? {
        return Err(Error::NotFound {
            resource: "Notification".to_string(),
            id: id.to_string(),
        });
    }

    Ok(Json(serde_json::json!({ "message": "Notification marked read" })))
}

/// Mark every notification read
#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "All notifications marked read", body = MarkAllReadResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<MarkAllReadResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Notifications::new(&mut pool_conn);

    let marked = repo.mark_all_read(current_user.id).await?;
    Ok(Json(MarkAllReadResponse { marked }))
}
