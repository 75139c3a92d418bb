//! HTTP handlers for the audit trail.

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    api::models::{
        audit::{AuditLogResponse, ListAuditLogsQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{operation, resource, RequiresPermission},
    db::handlers::{audit::AuditLogFilter, AuditLogs},
    errors::{Error, Result},
    AppState,
};

/// List audit log entries (admin)
#[utoipa::path(
    get,
    path = "/audit-logs",
    tag = "audit",
    params(ListAuditLogsQuery),
    responses(
        (status = 200, description = "Paginated audit log", body = PaginatedResponse<AuditLogResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    _perm: RequiresPermission<resource::AuditLogs, operation::ReadAll>,
    Query(query): Query<ListAuditLogsQuery>,
) -> Result<Json<PaginatedResponse<AuditLogResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    let filter = AuditLogFilter {
        action: query.action,
        entity_type: query.entity_type,
        skip,
        limit,
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = AuditLogs::new(&mut pool_conn);

    let entries = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        entries.into_iter().map(AuditLogResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}
