//! HTTP handlers for user management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::models::{
        pagination::PaginatedResponse,
        users::{CurrentUser, ListUsersQuery, UserResponse, UserUpdate},
    },
    auth::permissions::{operation, resource, RequiresPermission},
    db::{
        handlers::{users::UserFilter, AuditLogs, Repository, Users},
        models::{audit::AuditLogCreateDBRequest, users::UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::UserId,
    AppState,
};

/// List users (admin)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Paginated list of users", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _perm: RequiresPermission<resource::Users, operation::ReadAll>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut pool_conn);

    let filter = UserFilter::new(query.search, skip, limit);
    let users = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Get a user (self or admin)
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<UserResponse>> {
    if id != current_user.id && !current_user.is_admin() {
        // 404 to avoid leaking account existence
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: id.to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut pool_conn);

    let user = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(UserResponse::from(user)))
}

/// Update a user (self or admin; `is_active` is admin-only)
#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    request_body = UserUpdate,
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    if id != current_user.id && !current_user.is_admin() {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: id.to_string(),
        });
    }
    if update.is_active.is_some() && !current_user.is_admin() {
        return Err(Error::InsufficientPermissions {
            required: crate::types::Permission::Allow(crate::types::Resource::Users, crate::types::Operation::UpdateAll),
            action: crate::types::Operation::UpdateAll,
            resource: "users".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut pool_conn);

    let updated = repo
        .update(
            id,
            &UserUpdateDBRequest {
                full_name: update.full_name,
                phone: update.phone,
                avatar_url: update.avatar_url,
                is_active: update.is_active,
                ..Default::default()
            },
        )
        .await?;

    // Deactivation is an administrative act worth a trail entry
    if current_user.is_admin() && id != current_user.id {
        let mut audit = AuditLogs::new(&mut pool_conn);
        audit
            .record(&AuditLogCreateDBRequest {
                actor_id: Some(current_user.id),
                action: "user.update".to_string(),
                entity_type: "user".to_string(),
                entity_id: id.to_string(),
                detail: Some(serde_json::json!({ "is_active": updated.is_active })),
            })
            .await?;
    }

    Ok(Json(UserResponse::from(updated)))
}

/// Delete a user (admin)
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    perm: RequiresPermission<resource::Users, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut pool_conn);

    if !repo.delete(id).await? {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: id.to_string(),
        });
    }

    let mut audit = AuditLogs::new(&mut pool_conn);
    audit
        .record(&AuditLogCreateDBRequest {
            actor_id: Some(perm.user.id),
            action: "user.delete".to_string(),
            entity_type: "user".to_string(),
            entity_id: id.to_string(),
            detail: None,
        })
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
