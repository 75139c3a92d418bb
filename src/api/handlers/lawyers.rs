//! HTTP handlers for lawyer profiles and the public directory.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;

use crate::{
    api::models::{
        lawyers::{
            LawyerProfileCreate, LawyerResponse, LawyerUpdate, ListLawyersQuery, VerificationStatus,
            VerificationUpdate,
        },
        pagination::PaginatedResponse,
        users::{CurrentUser, Role},
    },
    auth::{
        current_user::MaybeUser,
        permissions::{operation, resource, RequiresPermission},
    },
    db::{
        handlers::{lawyers::LawyerFilter, AuditLogs, Lawyers, Repository, Users},
        models::{
            audit::AuditLogCreateDBRequest,
            lawyers::{LawyerCreateDBRequest, LawyerUpdateDBRequest},
            users::UserUpdateDBRequest,
        },
    },
    errors::{Error, Result},
    notifications::{self, spawn_notify},
    types::LawyerId,
    AppState,
};

/// Create a lawyer profile for the current account
#[utoipa::path(
    post,
    path = "/lawyers",
    tag = "lawyers",
    request_body = LawyerProfileCreate,
    responses(
        (status = 201, description = "Profile created (pending verification)", body = LawyerResponse),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Profile or bar number already exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_lawyer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(profile): Json<LawyerProfileCreate>,
) -> Result<(StatusCode, Json<LawyerResponse>)> {
    if profile.consultation_rate <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "Consultation rate must be greater than zero".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut repo = Lawyers::new(&mut tx);
    let lawyer = repo
        .create(&LawyerCreateDBRequest {
            user_id: current_user.id,
            bar_number: profile.bar_number,
            specializations: profile.specializations,
            bio: profile.bio,
            years_experience: profile.years_experience,
            consultation_rate: profile.consultation_rate,
            currency: state.config.bookings.currency.clone(),
        })
        .await?;

    // The account becomes a lawyer account alongside its profile
    let mut users = Users::new(&mut tx);
    users
        .update(
            current_user.id,
            &UserUpdateDBRequest {
                role: Some(Role::Lawyer),
                ..Default::default()
            },
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(LawyerResponse::from(lawyer))))
}

/// Public lawyer directory (VERIFIED profiles only)
#[utoipa::path(
    get,
    path = "/lawyers",
    tag = "lawyers",
    params(ListLawyersQuery),
    responses(
        (status = 200, description = "Paginated directory", body = PaginatedResponse<LawyerResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_lawyers(
    State(state): State<AppState>,
    Query(query): Query<ListLawyersQuery>,
) -> Result<Json<PaginatedResponse<LawyerResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Lawyers::new(&mut pool_conn);

    let filter = LawyerFilter {
        verified_only: true,
        specialization: query.specialization,
        min_rate: query.min_rate,
        max_rate: query.max_rate,
        search: query.search,
        skip,
        limit,
    };
    let lawyers = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        lawyers.into_iter().map(LawyerResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Get a lawyer profile
#[utoipa::path(
    get,
    path = "/lawyers/{id}",
    tag = "lawyers",
    params(("id" = String, Path, description = "Lawyer ID")),
    responses(
        (status = 200, description = "Lawyer profile", body = LawyerResponse),
        (status = 404, description = "Not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_lawyer(
    State(state): State<AppState>,
    Path(id): Path<LawyerId>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<LawyerResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Lawyers::new(&mut pool_conn);

    let not_found = || Error::NotFound {
        resource: "Lawyer".to_string(),
        id: id.to_string(),
    };

    let lawyer = repo.get_by_id(id).await?.ok_or_else(not_found)?;

    // Unverified profiles are visible only to their owner and admins
    if lawyer.verification_status != VerificationStatus::Verified {
        let allowed = user
            .as_ref()
            .is_some_and(|u| u.id == lawyer.user_id || u.is_admin());
        if !allowed {
            return Err(not_found());
        }
    }

    Ok(Json(LawyerResponse::from(lawyer)))
}

/// Update one's own lawyer profile
#[utoipa::path(
    patch,
    path = "/lawyers/{id}",
    tag = "lawyers",
    request_body = LawyerUpdate,
    params(("id" = String, Path, description = "Lawyer ID")),
    responses(
        (status = 200, description = "Updated profile", body = LawyerResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_lawyer(
    State(state): State<AppState>,
    Path(id): Path<LawyerId>,
    current_user: CurrentUser,
    Json(update): Json<LawyerUpdate>,
) -> Result<Json<LawyerResponse>> {
    if let Some(rate) = update.consultation_rate {
        if rate <= Decimal::ZERO {
            return Err(Error::BadRequest {
                message: "Consultation rate must be greater than zero".to_string(),
            });
        }
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Lawyers::new(&mut pool_conn);

    let not_found = || Error::NotFound {
        resource: "Lawyer".to_string(),
        id: id.to_string(),
    };

    let lawyer = repo.get_by_id(id).await?.ok_or_else(not_found)?;
    if lawyer.user_id != current_user.id && !current_user.is_admin() {
        return Err(not_found());
    }

    let updated = repo
        .update(
            id,
            &LawyerUpdateDBRequest {
                specializations: update.specializations,
                bio: update.bio,
                years_experience: update.years_experience,
                consultation_rate: update.consultation_rate,
            },
        )
        .await?;

    Ok(Json(LawyerResponse::from(updated)))
}

/// Decide a profile's verification (admin)
#[utoipa::path(
    patch,
    path = "/lawyers/{id}/verification",
    tag = "lawyers",
    request_body = VerificationUpdate,
    params(("id" = String, Path, description = "Lawyer ID")),
    responses(
        (status = 200, description = "Updated profile", body = LawyerResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_verification(
    State(state): State<AppState>,
    Path(id): Path<LawyerId>,
    perm: RequiresPermission<resource::Lawyers, operation::UpdateAll>,
    Json(update): Json<VerificationUpdate>,
) -> Result<Json<LawyerResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut repo = Lawyers::new(&mut pool_conn);
    let lawyer = repo.set_verification(id, update.verification_status).await?;

    let mut audit = AuditLogs::new(&mut pool_conn);
    audit
        .record(&AuditLogCreateDBRequest {
            actor_id: Some(perm.user.id),
            action: "lawyer.verification".to_string(),
            entity_type: "lawyer".to_string(),
            entity_id: id.to_string(),
            detail: Some(serde_json::json!({ "verification_status": update.verification_status })),
        })
        .await?;

    let decision = match update.verification_status {
        VerificationStatus::Verified => "Your profile has been verified and is now publicly listed.",
        VerificationStatus::Rejected => "Your profile verification was rejected.",
        VerificationStatus::Pending => "Your profile is back under review.",
    };
    spawn_notify(
        state.db.clone(),
        lawyer.user_id,
        notifications::kind::VERIFICATION_DECIDED,
        "Verification decision".to_string(),
        Some(decision.to_string()),
    );

    Ok(Json(LawyerResponse::from(lawyer)))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_verification_is_admin_only(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (_lawyer_user, lawyer) = create_test_lawyer(&pool, false).await;
        let user = create_test_user(&pool, crate::api::models::users::Role::User).await;

        let (name, value) = auth_header(&user);
        app.patch(&format!("/api/v1/lawyers/{}/verification", lawyer.id))
            .add_header(name, value)
            .json(&json!({ "verification_status": "VERIFIED" }))
            .await
            .assert_status_forbidden();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_verification_gates_the_directory(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (_lawyer_user, lawyer) = create_test_lawyer(&pool, false).await;
        let admin = create_test_user(&pool, crate::api::models::users::Role::Admin).await;

        // Hidden while pending
        let listing = app.get("/api/v1/lawyers").await;
        let body: serde_json::Value = listing.json();
        assert_eq!(body["total_count"], 0);

        let (name, value) = auth_header(&admin);
        app.patch(&format!("/api/v1/lawyers/{}/verification", lawyer.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({ "verification_status": "VERIFIED" }))
            .await
            .assert_status_ok();

        // Listed once verified
        let listing = app.get("/api/v1/lawyers").await;
        let body: serde_json::Value = listing.json();
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["data"][0]["id"], lawyer.id.to_string());

        // The decision leaves an audit trail entry
        let audit = app
            .get("/api/v1/audit-logs?action=lawyer.verification")
            .add_header(name, value)
            .await;
        audit.assert_status_ok();
        let body: serde_json::Value = audit.json();
        assert_eq!(body["data"][0]["entity_id"], lawyer.id.to_string());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_pending_profile_hidden_from_strangers(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (lawyer_user, lawyer) = create_test_lawyer(&pool, false).await;

        // Anonymous readers get a 404
        app.get(&format!("/api/v1/lawyers/{}", lawyer.id))
            .await
            .assert_status_not_found();

        // The owner still sees their own pending profile
        let (name, value) = auth_header(&lawyer_user);
        let own = app
            .get(&format!("/api/v1/lawyers/{}", lawyer.id))
            .add_header(name, value)
            .await;
        own.assert_status_ok();
        let body: serde_json::Value = own.json();
        assert_eq!(body["verification_status"], "PENDING");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_owner_updates_rate(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (lawyer_user, lawyer) = create_test_lawyer(&pool, true).await;

        let (name, value) = auth_header(&lawyer_user);
        let response = app
            .patch(&format!("/api/v1/lawyers/{}", lawyer.id))
            .add_header(name, value)
            .json(&json!({ "consultation_rate": "1800" }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["consultation_rate"], "1800");
    }
}
