//! HTTP handlers for case threads and their payment requests.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;

use crate::{
    api::models::{
        cases::{CaseCreate, CaseResponse, CaseStatus, ListCasesQuery},
        lawyers::VerificationStatus,
        pagination::PaginatedResponse,
        payments::{CasePaymentCreate, CasePaymentResponse, CheckoutResponse, PaymentStatus},
        users::{CurrentUser, Role},
    },
    auth::permissions::{operation, resource, RequiresPermission},
    db::{
        handlers::{cases::CaseFilter, CasePayments, Cases, Lawyers},
        models::{cases::CaseCreateDBRequest, payments::CasePaymentCreateDBRequest},
    },
    db::handlers::Repository,
    errors::{Error, Result},
    notifications::{self, spawn_notify},
    payment_providers,
    types::{CaseId, CasePaymentId},
    AppState,
};

fn case_not_found(id: CaseId) -> Error {
    Error::NotFound {
        resource: "Case".to_string(),
        id: id.to_string(),
    }
}

/// Load a case the current user may see, or 404.
async fn load_case_for(
    conn: &mut sqlx::PgConnection,
    id: CaseId,
    user: &CurrentUser,
) -> Result<crate::db::models::cases::CaseDBResponse> {
    let mut cases = Cases::new(conn);
    let case = cases.get_by_id(id).await?.ok_or_else(|| case_not_found(id))?;

    if user.is_admin() || cases.is_participant(id, user.id).await? {
        Ok(case)
    } else {
        Err(case_not_found(id))
    }
}

/// Open a case with a lawyer
#[utoipa::path(
    post,
    path = "/cases",
    tag = "cases",
    request_body = CaseCreate,
    responses(
        (status = 201, description = "Case requested", body = CaseResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Lawyer not found or not verified"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_case(
    State(state): State<AppState>,
    perm: RequiresPermission<resource::Cases, operation::CreateOwn>,
    Json(request): Json<CaseCreate>,
) -> Result<(StatusCode, Json<CaseResponse>)> {
    let user = perm.user;

    if request.title.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Case title cannot be empty".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut lawyers = Lawyers::new(&mut tx);
    let lawyer = lawyers
        .get_by_id(request.lawyer_id)
        .await?
        .filter(|l| l.verification_status == VerificationStatus::Verified)
        .ok_or_else(|| Error::NotFound {
            resource: "Lawyer".to_string(),
            id: request.lawyer_id.to_string(),
        })?;

    if lawyer.user_id == user.id {
        return Err(Error::BadRequest {
            message: "You cannot open a case with yourself".to_string(),
        });
    }

    let mut cases = Cases::new(&mut tx);
    let case = cases
        .create(&CaseCreateDBRequest {
            client_id: user.id,
            lawyer_id: lawyer.id,
            title: request.title,
            description: request.description,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    spawn_notify(
        state.db.clone(),
        lawyer.user_id,
        notifications::kind::CASE_REQUESTED,
        "New case request".to_string(),
        Some(format!("{} requested a case: {}", user.full_name, case.title)),
    );

    Ok((StatusCode::CREATED, Json(CaseResponse::from(case))))
}

/// List cases (own; admin may pass `all=true`)
#[utoipa::path(
    get,
    path = "/cases",
    tag = "cases",
    params(ListCasesQuery),
    responses(
        (status = 200, description = "Paginated cases", body = PaginatedResponse<CaseResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_cases(
    State(state): State<AppState>,
    Query(query): Query<ListCasesQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<CaseResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    if query.all == Some(true) && !current_user.is_admin() {
        return Err(Error::InsufficientPermissions {
            required: crate::types::Permission::Allow(crate::types::Resource::Cases, crate::types::Operation::ReadAll),
            action: crate::types::Operation::ReadAll,
            resource: "all cases".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut filter = CaseFilter {
        status: query.status,
        skip,
        limit,
        ..Default::default()
    };

    if query.all != Some(true) {
        match current_user.role {
            Role::Lawyer => {
                let mut lawyers = Lawyers::new(&mut pool_conn);
                match lawyers.get_by_user_id(current_user.id).await? {
                    Some(lawyer) => filter.lawyer_id = Some(lawyer.id),
                    None => filter.client_id = Some(current_user.id),
                }
            }
            _ => filter.client_id = Some(current_user.id),
        }
    }

    let mut repo = Cases::new(&mut pool_conn);
    let cases = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        cases.into_iter().map(CaseResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Get a case (participants and admins)
#[utoipa::path(
    get,
    path = "/cases/{id}",
    tag = "cases",
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Case details", body = CaseResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    current_user: CurrentUser,
) -> Result<Json<CaseResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let case = load_case_for(&mut pool_conn, id, &current_user).await?;
    Ok(Json(CaseResponse::from(case)))
}

/// Shared lifecycle driver for accept/reject/resolve/close.
async fn transition_case(
    state: &AppState,
    id: CaseId,
    current_user: &CurrentUser,
    lawyer_only: bool,
    from: &[CaseStatus],
    to: CaseStatus,
    conflict_message: &str,
) -> Result<CaseResponse> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let case = load_case_for(&mut tx, id, current_user).await?;

    if lawyer_only && !current_user.is_admin() {
        let mut lawyers = Lawyers::new(&mut tx);
        let lawyer = lawyers.get_by_id(case.lawyer_id).await?.ok_or_else(|| case_not_found(id))?;
        if lawyer.user_id != current_user.id {
            return Err(Error::InsufficientPermissions {
                required: crate::types::Permission::Participant,
                action: crate::types::Operation::UpdateOwn,
                resource: "cases".to_string(),
            });
        }
    }

    let mut cases = Cases::new(&mut tx);
    let updated = cases.transition(id, from, to).await?.ok_or_else(|| Error::Conflict {
        message: conflict_message.to_string(),
    })?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    // Tell the client about lawyer-side decisions
    if current_user.id != updated.client_id {
        spawn_notify(
            state.db.clone(),
            updated.client_id,
            notifications::kind::CASE_UPDATED,
            "Case updated".to_string(),
            Some(format!("Your case \"{}\" is now {:?}", updated.title, to)),
        );
    }

    Ok(CaseResponse::from(updated))
}

/// Accept a case (its lawyer): REQUESTED -> OPEN
#[utoipa::path(
    post,
    path = "/cases/{id}/accept",
    tag = "cases",
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Case opened", body = CaseResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Case is not in REQUESTED state"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn accept_case(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    current_user: CurrentUser,
) -> Result<Json<CaseResponse>> {
    let case = transition_case(
        &state,
        id,
        &current_user,
        true,
        &[CaseStatus::Requested],
        CaseStatus::Open,
        "Only requested cases can be accepted",
    )
    .await?;
    Ok(Json(case))
}

/// Reject a case (its lawyer): REQUESTED -> REJECTED
#[utoipa::path(
    post,
    path = "/cases/{id}/reject",
    tag = "cases",
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Case rejected", body = CaseResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Case is not in REQUESTED state"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn reject_case(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    current_user: CurrentUser,
) -> Result<Json<CaseResponse>> {
    let case = transition_case(
        &state,
        id,
        &current_user,
        true,
        &[CaseStatus::Requested],
        CaseStatus::Rejected,
        "Only requested cases can be rejected",
    )
    .await?;
    Ok(Json(case))
}

/// Resolve a case (its lawyer): OPEN -> RESOLVED
#[utoipa::path(
    post,
    path = "/cases/{id}/resolve",
    tag = "cases",
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Case resolved", body = CaseResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Case is not OPEN"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn resolve_case(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    current_user: CurrentUser,
) -> Result<Json<CaseResponse>> {
    let case = transition_case(
        &state,
        id,
        &current_user,
        true,
        &[CaseStatus::Open],
        CaseStatus::Resolved,
        "Only open cases can be resolved",
    )
    .await?;
    Ok(Json(case))
}

/// Close a case (either participant): OPEN/RESOLVED -> CLOSED
#[utoipa::path(
    post,
    path = "/cases/{id}/close",
    tag = "cases",
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Case closed", body = CaseResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Case is not closable"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn close_case(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    current_user: CurrentUser,
) -> Result<Json<CaseResponse>> {
    let case = transition_case(
        &state,
        id,
        &current_user,
        false,
        &[CaseStatus::Open, CaseStatus::Resolved],
        CaseStatus::Closed,
        "Only open or resolved cases can be closed",
    )
    .await?;
    Ok(Json(case))
}

/// Issue a payment request on a case (its lawyer)
#[utoipa::path(
    post,
    path = "/cases/{id}/payments",
    tag = "cases",
    request_body = CasePaymentCreate,
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 201, description = "Payment request created", body = CasePaymentResponse),
        (status = 400, description = "Invalid amount"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Case does not accept payment requests"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_case_payment(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    current_user: CurrentUser,
    Json(request): Json<CasePaymentCreate>,
) -> Result<(StatusCode, Json<CasePaymentResponse>)> {
    if request.amount <= Decimal::ZERO {
        return Err(Error::BadRequest {
            message: "Amount must be greater than zero".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let case = load_case_for(&mut tx, id, &current_user).await?;

    // Only the case's lawyer bills on it
    let mut lawyers = Lawyers::new(&mut tx);
    let lawyer = lawyers.get_by_id(case.lawyer_id).await?.ok_or_else(|| case_not_found(id))?;
    if lawyer.user_id != current_user.id {
        return Err(Error::InsufficientPermissions {
            required: crate::types::Permission::Participant,
            action: crate::types::Operation::CreateOwn,
            resource: "case payments".to_string(),
        });
    }

    if matches!(case.status, CaseStatus::Closed | CaseStatus::Rejected) {
        return Err(Error::Conflict {
            message: "Payment requests cannot be added to a closed case".to_string(),
        });
    }

    let mut case_payments = CasePayments::new(&mut tx);
    let payment = case_payments
        .create(&CasePaymentCreateDBRequest {
            case_id: id,
            requested_by: current_user.id,
            amount: request.amount,
            currency: state.config.bookings.currency.clone(),
            description: request.description,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    spawn_notify(
        state.db.clone(),
        case.client_id,
        notifications::kind::CASE_PAYMENT_REQUESTED,
        "Payment requested".to_string(),
        Some(format!(
            "{} requested {} {} on case \"{}\"",
            current_user.full_name, payment.amount, payment.currency, case.title
        )),
    );

    Ok((StatusCode::CREATED, Json(CasePaymentResponse::from(payment))))
}

/// List a case's payment requests (participants)
#[utoipa::path(
    get,
    path = "/cases/{id}/payments",
    tag = "cases",
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Payment requests", body = [CasePaymentResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_case_payments(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<CasePaymentResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    load_case_for(&mut pool_conn, id, &current_user).await?;

    let mut case_payments = CasePayments::new(&mut pool_conn);
    let payments = case_payments.list_for_case(id).await?;

    Ok(Json(payments.into_iter().map(CasePaymentResponse::from).collect()))
}

/// Start checkout for a case payment (the case's client)
#[utoipa::path(
    post,
    path = "/cases/{id}/payments/{payment_id}/checkout",
    tag = "cases",
    params(
        ("id" = String, Path, description = "Case ID"),
        ("payment_id" = String, Path, description = "Case payment ID"),
    ),
    responses(
        (status = 200, description = "Checkout created", body = CheckoutResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Payment is not payable"),
        (status = 501, description = "No payment provider configured"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn checkout_case_payment(
    State(state): State<AppState>,
    Path((id, payment_id)): Path<(CaseId, CasePaymentId)>,
    current_user: CurrentUser,
) -> Result<Json<CheckoutResponse>> {
    let provider = payment_providers::create_provider(&state.config).ok_or_else(|| Error::NotImplemented {
        message: "No payment provider is configured".to_string(),
    })?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let case = load_case_for(&mut pool_conn, id, &current_user).await?;

    // Paying is the client's side of the exchange
    if case.client_id != current_user.id && !current_user.is_admin() {
        return Err(case_not_found(id));
    }

    let mut case_payments = CasePayments::new(&mut pool_conn);
    let payment = case_payments
        .get_by_id(payment_id)
        .await?
        .filter(|p| p.case_id == id)
        .ok_or_else(|| Error::NotFound {
            resource: "Case payment".to_string(),
            id: payment_id.to_string(),
        })?;

    if !matches!(payment.status, PaymentStatus::Pending | PaymentStatus::Processing) {
        return Err(Error::Conflict {
            message: "This payment has already been processed".to_string(),
        });
    }

    let order = provider
        .create_order(&payment.id.to_string(), payment.amount, &payment.currency)
        .await?;

    case_payments
        .attach_provider_order(payment.id, &order.order_id)
        .await?
        .ok_or_else(|| Error::Conflict {
            message: "This payment has already been processed".to_string(),
        })?;

    Ok(Json(CheckoutResponse {
        checkout_url: order.checkout_url,
        order_id: order.order_id,
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    async fn open_case(
        app: &axum_test::TestServer,
        pool: &PgPool,
    ) -> (
        crate::api::models::users::UserResponse,
        crate::api::models::users::UserResponse,
        String,
    ) {
        let client = create_test_user(pool, crate::api::models::users::Role::User).await;
        let (lawyer_user, lawyer) = create_test_lawyer(pool, true).await;

        let (name, value) = auth_header(&client);
        let created = app
            .post("/api/v1/cases")
            .add_header(name, value)
            .json(&json!({
                "lawyer_id": lawyer.id,
                "title": "Tenancy dispute",
                "description": "Deposit withheld"
            }))
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = created.json();
        assert_eq!(body["status"], "REQUESTED");
        (client, lawyer_user, body["id"].as_str().unwrap().to_string())
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_case_lifecycle_via_api(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (client, lawyer_user, case_id) = open_case(&app, &pool).await;

        // The client cannot accept their own request
        let (name, value) = auth_header(&client);
        app.post(&format!("/api/v1/cases/{case_id}/accept"))
            .add_header(name, value)
            .await
            .assert_status_forbidden();

        // The lawyer accepts, resolves, and the client closes
        let (name, value) = auth_header(&lawyer_user);
        let accepted = app
            .post(&format!("/api/v1/cases/{case_id}/accept"))
            .add_header(name.clone(), value.clone())
            .await;
        accepted.assert_status_ok();
        let body: serde_json::Value = accepted.json();
        assert_eq!(body["status"], "OPEN");

        // Accepting twice conflicts
        app.post(&format!("/api/v1/cases/{case_id}/accept"))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(axum::http::StatusCode::CONFLICT);

        let resolved = app
            .post(&format!("/api/v1/cases/{case_id}/resolve"))
            .add_header(name, value)
            .await;
        resolved.assert_status_ok();

        let (name, value) = auth_header(&client);
        let closed = app
            .post(&format!("/api/v1/cases/{case_id}/close"))
            .add_header(name, value)
            .await;
        closed.assert_status_ok();
        let body: serde_json::Value = closed.json();
        assert_eq!(body["status"], "CLOSED");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_stranger_cannot_see_case(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (_client, _lawyer_user, case_id) = open_case(&app, &pool).await;
        let stranger = create_test_user(&pool, crate::api::models::users::Role::User).await;

        let (name, value) = auth_header(&stranger);
        app.get(&format!("/api/v1/cases/{case_id}"))
            .add_header(name, value)
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_case_payment_request_and_settlement(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (client, lawyer_user, case_id) = open_case(&app, &pool).await;

        let (lawyer_h, lawyer_v) = auth_header(&lawyer_user);
        app.post(&format!("/api/v1/cases/{case_id}/accept"))
            .add_header(lawyer_h.clone(), lawyer_v.clone())
            .await
            .assert_status_ok();

        // Only the lawyer can bill on the case
        let (client_h, client_v) = auth_header(&client);
        app.post(&format!("/api/v1/cases/{case_id}/payments"))
            .add_header(client_h.clone(), client_v.clone())
            .json(&json!({ "amount": "5000", "description": "Drafting fees" }))
            .await
            .assert_status_forbidden();

        let requested = app
            .post(&format!("/api/v1/cases/{case_id}/payments"))
            .add_header(lawyer_h.clone(), lawyer_v.clone())
            .json(&json!({ "amount": "5000", "description": "Drafting fees" }))
            .await;
        requested.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = requested.json();
        let payment_id = body["id"].as_str().unwrap().to_string();
        assert_eq!(body["status"], "PENDING");

        // Client pays through the simulated gateway and confirms
        let checkout = app
            .post(&format!("/api/v1/cases/{case_id}/payments/{payment_id}/checkout"))
            .add_header(client_h.clone(), client_v.clone())
            .await;
        checkout.assert_status_ok();

        let confirm = app
            .post(&format!("/api/v1/payments/{payment_id}/confirm"))
            .add_header(client_h.clone(), client_v.clone())
            .await;
        confirm.assert_status_ok();

        let listing = app
            .get(&format!("/api/v1/cases/{case_id}/payments"))
            .add_header(client_h, client_v)
            .await;
        listing.assert_status_ok();
        let body: serde_json::Value = listing.json();
        assert_eq!(body[0]["status"], "COMPLETED");
        assert!(!body[0]["paid_at"].is_null());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_no_payment_requests_on_closed_case(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (client, lawyer_user, case_id) = open_case(&app, &pool).await;

        let (lawyer_h, lawyer_v) = auth_header(&lawyer_user);
        app.post(&format!("/api/v1/cases/{case_id}/accept"))
            .add_header(lawyer_h.clone(), lawyer_v.clone())
            .await
            .assert_status_ok();

        let (client_h, client_v) = auth_header(&client);
        app.post(&format!("/api/v1/cases/{case_id}/close"))
            .add_header(client_h, client_v)
            .await
            .assert_status_ok();

        app.post(&format!("/api/v1/cases/{case_id}/payments"))
            .add_header(lawyer_h, lawyer_v)
            .json(&json!({ "amount": "1000" }))
            .await
            .assert_status(axum::http::StatusCode::CONFLICT);
    }
}
