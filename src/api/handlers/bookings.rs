//! HTTP handlers for bookings.
//!
//! Booking creation is the checkout transaction: price is recomputed from
//! the lawyer's stored rate, the slot-conflict check and the booking+payment
//! inserts run in one transaction, and the partial unique index turns any
//! race into a 409 instead of a double booking.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;

use crate::{
    api::models::{
        bookings::{
            BookingCheckoutResponse, BookingCreate, BookingResponse, BookingStatus, ListBookingsQuery,
        },
        lawyers::VerificationStatus,
        pagination::PaginatedResponse,
        payments::PaymentResponse,
        users::{CurrentUser, Role},
    },
    auth::permissions::{operation, resource, RequiresPermission},
    db::{
        handlers::{bookings::BookingFilter, Bookings, Lawyers, Payments, Users},
        models::{bookings::BookingCreateDBRequest, payments::PaymentCreateDBRequest},
    },
    db::handlers::Repository,
    email::EmailService,
    errors::{Error, Result},
    notifications::{self, spawn_notify},
    types::{BookingId, UserId},
    AppState,
};

/// Price a consultation from the hourly rate and duration.
pub fn price_consultation(rate_per_hour: Decimal, duration_minutes: i32) -> Decimal {
    (rate_per_hour * Decimal::from(duration_minutes) / Decimal::from(60)).round_dp(2)
}

fn booking_visible_to(booking_client: UserId, booking_lawyer_user: UserId, user: &CurrentUser) -> bool {
    user.is_admin() || booking_client == user.id || booking_lawyer_user == user.id
}

/// Book a consultation (client checkout)
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    request_body = BookingCreate,
    responses(
        (status = 201, description = "Booking and pending payment created", body = BookingCheckoutResponse),
        (status = 400, description = "Invalid slot, duration, or lawyer"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Slot already taken"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_booking(
    State(state): State<AppState>,
    perm: RequiresPermission<resource::Bookings, operation::CreateOwn>,
    Json(request): Json<BookingCreate>,
) -> Result<(StatusCode, Json<BookingCheckoutResponse>)> {
    let user = perm.user;

    if request.scheduled_at <= Utc::now() {
        return Err(Error::BadRequest {
            message: "Bookings must be scheduled in the future".to_string(),
        });
    }
    let bounds = &state.config.bookings;
    if request.duration_minutes < bounds.min_duration_minutes || request.duration_minutes > bounds.max_duration_minutes
    {
        return Err(Error::BadRequest {
            message: format!(
                "Duration must be between {} and {} minutes",
                bounds.min_duration_minutes, bounds.max_duration_minutes
            ),
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
            message: "You cannot book a consultation with yourself".to_string(),
        });
    }

    // Price comes from the stored rate; the request never carries an amount
    let amount = price_consultation(lawyer.consultation_rate, request.duration_minutes);

    let mut bookings = Bookings::new(&mut tx);
    if bookings.slot_taken(lawyer.id, request.scheduled_at).await? {
        return Err(Error::Conflict {
            message: "This slot is no longer available".to_string(),
        });
    }

    // A concurrent checkout between the read above and this insert lands on
    // the partial unique index and surfaces as the same 409
    let booking = bookings
        .create(&BookingCreateDBRequest {
            client_id: user.id,
            lawyer_id: lawyer.id,
            scheduled_at: request.scheduled_at,
            duration_minutes: request.duration_minutes,
            amount,
            currency: lawyer.currency.clone(),
            notes: request.notes,
        })
        .await?;

    let mut payments = Payments::new(&mut tx);
    let payment = payments
        .create(&PaymentCreateDBRequest {
            booking_id: booking.id,
            payer_id: user.id,
            amount,
            currency: lawyer.currency.clone(),
        })
        .await?;

    let mut lawyers = Lawyers::new(&mut tx);
    lawyers.adjust_bookings_count(lawyer.id, 1).await?;

    // Fetch the lawyer's account for the notification before committing
    let mut users = Users::new(&mut tx);
    let lawyer_account = users.get_by_id(lawyer.user_id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    spawn_notify(
        state.db.clone(),
        lawyer.user_id,
        notifications::kind::BOOKING_CREATED,
        "New consultation booked".to_string(),
        Some(format!(
            "{} booked a {}-minute consultation on {}",
            user.full_name,
            booking.duration_minutes,
            booking.scheduled_at.format("%Y-%m-%d %H:%M UTC")
        )),
    );

    // Confirmation email is best-effort
    let config = state.config.clone();
    let client_email = user.email.clone();
    let client_name = user.full_name.clone();
    let lawyer_name = lawyer_account.map(|a| a.full_name).unwrap_or_else(|| "your lawyer".to_string());
    let scheduled_at = booking.scheduled_at;
    tokio::spawn(async move {
        match EmailService::new(&config) {
            Ok(service) => {
                if let Err(e) = service
                    .send_booking_created_email(&client_email, Some(&client_name), &lawyer_name, &scheduled_at)
                    .await
                {
                    tracing::warn!("Failed to send booking confirmation email: {e}");
                }
            }
            Err(e) => tracing::warn!("Failed to create email service: {e}"),
        }
    });

    Ok((
        StatusCode::CREATED,
        Json(BookingCheckoutResponse {
            booking: BookingResponse::from(booking),
            payment: PaymentResponse::from(payment),
        }),
    ))
}

/// List bookings (own; admin may pass `all=true`)
#[utoipa::path(
    get,
    path = "/bookings",
    tag = "bookings",
    params(ListBookingsQuery),
    responses(
        (status = 200, description = "Paginated bookings", body = PaginatedResponse<BookingResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<ListBookingsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<BookingResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    if query.all == Some(true) && !current_user.is_admin() {
        return Err(Error::InsufficientPermissions {
            required: crate::types::Permission::Allow(
                crate::types::Resource::Bookings,
                crate::types::Operation::ReadAll,
            ),
            action: crate::types::Operation::ReadAll,
            resource: "all bookings".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut filter = BookingFilter {
        status: query.status,
        skip,
        limit,
        ..Default::default()
    };

    if query.all != Some(true) {
        match current_user.role {
            // Lawyers see the bookings on their profile, everyone else their own
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

    let mut repo = Bookings::new(&mut pool_conn);
    let bookings = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        bookings.into_iter().map(BookingResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Get a booking (participants and admins)
#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking details", body = BookingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<BookingResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let not_found = || Error::NotFound {
        resource: "Booking".to_string(),
        id: id.to_string(),
    };

    let mut repo = Bookings::new(&mut pool_conn);
    let booking = repo.get_by_id(id).await?.ok_or_else(not_found)?;

    let mut lawyers = Lawyers::new(&mut pool_conn);
    let lawyer = lawyers.get_by_id(booking.lawyer_id).await?.ok_or_else(not_found)?;

    if !booking_visible_to(booking.client_id, lawyer.user_id, &current_user) {
        return Err(not_found());
    }

    Ok(Json(BookingResponse::from(booking)))
}

/// Cancel a booking (either participant, while PENDING/CONFIRMED)
#[utoipa::path(
    post,
    path = "/bookings/{id}/cancel",
    tag = "bookings",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Cancelled booking", body = BookingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Booking is not cancellable"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<BookingResponse>> {
    let not_found = || Error::NotFound {
        resource: "Booking".to_string(),
        id: id.to_string(),
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut bookings = Bookings::new(&mut tx);
    let booking = bookings.get_by_id(id).await?.ok_or_else(not_found)?;

    let mut lawyers = Lawyers::new(&mut tx);
    let lawyer = lawyers.get_by_id(booking.lawyer_id).await?.ok_or_else(not_found)?;

    if !booking_visible_to(booking.client_id, lawyer.user_id, &current_user) {
        return Err(not_found());
    }

    let mut bookings = Bookings::new(&mut tx);
    let cancelled = bookings
        .transition(id, &[BookingStatus::Pending, BookingStatus::Confirmed], BookingStatus::Cancelled)
        .await?
        .ok_or_else(|| Error::Conflict {
            message: "Only pending or confirmed bookings can be cancelled".to_string(),
        })?;

    // A captured payment flips to refunded; an unpaid one is closed out
    let mut payments = Payments::new(&mut tx);
    if let Some(payment) = payments.get_by_booking(id).await? {
        match payment.status {
            crate::api::models::payments::PaymentStatus::Completed => {
                payments.mark_refunded(payment.id).await?;
            }
            crate::api::models::payments::PaymentStatus::Pending
            | crate::api::models::payments::PaymentStatus::Processing => {
                payments.mark_failed(payment.id, Some("Booking cancelled")).await?;
            }
            _ => {}
        }
    }

    let mut lawyers = Lawyers::new(&mut tx);
    lawyers.adjust_bookings_count(booking.lawyer_id, -1).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    // Tell the other side
    let counterparty = if current_user.id == booking.client_id {
        lawyer.user_id
    } else {
        booking.client_id
    };
    spawn_notify(
        state.db.clone(),
        counterparty,
        notifications::kind::BOOKING_CANCELLED,
        "Consultation cancelled".to_string(),
        Some(format!(
            "The consultation on {} was cancelled",
            booking.scheduled_at.format("%Y-%m-%d %H:%M UTC")
        )),
    );

    Ok(Json(BookingResponse::from(cancelled)))
}

/// Mark a booking completed (its lawyer, once CONFIRMED)
#[utoipa::path(
    post,
    path = "/bookings/{id}/complete",
    tag = "bookings",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Completed booking", body = BookingResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Booking is not confirmed"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn complete_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    current_user: CurrentUser,
) -> Result<Json<BookingResponse>> {
    let not_found = || Error::NotFound {
        resource: "Booking".to_string(),
        id: id.to_string(),
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut bookings = Bookings::new(&mut pool_conn);
    let booking = bookings.get_by_id(id).await?.ok_or_else(not_found)?;

    let mut lawyers = Lawyers::new(&mut pool_conn);
    let lawyer = lawyers.get_by_id(booking.lawyer_id).await?.ok_or_else(not_found)?;

    // Completion is the lawyer's call (or an admin's)
    if lawyer.user_id != current_user.id && !current_user.is_admin() {
        return Err(not_found());
    }

    let mut bookings = Bookings::new(&mut pool_conn);
    let completed = bookings
        .transition(id, &[BookingStatus::Confirmed], BookingStatus::Completed)
        .await?
        .ok_or_else(|| Error::Conflict {
            message: "Only confirmed bookings can be completed".to_string(),
        })?;

    let mut lawyers = Lawyers::new(&mut pool_conn);
    lawyers.adjust_bookings_count(booking.lawyer_id, -1).await?;

    Ok(Json(BookingResponse::from(completed)))
}


#[cfg(test)]
mod api_tests {
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    fn tomorrow() -> String {
        (chrono::Utc::now() + chrono::Duration::days(1)).to_rfc3339()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_checkout_creates_booking_and_pending_payment(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let client = create_test_user(&pool, crate::api::models::users::Role::User).await;
        let (_lawyer_user, lawyer) = create_test_lawyer(&pool, true).await;

        let (name, value) = auth_header(&client);
        let response = app
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({
                "lawyer_id": lawyer.id,
                "scheduled_at": tomorrow(),
                "duration_minutes": 60,
                "notes": "First consultation"
            }))
            .await;

        response.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["booking"]["status"], "PENDING");
        assert_eq!(body["payment"]["status"], "PENDING");
        // Price came from the stored rate: 1200/hr for 60 minutes
        assert_eq!(body["booking"]["amount"], "1200.00");
        assert_eq!(body["payment"]["amount"], "1200.00");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_double_booking_same_slot_conflicts(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let client_a = create_test_user(&pool, crate::api::models::users::Role::User).await;
        let client_b = create_test_user(&pool, crate::api::models::users::Role::User).await;
        let (_lawyer_user, lawyer) = create_test_lawyer(&pool, true).await;

        let slot = tomorrow();

        let (name, value) = auth_header(&client_a);
        app.post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({ "lawyer_id": lawyer.id, "scheduled_at": slot, "duration_minutes": 30 }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let (name, value) = auth_header(&client_b);
        let conflict = app
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({ "lawyer_id": lawyer.id, "scheduled_at": slot, "duration_minutes": 30 }))
            .await;
        conflict.assert_status(axum::http::StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unverified_lawyer_not_bookable(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let client = create_test_user(&pool, crate::api::models::users::Role::User).await;
        let (_lawyer_user, lawyer) = create_test_lawyer(&pool, false).await;

        let (name, value) = auth_header(&client);
        let response = app
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({ "lawyer_id": lawyer.id, "scheduled_at": tomorrow(), "duration_minutes": 30 }))
            .await;
        response.assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_lawyers_cannot_book(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (booker_user, _) = create_test_lawyer(&pool, true).await;
        let (_other_user, other_lawyer) = create_test_lawyer(&pool, true).await;

        let (name, value) = auth_header(&booker_user);
        let response = app
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({ "lawyer_id": other_lawyer.id, "scheduled_at": tomorrow(), "duration_minutes": 30 }))
            .await;
        response.assert_status_forbidden();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_past_slot_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let client = create_test_user(&pool, crate::api::models::users::Role::User).await;
        let (_lawyer_user, lawyer) = create_test_lawyer(&pool, true).await;

        let yesterday = (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339();
        let (name, value) = auth_header(&client);
        let response = app
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({ "lawyer_id": lawyer.id, "scheduled_at": yesterday, "duration_minutes": 30 }))
            .await;
        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_stranger_gets_404_for_foreign_booking(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let client = create_test_user(&pool, crate::api::models::users::Role::User).await;
        let stranger = create_test_user(&pool, crate::api::models::users::Role::User).await;
        let (_lawyer_user, lawyer) = create_test_lawyer(&pool, true).await;

        let (name, value) = auth_header(&client);
        let created = app
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({ "lawyer_id": lawyer.id, "scheduled_at": tomorrow(), "duration_minutes": 30 }))
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = created.json();
        let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

        let (name, value) = auth_header(&stranger);
        let response = app
            .get(&format!("/api/v1/bookings/{booking_id}"))
            .add_header(name, value)
            .await;
        response.assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_then_rebook(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let client = create_test_user(&pool, crate::api::models::users::Role::User).await;
        let (_lawyer_user, lawyer) = create_test_lawyer(&pool, true).await;

        let slot = tomorrow();
        let (name, value) = auth_header(&client);
        let created = app
            .post("/api/v1/bookings")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "lawyer_id": lawyer.id, "scheduled_at": slot, "duration_minutes": 30 }))
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = created.json();
        let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

        let cancelled = app
            .post(&format!("/api/v1/bookings/{booking_id}/cancel"))
            .add_header(name.clone(), value.clone())
            .await;
        cancelled.assert_status_ok();
        let body: serde_json::Value = cancelled.json();
        assert_eq!(body["status"], "CANCELLED");

        // The slot is free again
        app.post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({ "lawyer_id": lawyer.id, "scheduled_at": slot, "duration_minutes": 30 }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }
}
