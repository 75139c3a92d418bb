//! HTTP handlers for payment processing and webhook reconciliation.
//!
//! All money-state transitions funnel through [`reconcile_capture`],
//! [`reconcile_failure`], and [`reconcile_refund`]: the webhook handler and
//! the manual confirmation fallback apply exactly the same guarded updates,
//! so replays and races resolve to no-ops instead of double transitions.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::{
    api::models::{
        bookings::BookingStatus,
        pagination::PaginatedResponse,
        payments::{
            CheckoutResponse, ListPaymentsQuery, PaymentConfirmResponse, PaymentResponse, PaymentStatus,
        },
        users::CurrentUser,
    },
    db::{
        handlers::{payments::PaymentFilter, AuditLogs, Bookings, CasePayments, Cases, Payments, Repository},
        models::audit::AuditLogCreateDBRequest,
    },
    errors::{Error, Result},
    notifications::{self, spawn_notify},
    payment_providers::{self, WebhookEventKind},
    types::PaymentId,
    AppState,
};

fn provider_for(state: &AppState) -> Result<Box<dyn payment_providers::PaymentProvider>> {
    payment_providers::create_provider(&state.config).ok_or_else(|| Error::NotImplemented {
        message: "No payment provider is configured".to_string(),
    })
}

/// Start checkout for a booking payment
#[utoipa::path(
    post,
    path = "/payments/{id}/checkout",
    tag = "payments",
    params(("id" = String, Path, description = "Payment ID")),
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
pub async fn create_checkout(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
    current_user: CurrentUser,
) -> Result<Json<CheckoutResponse>> {
    let provider = provider_for(&state)?;

    let not_found = || Error::NotFound {
        resource: "Payment".to_string(),
        id: id.to_string(),
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut payments = Payments::new(&mut pool_conn);

    let payment = payments.get_by_id(id).await?.ok_or_else(not_found)?;
    if payment.payer_id != current_user.id && !current_user.is_admin() {
        return Err(not_found());
    }
    if !matches!(payment.status, PaymentStatus::Pending | PaymentStatus::Processing) {
        return Err(Error::Conflict {
            message: "This payment has already been processed".to_string(),
        });
    }

    let order = provider
        .create_order(&payment.id.to_string(), payment.amount, &payment.currency)
        .await?;

    payments
        .attach_provider_order(payment.id, provider.name(), &order.order_id)
        .await?
        .ok_or_else(|| Error::Conflict {
            message: "This payment has already been processed".to_string(),
        })?;

    Ok(Json(CheckoutResponse {
        checkout_url: order.checkout_url,
        order_id: order.order_id,
    }))
}

/// Manually confirm a payment (fallback while webhooks are delayed)
#[utoipa::path(
    post,
    path = "/payments/{id}/confirm",
    tag = "payments",
    params(("id" = String, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment state after reconciliation", body = PaymentConfirmResponse),
        (status = 400, description = "Payment not completed at the gateway"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
        (status = 501, description = "No payment provider configured"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
    current_user: CurrentUser,
) -> Result<Json<PaymentConfirmResponse>> {
    let provider = provider_for(&state)?;

    let not_found = || Error::NotFound {
        resource: "Payment".to_string(),
        id: id.to_string(),
    };

    // The id may name a booking payment or a case payment request; resolve
    // access and the gateway order either way.
    let (status, order_id) = {
        let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

        let mut payments = Payments::new(&mut pool_conn);
        if let Some(payment) = payments.get_by_id(id).await? {
            if payment.payer_id != current_user.id && !current_user.is_admin() {
                return Err(not_found());
            }
            (payment.status, payment.provider_order_id)
        } else {
            let mut case_payments = CasePayments::new(&mut pool_conn);
            let case_payment = case_payments.get_by_id(id).await?.ok_or_else(not_found)?;

            let mut cases = Cases::new(&mut pool_conn);
            let case = cases
                .get_by_id(case_payment.case_id)
                .await?
                .ok_or_else(not_found)?;
            if case.client_id != current_user.id && !current_user.is_admin() {
                return Err(not_found());
            }
            (case_payment.status, case_payment.provider_order_id)
        }
    };

    // Already reconciled: confirm is idempotent
    if status == PaymentStatus::Completed {
        return Ok(Json(PaymentConfirmResponse {
            status: PaymentStatus::Completed,
            message: "Payment already processed".to_string(),
        }));
    }

    let order_id = order_id.ok_or_else(|| Error::BadRequest {
        message: "Checkout has not been started for this payment".to_string(),
    })?;

    let order_state = provider.fetch_order(&order_id).await?;
    if !order_state.is_paid {
        return Err(payment_providers::PaymentError::PaymentNotCompleted.into());
    }

    reconcile_capture(&state, &order_id, order_state.payment_id.as_deref()).await?;

    Ok(Json(PaymentConfirmResponse {
        status: PaymentStatus::Completed,
        message: "Payment processed successfully".to_string(),
    }))
}

/// List payments (own; admin may pass `all=true`)
#[utoipa::path(
    get,
    path = "/payments",
    tag = "payments",
    params(ListPaymentsQuery),
    responses(
        (status = 200, description = "Paginated payments", body = PaginatedResponse<PaymentResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<PaymentResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    if query.all == Some(true) && !current_user.is_admin() {
        return Err(Error::InsufficientPermissions {
            required: crate::types::Permission::Allow(
                crate::types::Resource::Payments,
                crate::types::Operation::ReadAll,
            ),
            action: crate::types::Operation::ReadAll,
            resource: "all payments".to_string(),
        });
    }

    let filter = PaymentFilter {
        payer_id: if query.all == Some(true) {
            None
        } else {
            Some(current_user.id)
        },
        status: query.status,
        skip,
        limit,
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Payments::new(&mut pool_conn);

    let payments = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        payments.into_iter().map(PaymentResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Get a payment (payer, booking's lawyer, or admin)
#[utoipa::path(
    get,
    path = "/payments/{id}",
    tag = "payments",
    params(("id" = String, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment details", body = PaymentResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentId>,
    current_user: CurrentUser,
) -> Result<Json<PaymentResponse>> {
    let not_found = || Error::NotFound {
        resource: "Payment".to_string(),
        id: id.to_string(),
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut payments = Payments::new(&mut pool_conn);
    let payment = payments.get_by_id(id).await?.ok_or_else(not_found)?;

    if payment.payer_id != current_user.id && !current_user.is_admin() {
        // The lawyer on the booking may see it too
        let mut bookings = Bookings::new(&mut pool_conn);
        let booking = bookings.get_by_id(payment.booking_id).await?.ok_or_else(not_found)?;
        let mut lawyers = crate::db::handlers::Lawyers::new(&mut pool_conn);
        let lawyer = lawyers.get_by_id(booking.lawyer_id).await?.ok_or_else(not_found)?;
        if lawyer.user_id != current_user.id {
            return Err(not_found());
        }
    }

    Ok(Json(PaymentResponse::from(payment)))
}

/// Payment gateway webhook
///
/// Verifies the HMAC signature over the raw body, then applies the event
/// idempotently. Replays and unknown events are acknowledged with 200 so the
/// gateway stops retrying; a bad signature is the only rejection.
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    tag = "payments",
    request_body(content = String, description = "Raw webhook payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Event processed or ignored"),
        (status = 400, description = "Invalid signature"),
        (status = 501, description = "No payment provider configured"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn webhook_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<StatusCode> {
    let provider = provider_for(&state)?;

    let Some(event) = provider.verify_webhook(&headers, &body)? else {
        // Provider without webhooks; nothing to do
        return Ok(StatusCode::OK);
    };

    tracing::info!("Received payment webhook event: {:?}", event.kind);

    let Some(order_id) = event.order_id.as_deref() else {
        tracing::debug!("Webhook event without order id, ignoring");
        return Ok(StatusCode::OK);
    };

    match event.kind {
        WebhookEventKind::PaymentCaptured => {
            reconcile_capture(&state, order_id, event.payment_id.as_deref()).await?;
        }
        WebhookEventKind::PaymentFailed => {
            reconcile_failure(&state, order_id, event.reason.as_deref()).await?;
        }
        WebhookEventKind::RefundProcessed => {
            reconcile_refund(&state, order_id).await?;
        }
        WebhookEventKind::Other(kind) => {
            tracing::debug!("Ignoring webhook event type: {kind}");
        }
    }

    Ok(StatusCode::OK)
}

/// Apply a capture to whichever payment the order id belongs to.
/// Safe to call repeatedly: guarded updates make replays no-ops.
pub(crate) async fn reconcile_capture(state: &AppState, order_id: &str, provider_payment_id: Option<&str>) -> Result<()> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut payments = Payments::new(&mut tx);
    if let Some(payment) = payments.get_by_provider_order(order_id).await? {
        let applied = payments.mark_completed(payment.id, provider_payment_id).await?;
        if applied.is_none() {
            tracing::debug!("Capture for order {order_id} already applied, skipping");
            tx.commit().await.map_err(|e| Error::Database(e.into()))?;
            return Ok(());
        }

        // Money received: the consultation is on
        let mut bookings = Bookings::new(&mut tx);
        bookings
            .transition(payment.booking_id, &[BookingStatus::Pending], BookingStatus::Confirmed)
            .await?;

        let mut audit = AuditLogs::new(&mut tx);
        audit
            .record(&AuditLogCreateDBRequest {
                actor_id: None,
                action: "payment.captured".to_string(),
                entity_type: "payment".to_string(),
                entity_id: payment.id.to_string(),
                detail: Some(serde_json::json!({ "provider_order_id": order_id })),
            })
            .await?;

        tx.commit().await.map_err(|e| Error::Database(e.into()))?;

        spawn_notify(
            state.db.clone(),
            payment.payer_id,
            notifications::kind::BOOKING_CONFIRMED,
            "Payment received".to_string(),
            Some("Your payment completed and the consultation is confirmed.".to_string()),
        );
        return Ok(());
    }

    let mut case_payments = CasePayments::new(&mut tx);
    if let Some(case_payment) = case_payments.get_by_provider_order(order_id).await? {
        let applied = case_payments.mark_completed(case_payment.id).await?;

        let mut audit = AuditLogs::new(&mut tx);
        audit
            .record(&AuditLogCreateDBRequest {
                actor_id: None,
                action: "case_payment.captured".to_string(),
                entity_type: "case_payment".to_string(),
                entity_id: case_payment.id.to_string(),
                detail: Some(serde_json::json!({ "provider_order_id": order_id })),
            })
            .await?;

        tx.commit().await.map_err(|e| Error::Database(e.into()))?;

        if applied.is_some() {
            spawn_notify(
                state.db.clone(),
                case_payment.requested_by,
                notifications::kind::CASE_PAYMENT_COMPLETED,
                "Payment request settled".to_string(),
                Some("A payment you requested has been completed.".to_string()),
            );
        }
        return Ok(());
    }

    tracing::warn!("Capture webhook for unknown order {order_id}");
    Ok(())
}

pub(crate) async fn reconcile_failure(state: &AppState, order_id: &str, reason: Option<&str>) -> Result<()> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut payments = Payments::new(&mut conn);
    if let Some(payment) = payments.get_by_provider_order(order_id).await? {
        if payments.mark_failed(payment.id, reason).await?.is_some() {
            spawn_notify(
                state.db.clone(),
                payment.payer_id,
                notifications::kind::PAYMENT_FAILED,
                "Payment failed".to_string(),
                reason.map(|r| r.to_string()),
            );
        }
        return Ok(());
    }

    let mut case_payments = CasePayments::new(&mut conn);
    if let Some(case_payment) = case_payments.get_by_provider_order(order_id).await? {
        case_payments.mark_failed(case_payment.id).await?;
        return Ok(());
    }

    tracing::warn!("Failure webhook for unknown order {order_id}");
    Ok(())
}

pub(crate) async fn reconcile_refund(state: &AppState, order_id: &str) -> Result<()> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut payments = Payments::new(&mut tx);
    let Some(payment) = payments.get_by_provider_order(order_id).await? else {
        tracing::warn!("Refund webhook for unknown order {order_id}");
        return Ok(());
    };

    if payments.mark_refunded(payment.id).await?.is_none() {
        tracing::debug!("Refund for order {order_id} already applied or not applicable");
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        return Ok(());
    }

    // A refunded consultation is off
    let mut bookings = Bookings::new(&mut tx);
    bookings
        .transition(
            payment.booking_id,
            &[BookingStatus::Pending, BookingStatus::Confirmed],
            BookingStatus::Cancelled,
        )
        .await?;

    let mut audit = AuditLogs::new(&mut tx);
    audit
        .record(&AuditLogCreateDBRequest {
            actor_id: None,
            action: "payment.refunded".to_string(),
            entity_type: "payment".to_string(),
            entity_id: payment.id.to_string(),
            detail: Some(serde_json::json!({ "provider_order_id": order_id })),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    spawn_notify(
        state.db.clone(),
        payment.payer_id,
        notifications::kind::PAYMENT_REFUNDED,
        "Payment refunded".to_string(),
        Some("Your payment was refunded and the consultation cancelled.".to_string()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::payment_providers::razorpay;
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    const WEBHOOK_SECRET: &str = "whsec_handler_test";

    fn razorpay_config() -> crate::config::Config {
        crate::config::Config {
            payment: Some(crate::config::PaymentConfig::Razorpay(crate::config::RazorpayConfig {
                key_id: "rzp_test".to_string(),
                key_secret: "secret".to_string(),
                webhook_secret: WEBHOOK_SECRET.to_string(),
                base_url: "http://razorpay.invalid".to_string(),
            })),
            ..create_test_config()
        }
    }

    /// Book through the API and return (client, booking_id, payment_id).
    async fn seed_booking(app: &axum_test::TestServer, pool: &PgPool) -> (crate::api::models::users::UserResponse, String, String) {
        let client = create_test_user(pool, crate::api::models::users::Role::User).await;
        let (_lawyer_user, lawyer) = create_test_lawyer(pool, true).await;

        let (name, value) = auth_header(&client);
        let created = app
            .post("/api/v1/bookings")
            .add_header(name, value)
            .json(&json!({
                "lawyer_id": lawyer.id,
                "scheduled_at": (chrono::Utc::now() + chrono::Duration::days(1)).to_rfc3339(),
                "duration_minutes": 60
            }))
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = created.json();
        (
            client,
            body["booking"]["id"].as_str().unwrap().to_string(),
            body["payment"]["id"].as_str().unwrap().to_string(),
        )
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_dummy_checkout_and_confirm_flow(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (client, booking_id, payment_id) = seed_booking(&app, &pool).await;
        let (name, value) = auth_header(&client);

        // Start checkout: the simulated gateway redirects straight to success
        let checkout = app
            .post(&format!("/api/v1/payments/{payment_id}/checkout"))
            .add_header(name.clone(), value.clone())
            .await;
        checkout.assert_status_ok();
        let body: serde_json::Value = checkout.json();
        assert!(body["checkout_url"].as_str().unwrap().contains("status=success"));

        // Manual confirmation reconciles the payment and confirms the booking
        let confirm = app
            .post(&format!("/api/v1/payments/{payment_id}/confirm"))
            .add_header(name.clone(), value.clone())
            .await;
        confirm.assert_status_ok();
        let body: serde_json::Value = confirm.json();
        assert_eq!(body["status"], "COMPLETED");

        let booking = app
            .get(&format!("/api/v1/bookings/{booking_id}"))
            .add_header(name.clone(), value.clone())
            .await;
        let body: serde_json::Value = booking.json();
        assert_eq!(body["status"], "CONFIRMED");

        // Confirm again: idempotent
        let again = app
            .post(&format!("/api/v1/payments/{payment_id}/confirm"))
            .add_header(name.clone(), value.clone())
            .await;
        again.assert_status_ok();
        let body: serde_json::Value = again.json();
        assert_eq!(body["message"], "Payment already processed");

        // And checkout on a settled payment conflicts
        let recheckout = app
            .post(&format!("/api/v1/payments/{payment_id}/checkout"))
            .add_header(name, value)
            .await;
        recheckout.assert_status(axum::http::StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_stranger_cannot_start_checkout(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (_client, _booking_id, payment_id) = seed_booking(&app, &pool).await;
        let stranger = create_test_user(&pool, crate::api::models::users::Role::User).await;

        let (name, value) = auth_header(&stranger);
        let response = app
            .post(&format!("/api/v1/payments/{payment_id}/checkout"))
            .add_header(name, value)
            .await;
        response.assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_rejects_bad_signature(pool: PgPool) {
        let app = create_test_app_with_config(pool, razorpay_config()).await;

        let body = json!({ "event": "payment.captured", "payload": {} }).to_string();
        let response = app
            .post("/webhooks/payments")
            .add_header("x-razorpay-signature", "deadbeef")
            .bytes(body.into_bytes().into())
            .await;
        response.assert_status_bad_request();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_capture_is_idempotent(pool: PgPool) {
        let app = create_test_app_with_config(pool.clone(), razorpay_config()).await;
        let (client, booking_id, payment_id) = seed_booking(&app, &pool).await;

        // Simulate an earlier checkout that registered the gateway order
        {
            let mut conn = pool.acquire().await.unwrap();
            let mut payments = crate::db::handlers::Payments::new(&mut conn);
            payments
                .attach_provider_order(payment_id.parse().unwrap(), "razorpay", "order_webhook_test")
                .await
                .unwrap()
                .unwrap();
        }

        let body = json!({
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_webhook",
                        "order_id": "order_webhook_test",
                        "status": "captured"
                    }
                }
            }
        })
        .to_string();
        let signature = razorpay::sign_payload(body.as_bytes(), WEBHOOK_SECRET);

        for _ in 0..3 {
            let response = app
                .post("/webhooks/payments")
                .add_header("x-razorpay-signature", signature.clone())
                .bytes(body.clone().into_bytes().into())
                .await;
            response.assert_status_ok();
        }

        let (name, value) = auth_header(&client);
        let payment = app
            .get(&format!("/api/v1/payments/{payment_id}"))
            .add_header(name.clone(), value.clone())
            .await;
        let payment_body: serde_json::Value = payment.json();
        assert_eq!(payment_body["status"], "COMPLETED");

        let booking = app
            .get(&format!("/api/v1/bookings/{booking_id}"))
            .add_header(name, value)
            .await;
        let booking_body: serde_json::Value = booking.json();
        assert_eq!(booking_body["status"], "CONFIRMED");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_refund_cancels_booking(pool: PgPool) {
        let app = create_test_app_with_config(pool.clone(), razorpay_config()).await;
        let (client, booking_id, payment_id) = seed_booking(&app, &pool).await;

        {
            let mut conn = pool.acquire().await.unwrap();
            let mut payments = crate::db::handlers::Payments::new(&mut conn);
            let payment_uuid: crate::types::PaymentId = payment_id.parse().unwrap();
            payments
                .attach_provider_order(payment_uuid, "razorpay", "order_refund_test")
                .await
                .unwrap()
                .unwrap();
            payments.mark_completed(payment_uuid, Some("pay_r")).await.unwrap().unwrap();
        }

        let body = json!({
            "event": "refund.processed",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_r",
                        "order_id": "order_refund_test",
                        "status": "refunded"
                    }
                }
            }
        })
        .to_string();
        let signature = razorpay::sign_payload(body.as_bytes(), WEBHOOK_SECRET);

        app.post("/webhooks/payments")
            .add_header("x-razorpay-signature", signature)
            .bytes(body.into_bytes().into())
            .await
            .assert_status_ok();

        let (name, value) = auth_header(&client);
        let payment = app
            .get(&format!("/api/v1/payments/{payment_id}"))
            .add_header(name.clone(), value.clone())
            .await;
        let payment_body: serde_json::Value = payment.json();
        assert_eq!(payment_body["status"], "REFUNDED");

        let booking = app
            .get(&format!("/api/v1/bookings/{booking_id}"))
            .add_header(name, value)
            .await;
        let booking_body: serde_json::Value = booking.json();
        assert_eq!(booking_body["status"], "CANCELLED");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_unknown_event_acknowledged(pool: PgPool) {
        let app = create_test_app_with_config(pool, razorpay_config()).await;

        let body = json!({ "event": "invoice.paid", "payload": {} }).to_string();
        let signature = razorpay::sign_payload(body.as_bytes(), WEBHOOK_SECRET);

        let response = app
            .post("/webhooks/payments")
            .add_header("x-razorpay-signature", signature)
            .bytes(body.into_bytes().into())
            .await;
        response.assert_status_ok();
    }
}
