//! Notification fan-out.
//!
//! Notification rows (and their optional emails) are side effects: the
//! originating request must not fail or block on them, so call sites go
//! through [`spawn_notify`] after their transaction commits.

use sqlx::PgPool;

use crate::db::handlers::Notifications;
use crate::db::models::notifications::NotificationCreateDBRequest;
use crate::types::UserId;

/// Well-known notification kinds.
pub mod kind {
    pub const BOOKING_CREATED: &str = "booking_created";
    pub const BOOKING_CONFIRMED: &str = "booking_confirmed";
    pub const BOOKING_CANCELLED: &str = "booking_cancelled";
    pub const PAYMENT_FAILED: &str = "payment_failed";
    pub const PAYMENT_REFUNDED: &str = "payment_refunded";
    pub const CASE_REQUESTED: &str = "case_requested";
    pub const CASE_UPDATED: &str = "case_updated";
    pub const CASE_PAYMENT_REQUESTED: &str = "case_payment_requested";
    pub const CASE_PAYMENT_COMPLETED: &str = "case_payment_completed";
    pub const VERIFICATION_DECIDED: &str = "verification_decided";
}

/// Write a notification row, logging instead of propagating failures.
pub async fn notify(db: &PgPool, user_id: UserId, kind: &str, title: String, body: Option<String>) {
    let mut conn = match db.acquire().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("Failed to acquire connection for notification: {e}");
            return;
        }
    };

    let mut repo = Notifications::new(&mut conn);
    if let Err(e) = repo
        .create(&NotificationCreateDBRequest {
            user_id,
            kind: kind.to_string(),
            title,
            body,
        })
        .await
    {
        tracing::warn!("Failed to record {kind} notification for user {user_id}: {e}");
    }
}

/// Fire-and-forget variant for request handlers.
pub fn spawn_notify(db: PgPool, user_id: UserId, kind: &'static str, title: String, body: Option<String>) {
    tokio::spawn(async move {
        notify(&db, user_id, kind, title, body).await;
    });
}
