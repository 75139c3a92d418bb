//! Database models for in-app notifications.

use crate::types::{NotificationId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct NotificationCreateDBRequest {
    pub user_id: UserId,
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationDBResponse {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
