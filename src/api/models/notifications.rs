//! API request/response models for notifications.

use super::pagination::Pagination;
use crate::db::models::notifications::NotificationDBResponse;
use crate::types::{NotificationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: NotificationId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationDBResponse> for NotificationResponse {
    fn from(db: NotificationDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            kind: db.kind,
            title: db.title,
            body: db.body,
            read: db.read,
            created_at: db.created_at,
        }
    }
}

#[serde_with::serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListNotificationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only unread notifications
    #[serde_as(as = "Option<serde_with::DisplayFromStr>")]
    pub unread_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub marked: u64,
}
