//! API request/response models for chat messages.

use super::pagination::Pagination;
use crate::db::models::messages::MessageDBResponse;
use crate::types::{CaseId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MessageCreate {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MessageId,
    #[schema(value_type = String, format = "uuid")]
    pub case_id: CaseId,
    #[schema(value_type = String, format = "uuid")]
    pub sender_id: UserId,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageDBResponse> for MessageResponse {
    fn from(db: MessageDBResponse) -> Self {
        Self {
            id: db.id,
            case_id: db.case_id,
            sender_id: db.sender_id,
            body: db.body,
            read_at: db.read_at,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MarkReadResponse {
    /// How many messages flipped to read
    pub marked: u64,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListMessagesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}
