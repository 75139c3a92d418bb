//! Database models for chat messages.

use crate::types::{CaseId, MessageId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct MessageCreateDBRequest {
    pub case_id: CaseId,
    pub sender_id: UserId,
    pub body: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageDBResponse {
    pub id: MessageId,
    pub case_id: CaseId,
    pub sender_id: UserId,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
