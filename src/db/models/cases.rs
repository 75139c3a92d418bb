//! Database models for case threads.

use crate::api::models::cases::CaseStatus;
use crate::types::{CaseId, LawyerId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct CaseCreateDBRequest {
    pub client_id: UserId,
    pub lawyer_id: LawyerId,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CaseDBResponse {
    pub id: CaseId,
    pub client_id: UserId,
    pub lawyer_id: LawyerId,
    pub title: String,
    pub description: Option<String>,
    pub status: CaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
