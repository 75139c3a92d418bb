//! Database models for stored documents.

use crate::types::{CaseId, DocumentId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct DocumentCreateDBRequest {
    pub owner_id: UserId,
    pub case_id: Option<CaseId>,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Document metadata without the content bytes.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentDBResponse {
    pub id: DocumentId,
    pub owner_id: UserId,
    pub case_id: Option<CaseId>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Full document row including content, for downloads.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentContentDBResponse {
    pub id: DocumentId,
    pub owner_id: UserId,
    pub case_id: Option<CaseId>,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}
