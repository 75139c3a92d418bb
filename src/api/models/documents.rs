//! API request/response models for documents.

use crate::db::models::documents::DocumentDBResponse;
use crate::types::{CaseId, DocumentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DocumentId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: UserId,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub case_id: Option<CaseId>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<DocumentDBResponse> for DocumentResponse {
    fn from(db: DocumentDBResponse) -> Self {
        Self {
            id: db.id,
            owner_id: db.owner_id,
            case_id: db.case_id,
            file_name: db.file_name,
            content_type: db.content_type,
            size_bytes: db.size_bytes,
            created_at: db.created_at,
        }
    }
}
