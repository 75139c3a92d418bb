//! API request/response models for the audit trail.

use super::pagination::Pagination;
use crate::db::models::audit::AuditLogDBResponse;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditLogResponse {
    pub id: i64,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub actor_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    #[schema(value_type = Option<Object>)]
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLogDBResponse> for AuditLogResponse {
    fn from(db: AuditLogDBResponse) -> Self {
        Self {
            id: db.id,
            actor_id: db.actor_id,
            action: db.action,
            entity_type: db.entity_type,
            entity_id: db.entity_id,
            detail: db.detail,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListAuditLogsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub action: Option<String>,
    pub entity_type: Option<String>,
}
