//! API request/response models for case threads.

use super::pagination::Pagination;
use crate::db::models::cases::CaseDBResponse;
use crate::types::{CaseId, LawyerId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, ToSchema)]
#[sqlx(type_name = "case_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CaseStatus {
    Requested,
    Open,
    Resolved,
    Closed,
    Rejected,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CaseCreate {
    #[schema(value_type = String, format = "uuid")]
    pub lawyer_id: LawyerId,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CaseResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CaseId,
    #[schema(value_type = String, format = "uuid")]
    pub client_id: UserId,
    #[schema(value_type = String, format = "uuid")]
    pub lawyer_id: LawyerId,
    pub title: String,
    pub description: Option<String>,
    pub status: CaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CaseDBResponse> for CaseResponse {
    fn from(db: CaseDBResponse) -> Self {
        Self {
            id: db.id,
            client_id: db.client_id,
            lawyer_id: db.lawyer_id,
            title: db.title,
            description: db.description,
            status: db.status,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing cases
#[serde_with::serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListCasesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<CaseStatus>,
    /// Admin only: list every case instead of one's own
    #[serde_as(as = "Option<serde_with::DisplayFromStr>")]
    pub all: Option<bool>,
}
