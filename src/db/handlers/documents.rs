//! Database repository for stored documents.
//!
//! Metadata and content are selected separately so listings never drag blob
//! bytes across the wire.

use crate::types::{abbrev_uuid, CaseId, DocumentId, UserId};
use crate::db::{
    errors::Result,
    models::documents::{DocumentContentDBResponse, DocumentCreateDBRequest, DocumentDBResponse},
};
use sqlx::PgConnection;
use tracing::instrument;

const META_COLUMNS: &str = "id, owner_id, case_id, file_name, content_type, size_bytes, created_at";

pub struct Documents<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Documents<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id), size = request.content.len()), err)]
    pub async fn create(&mut self, request: &DocumentCreateDBRequest) -> Result<DocumentDBResponse> {
        let document = sqlx::query_as::<_, DocumentDBResponse>(&format!(
            r#"
            INSERT INTO documents (owner_id, case_id, file_name, content_type, size_bytes, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {META_COLUMNS}
            "#
        ))
        .bind(request.owner_id)
        .bind(request.case_id)
        .bind(&request.file_name)
        .bind(&request.content_type)
        .bind(request.content.len() as i64)
        .bind(&request.content)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(document)
    }

    pub async fn get_meta(&mut self, id: DocumentId) -> Result<Option<DocumentDBResponse>> {
        let document =
            sqlx::query_as::<_, DocumentDBResponse>(&format!("SELECT {META_COLUMNS} FROM documents WHERE id = $1"))
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(document)
    }

    #[instrument(skip(self), fields(document_id = %abbrev_uuid(&id)), err)]
    pub async fn get_content(&mut self, id: DocumentId) -> Result<Option<DocumentContentDBResponse>> {
        let document = sqlx::query_as::<_, DocumentContentDBResponse>(
            "SELECT id, owner_id, case_id, file_name, content_type, content FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(document)
    }

    pub async fn list_for_case(&mut self, case_id: CaseId) -> Result<Vec<DocumentDBResponse>> {
        let documents = sqlx::query_as::<_, DocumentDBResponse>(&format!(
            "SELECT {META_COLUMNS} FROM documents WHERE case_id = $1 ORDER BY created_at DESC"
        ))
        .bind(case_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(documents)
    }

    pub async fn list_for_owner(&mut self, owner_id: UserId) -> Result<Vec<DocumentDBResponse>> {
        let documents = sqlx::query_as::<_, DocumentDBResponse>(&format!(
            "SELECT {META_COLUMNS} FROM documents WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(documents)
    }

    pub async fn delete(&mut self, id: DocumentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
