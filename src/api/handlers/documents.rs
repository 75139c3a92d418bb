//! HTTP handlers for document upload, download, and listing.
//!
//! Content lives in Postgres; listings only ever move metadata.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    api::models::{documents::DocumentResponse, users::CurrentUser},
    db::{
        handlers::{AuditLogs, Cases, Documents},
        models::{audit::AuditLogCreateDBRequest, documents::DocumentCreateDBRequest},
    },
    errors::{Error, Result},
    types::{CaseId, DocumentId},
    AppState,
};

async fn check_case_participant(conn: &mut sqlx::PgConnection, case_id: CaseId, user: &CurrentUser) -> Result<()> {
    let mut cases = Cases::new(conn);
    let visible = cases.get_by_id(case_id).await?.is_some()
        && (user.is_admin() || cases.is_participant(case_id, user.id).await?);
    if visible {
        Ok(())
    } else {
        Err(Error::NotFound {
            resource: "Case".to_string(),
            id: case_id.to_string(),
        })
    }
}

/// Upload a document (multipart: `file`, optional `case_id`)
#[utoipa::path(
    post,
    path = "/documents",
    tag = "documents",
    responses(
        (status = 201, description = "Document stored", body = DocumentResponse),
        (status = 400, description = "Missing file or oversized upload"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Case not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn upload_document(
    State(state): State<AppState>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>)> {
    let mut case_id: Option<CaseId> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Invalid multipart request: {e}"),
    })? {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("case_id") => {
                let text = field.text().await.map_err(|e| Error::BadRequest {
                    message: format!("Invalid case_id field: {e}"),
                })?;
                case_id = Some(text.parse().map_err(|_| Error::BadRequest {
                    message: "case_id must be a UUID".to_string(),
                })?);
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .ok_or_else(|| Error::BadRequest {
                        message: "File part must carry a file name".to_string(),
                    })?;
                // Prefer the declared content type, fall back to the extension
                let content_type = field
                    .content_type()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| mime_guess::from_path(&file_name).first_or_octet_stream().to_string());
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| Error::BadRequest {
                        message: format!("Failed to read file: {e}"),
                    })?
                    .to_vec();
                file = Some((file_name, content_type, content));
            }
            _ => continue,
        }
    }

    let (file_name, content_type, content) = file.ok_or_else(|| Error::BadRequest {
        message: "Missing file part".to_string(),
    })?;

    if content.is_empty() {
        return Err(Error::BadRequest {
            message: "Uploaded file is empty".to_string(),
        });
    }
    if content.len() as u64 > state.config.documents.max_file_size {
        return Err(Error::BadRequest {
            message: format!(
                "File exceeds the {} byte upload limit",
                state.config.documents.max_file_size
            ),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // Attaching to a case requires being on the case
    if let Some(case_id) = case_id {
        check_case_participant(&mut pool_conn, case_id, &current_user).await?;
    }

    let mut repo = Documents::new(&mut pool_conn);
    let document = repo
        .create(&DocumentCreateDBRequest {
            owner_id: current_user.id,
            case_id,
            file_name,
            content_type,
            content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

/// Download a document (owner, case participants, admins)
#[utoipa::path(
    get,
    path = "/documents/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document bytes"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    current_user: CurrentUser,
) -> Result<Response> {
    let not_found = || Error::NotFound {
        resource: "Document".to_string(),
        id: id.to_string(),
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut repo = Documents::new(&mut pool_conn);
    let document = repo.get_content(id).await?.ok_or_else(not_found)?;

    let allowed = current_user.is_admin()
        || document.owner_id == current_user.id
        || match document.case_id {
            Some(case_id) => {
                let mut cases = Cases::new(&mut pool_conn);
                cases.is_participant(case_id, current_user.id).await?
            }
            None => false,
        };
    if !allowed {
        return Err(not_found());
    }

    let disposition = format!("attachment; filename=\"{}\"", document.file_name.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, document.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.content,
    )
        .into_response())
}

/// List a case's documents (participants)
#[utoipa::path(
    get,
    path = "/cases/{id}/documents",
    tag = "documents",
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Documents on the case", body = [DocumentResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_case_documents(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    current_user: CurrentUser,
) -> Result<Json<Vec<DocumentResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    check_case_participant(&mut pool_conn, id, &current_user).await?;

    let mut repo = Documents::new(&mut pool_conn);
    let documents = repo.list_for_case(id).await?;

    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

/// Delete a document (owner or admin)
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let not_found = || Error::NotFound {
        resource: "Document".to_string(),
        id: id.to_string(),
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut repo = Documents::new(&mut pool_conn);
    let document = repo.get_meta(id).await?.ok_or_else(not_found)?;

    if document.owner_id != current_user.id && !current_user.is_admin() {
        return Err(not_found());
    }

    repo.delete(id).await?;

    // An admin removing someone else's document leaves a trail
    if current_user.is_admin() && document.owner_id != current_user.id {
        let mut audit = AuditLogs::new(&mut pool_conn);
        audit
            .record(&AuditLogCreateDBRequest {
                actor_id: Some(current_user.id),
                action: "document.delete".to_string(),
                entity_type: "document".to_string(),
                entity_id: id.to_string(),
                detail: Some(serde_json::json!({ "file_name": document.file_name })),
            })
            .await?;
    }

    Ok(StatusCode::NO_CONTENT)
}
