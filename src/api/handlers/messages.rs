//! HTTP handlers for case messages.
//!
//! REST and WebSocket share the `messages` table; a message created here is
//! also broadcast to the case's live room.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::models::{
        messages::{ListMessagesQuery, MarkReadResponse, MessageCreate, MessageResponse},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    chat::ServerEvent,
    db::{
        handlers::{Cases, Messages},
        models::messages::MessageCreateDBRequest,
    },
    errors::{Error, Result},
    types::CaseId,
    AppState,
};

async fn check_participant(conn: &mut sqlx::PgConnection, case_id: CaseId, user: &CurrentUser) -> Result<()> {
    let mut cases = Cases::new(conn);
    if cases.get_by_id(case_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Case".to_string(),
            id: case_id.to_string(),
        });
    }
    if user.is_admin() || cases.is_participant(case_id, user.id).await? {
        Ok(())
    } else {
        Err(Error::NotFound {
            resource: "Case".to_string(),
            id: case_id.to_string(),
        })
    }
}

/// List a case's messages, newest first (participants)
#[utoipa::path(
    get,
    path = "/cases/{id}/messages",
    tag = "messages",
    params(("id" = String, Path, description = "Case ID"), ListMessagesQuery),
    responses(
        (status = 200, description = "Paginated messages", body = PaginatedResponse<MessageResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    Query(query): Query<ListMessagesQuery>,
    current_user: CurrentUser,
) -> Result<Json<PaginatedResponse<MessageResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    check_participant(&mut pool_conn, id, &current_user).await?;

    let mut repo = Messages::new(&mut pool_conn);
    let messages = repo.list_for_case(id, skip, limit).await?;
    let total_count = repo.count_for_case(id).await?;

    Ok(Json(PaginatedResponse::new(
        messages.into_iter().map(MessageResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Send a message on a case (participants)
#[utoipa::path(
    post,
    path = "/cases/{id}/messages",
    tag = "messages",
    request_body = MessageCreate,
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 201, description = "Message created", body = MessageResponse),
        (status = 400, description = "Empty body"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_message(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    current_user: CurrentUser,
    Json(request): Json<MessageCreate>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let body = request.body.trim().to_string();
    if body.is_empty() {
        return Err(Error::BadRequest {
            message: "Message body cannot be empty".to_string(),
        });
    }

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    check_participant(&mut pool_conn, id, &current_user).await?;

    let mut repo = Messages::new(&mut pool_conn);
    let message = repo
        .create(&MessageCreateDBRequest {
            case_id: id,
            sender_id: current_user.id,
            body,
        })
        .await?;

    let response = MessageResponse::from(message);

    // Anyone connected to the room sees it immediately
    state.chat.broadcast(
        id,
        ServerEvent::Message {
            message: response.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(response)))
}

/// Mark the counterpart's messages read (participants)
#[utoipa::path(
    post,
    path = "/cases/{id}/messages/read",
    tag = "messages",
    params(("id" = String, Path, description = "Case ID")),
    responses(
        (status = 200, description = "Read receipt applied", body = MarkReadResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn mark_messages_read(
    State(state): State<AppState>,
    Path(id): Path<CaseId>,
    current_user: CurrentUser,
) -> Result<Json<MarkReadResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    check_participant(&mut pool_conn, id, &current_user).await?;

    let mut repo = Messages::new(&mut pool_conn);
    let marked = repo.mark_read(id, current_user.id).await?;

    if marked > 0 {
        state.chat.broadcast(
            id,
            ServerEvent::Read {
                case_id: id,
                reader_id: current_user.id,
            },
        );
    }

    Ok(Json(MarkReadResponse { marked }))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use serde_json::json;
    use sqlx::PgPool;

    async fn open_case(
        app: &axum_test::TestServer,
        pool: &PgPool,
    ) -> (
        crate::api::models::users::UserResponse,
        crate::api::models::users::UserResponse,
        String,
    ) {
        let client = create_test_user(pool, crate::api::models::users::Role::User).await;
        let (lawyer_user, lawyer) = create_test_lawyer(pool, true).await;

        let (name, value) = auth_header(&client);
        let created = app
            .post("/api/v1/cases")
            .add_header(name, value)
            .json(&json!({ "lawyer_id": lawyer.id, "title": "Contract review" }))
            .await;
        created.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = created.json();
        (client, lawyer_user, body["id"].as_str().unwrap().to_string())
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_message_exchange_and_read_receipts(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (client, lawyer_user, case_id) = open_case(&app, &pool).await;

        let (client_h, client_v) = auth_header(&client);
        let sent = app
            .post(&format!("/api/v1/cases/{case_id}/messages"))
            .add_header(client_h.clone(), client_v.clone())
            .json(&json!({ "body": "Hello, could you review my agreement?" }))
            .await;
        sent.assert_status(axum::http::StatusCode::CREATED);

        let (lawyer_h, lawyer_v) = auth_header(&lawyer_user);
        app.post(&format!("/api/v1/cases/{case_id}/messages"))
            .add_header(lawyer_h.clone(), lawyer_v.clone())
            .json(&json!({ "body": "Of course, send it over." }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        // Newest first
        let listing = app
            .get(&format!("/api/v1/cases/{case_id}/messages"))
            .add_header(client_h.clone(), client_v.clone())
            .await;
        listing.assert_status_ok();
        let body: serde_json::Value = listing.json();
        assert_eq!(body["total_count"], 2);
        assert_eq!(body["data"][0]["body"], "Of course, send it over.");
        assert!(body["data"][0]["read_at"].is_null());

        // Client reads the lawyer's message; only that one flips
        let read = app
            .post(&format!("/api/v1/cases/{case_id}/messages/read"))
            .add_header(client_h.clone(), client_v.clone())
            .await;
        read.assert_status_ok();
        let body: serde_json::Value = read.json();
        assert_eq!(body["marked"], 1);

        // Re-reading is a no-op
        let read_again = app
            .post(&format!("/api/v1/cases/{case_id}/messages/read"))
            .add_header(client_h, client_v)
            .await;
        let body: serde_json::Value = read_again.json();
        assert_eq!(body["marked"], 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_strangers_cannot_read_or_write(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (_client, _lawyer_user, case_id) = open_case(&app, &pool).await;
        let stranger = create_test_user(&pool, crate::api::models::users::Role::User).await;

        let (name, value) = auth_header(&stranger);
        app.get(&format!("/api/v1/cases/{case_id}/messages"))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status_not_found();

        app.post(&format!("/api/v1/cases/{case_id}/messages"))
            .add_header(name, value)
            .json(&json!({ "body": "let me in" }))
            .await
            .assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_empty_message_rejected(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (client, _lawyer_user, case_id) = open_case(&app, &pool).await;

        let (name, value) = auth_header(&client);
        app.post(&format!("/api/v1/cases/{case_id}/messages"))
            .add_header(name, value)
            .json(&json!({ "body": "   " }))
            .await
            .assert_status_bad_request();
    }
}
