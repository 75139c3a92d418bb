//! WebSocket connection lifecycle.

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::{
    api::models::{messages::MessageResponse, users::{CurrentUser, Role}},
    auth::session,
    chat::protocol::{ClientEvent, ServerEvent},
    db::handlers::{Cases, Messages},
    db::models::messages::MessageCreateDBRequest,
    errors::{Error, Result},
    types::CaseId,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session JWT; the WebSocket handshake can't carry an Authorization
    /// header from browsers, so the token rides in the query string.
    pub token: String,
}

/// `GET /ws/chat?token=<jwt>` — authenticate, then upgrade.
#[instrument(skip_all)]
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let user = session::verify_session_token(&query.token, &state.config)?;

    debug!("Chat connection for user {}", user.id);
    Ok(ws.on_upgrade(move |socket| handle_socket(state, user, socket)))
}

/// Per-connection state: joined rooms and their forwarding tasks.
struct Connection {
    user: CurrentUser,
    joined: HashMap<CaseId, JoinHandle<()>>,
    outbound: mpsc::Sender<ServerEvent>,
}

async fn handle_socket(state: AppState, user: CurrentUser, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<ServerEvent>(32);

    let mut connection = Connection {
        user,
        joined: HashMap::new(),
        outbound,
    };

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_frame(&state, &mut connection, text.as_str()).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    // Ping/pong and binary frames need no handling
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Chat socket error for user {}: {e}", connection.user.id);
                        break;
                    }
                }
            }
            event = outbound_rx.recv() => {
                let Some(event) = event else { break };
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Failed to encode chat frame: {e}");
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(payload.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    for handle in connection.joined.values() {
        handle.abort();
    }
    debug!("Chat connection closed for user {}", connection.user.id);
}

async fn handle_frame(state: &AppState, connection: &mut Connection, raw: &str) {
    let event: ClientEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            send_error(connection, format!("Unrecognized frame: {e}")).await;
            return;
        }
    };

    let result = match event {
        ClientEvent::JoinCase { case_id } => join_case(state, connection, case_id).await,
        ClientEvent::SendMessage { case_id, body } => send_message(state, connection, case_id, body).await,
        ClientEvent::Typing { case_id } => typing(state, connection, case_id).await,
        ClientEvent::MarkRead { case_id } => mark_read(state, connection, case_id).await,
    };

    if let Err(e) = result {
        send_error(connection, e.user_message()).await;
    }
}

async fn send_error(connection: &Connection, message: String) {
    let _ = connection
        .outbound
        .send(ServerEvent::Error { message })
        .await;
}

/// Participation gate shared by every room operation. Admins may observe.
async fn check_access(state: &AppState, user: &CurrentUser, case_id: CaseId) -> Result<()> {
    if matches!(user.role, Role::Admin) {
        return Ok(());
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut cases = Cases::new(&mut conn);
    if cases.is_participant(case_id, user.id).await? {
        Ok(())
    } else {
        // Non-participants can't learn whether the case exists
        Err(Error::NotFound {
            resource: "Case".to_string(),
            id: case_id.to_string(),
        })
    }
}

async fn join_case(state: &AppState, connection: &mut Connection, case_id: CaseId) -> Result<()> {
    if connection.joined.contains_key(&case_id) {
        let _ = connection.outbound.send(ServerEvent::Joined { case_id }).await;
        return Ok(());
    }

    check_access(state, &connection.user, case_id).await?;

    let mut room_rx = state.chat.subscribe(case_id);
    let outbound = connection.outbound.clone();
    let forward = tokio::spawn(async move {
        loop {
            match room_rx.recv().await {
                Ok(event) => {
                    if outbound.send(event).await.is_err() {
                        break;
                    }
                }
                // Dropped frames on lag; the client catches up over REST
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Chat subscriber lagged, skipped {skipped} frames");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    connection.joined.insert(case_id, forward);
    let _ = connection.outbound.send(ServerEvent::Joined { case_id }).await;
    Ok(())
}

fn require_joined(connection: &Connection, case_id: CaseId) -> Result<()> {
    if connection.joined.contains_key(&case_id) {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: "Join the case before interacting with it".to_string(),
        })
    }
}

async fn send_message(state: &AppState, connection: &mut Connection, case_id: CaseId, body: String) -> Result<()> {
    require_joined(connection, case_id)?;

    let body = body.trim().to_string();
    if body.is_empty() {
        return Err(Error::BadRequest {
            message: "Message body cannot be empty".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut messages = Messages::new(&mut conn);
    let message = messages
        .create(&MessageCreateDBRequest {
            case_id,
            sender_id: connection.user.id,
            body,
        })
        .await?;

    state.chat.broadcast(
        case_id,
        ServerEvent::Message {
            message: MessageResponse::from(message),
        },
    );
    Ok(())
}

async fn typing(state: &AppState, connection: &mut Connection, case_id: CaseId) -> Result<()> {
    require_joined(connection, case_id)?;
    state.chat.broadcast(
        case_id,
        ServerEvent::Typing {
            case_id,
            user_id: connection.user.id,
        },
    );
    Ok(())
}

async fn mark_read(state: &AppState, connection: &mut Connection, case_id: CaseId) -> Result<()> {
    require_joined(connection, case_id)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut messages = Messages::new(&mut conn);
    let flipped = messages.mark_read(case_id, connection.user.id).await?;

    // Only announce when something actually changed
    if flipped > 0 {
        state.chat.broadcast(
            case_id,
            ServerEvent::Read {
                case_id,
                reader_id: connection.user.id,
            },
        );
    }
    Ok(())
}
