//! WebSocket endpoints
//!
//! Two channels: `/ws/chat` (messaging) and `/ws/notifications` (push-only
//! new-content signals). Both authenticate with an `access_token` query
//! parameter before the upgrade; a failed validation is rejected with 401
//! and never creates a registry entry.
//!
//! Each accepted socket is split into a writer task fed by an unbounded
//! channel (the connection's handle in the presence registry) and a read
//! loop. On close, the registry entry is cleared only if this socket is
//! still the registered one, so a stale disconnect racing a reconnect
//! cannot wipe the newer handle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::UserInfo;
use crate::chat::presence::ClientHandle;
use crate::chat::protocol::{ClientFrame, ErrorPayload, PresenceChange, ServerFrame};
use crate::config::AppState;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct WsAuthParams {
    access_token: Option<String>,
}

/// GET /ws/chat
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    Query(params): Query<WsAuthParams>,
    State(state): State<AppState>,
) -> Result<Response> {
    let user = authenticate(&state, params).await?;
    info!("[Ws] chat connect: user {}", user.id);
    Ok(ws.on_upgrade(move |socket| chat_session(socket, state, user)))
}

/// GET /ws/notifications
pub async fn notifications_ws(
    ws: WebSocketUpgrade,
    Query(params): Query<WsAuthParams>,
    State(state): State<AppState>,
) -> Result<Response> {
    let user = authenticate(&state, params).await?;
    info!("[Ws] notifications connect: user {}", user.id);
    Ok(ws.on_upgrade(move |socket| notify_session(socket, state, user)))
}

async fn authenticate(state: &AppState, params: WsAuthParams) -> Result<UserInfo> {
    let token = params.access_token.ok_or(Error::AuthFailNoToken)?;
    state.auth.validate_session(&token).await
}

async fn chat_session(socket: WebSocket, state: AppState, user: UserInfo) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
    let conn_id = Uuid::new_v4();

    state
        .chat_presence
        .register(user.id, ClientHandle::new(conn_id, tx.clone()))
        .await;
    state
        .chat_presence
        .broadcast_except(user.id, ServerFrame::UserConnected(PresenceChange { user_id: user.id }))
        .await;

    // Writer task: drains the handle's channel into the socket. Ends when
    // the channel closes (disconnect or a superseding reconnect dropping
    // the old sender) or the socket goes away.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!("[Ws] dropping unserializable frame: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => {
                let reply = match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => dispatch(&state, &user, frame).await,
                    Err(e) => Err(Error::BadRequest(format!("malformed frame: {}", e))),
                };
                match reply {
                    Ok(Some(frame)) => {
                        let _ = tx.send(frame);
                    }
                    Ok(None) => {}
                    // Inline error; the connection stays open
                    Err(e) => {
                        let _ = tx.send(ServerFrame::Error(ErrorPayload {
                            message: e.to_string(),
                        }));
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Clear only if this socket still owns the registry entry
    if state.chat_presence.clear(user.id, conn_id).await {
        state
            .chat_presence
            .broadcast_except(
                user.id,
                ServerFrame::UserDisconnected(PresenceChange { user_id: user.id }),
            )
            .await;
    } else {
        debug!("[Ws] stale disconnect for user {}, newer handle kept", user.id);
    }

    writer.abort();
    info!("[Ws] chat disconnect: user {}", user.id);
}

async fn dispatch(
    state: &AppState,
    user: &UserInfo,
    frame: ClientFrame,
) -> Result<Option<ServerFrame>> {
    match frame {
        ClientFrame::SendMessage(payload) => {
            state
                .chat
                .send_message(user.id, payload.receiver_id, &payload.content)
                .await?;
            // Delivery (echo included) goes through the presence registry
            Ok(None)
        }
        ClientFrame::GetConversationHistory(req) => {
            let history = state
                .chat
                .conversation_history(user.id, req.other_user_id)
                .await?;
            Ok(Some(ServerFrame::ConversationHistory(history)))
        }
        ClientFrame::GetUserConversations => {
            let conversations = state.chat.user_conversations(user.id).await?;
            Ok(Some(ServerFrame::UserConversations(conversations)))
        }
    }
}

/// Push-only session: the client holds the socket open to receive
/// new-content signals; inbound frames are ignored.
async fn notify_session(socket: WebSocket, state: AppState, user: UserInfo) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
    let conn_id = Uuid::new_v4();

    state
        .feed_presence
        .register(user.id, ClientHandle::new(conn_id, tx))
        .await;

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(_) => continue,
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    state.feed_presence.clear(user.id, conn_id).await;
    writer.abort();
    info!("[Ws] notifications disconnect: user {}", user.id);
}
