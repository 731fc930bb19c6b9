// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket session handling.
//!
//! The handshake authenticates via a `token` query parameter before any
//! frame is processed; failure closes the socket with code 1008. After
//! authentication the server sends `connected` and `rate_limit_info`
//! frames, then enters the read loop. One generation per connection; ping
//! is answered in any state; disconnect cancels in-flight work.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ConnectInfo, Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use gatehouse_core::{
    ChatId, ConnectionId, Decision, ErrorCode, UserId, Violation,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dispatcher::StreamDispatcher;
use crate::protocol::{ClientFrame, HandshakeFrame, ServerFrame};
use crate::registry::SessionConnection;
use crate::server::GatewayState;

/// Policy-violation close code sent on a failed handshake.
const CLOSE_POLICY_VIOLATION: u16 = 1008;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    token: Option<String>,
}

/// Client attributes captured at upgrade time, attached to violations.
#[derive(Debug, Clone)]
struct ClientMeta {
    ip_address: Option<String>,
    user_agent: Option<String>,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<GatewayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let meta = ClientMeta {
        ip_address: Some(addr.ip().to_string()),
        user_agent: headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token, meta))
}

async fn handle_socket(
    socket: WebSocket,
    state: GatewayState,
    token: Option<String>,
    meta: ClientMeta,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Authenticate before anything else; fail closed with 1008.
    let token = token.unwrap_or_default();
    let user = match state.validator.validate(&token).await {
        Ok(user) => user,
        Err(e) => {
            debug!(error = %e, "websocket handshake rejected");
            let _ = ws_sender
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_POLICY_VIOLATION,
                    reason: "authentication failed".into(),
                })))
                .await;
            return;
        }
    };

    let connection_id = ConnectionId(uuid::Uuid::new_v4().to_string());
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(64);
    let session = Arc::new(SessionConnection::new(
        connection_id.clone(),
        user.clone(),
        tx,
    ));
    state.registry.insert(session.clone());
    info!(user = %user, connection = %connection_id, "websocket connected");

    // Writer task: serialize frames onto the socket.
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    send_handshake(&state, &session).await;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let frame: ClientFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(user = %session.user, error = %e, "invalid client frame");
                        session
                            .send(ServerFrame::error(
                                ErrorCode::InvalidMessage,
                                "malformed frame",
                            ))
                            .await;
                        continue;
                    }
                };
                match frame {
                    // Pong is always answered, generating or not.
                    ClientFrame::Ping => {
                        session.send(ServerFrame::pong()).await;
                    }
                    ClientFrame::Message { chat_id, message } => {
                        handle_message(&state, &session, chat_id, message, &meta).await;
                    }
                }
            }
            Message::Close(_) => break,
            // Binary frames are not part of the protocol; ws-level
            // ping/pong is handled by the transport.
            _ => {}
        }
    }

    // Disconnect: remove from the registry (cancelling any in-flight
    // generation) and stop the writer.
    state.registry.remove(&connection_id);
    sender_task.abort();
    info!(user = %session.user, connection = %connection_id, "websocket disconnected");
}

async fn send_handshake(state: &GatewayState, session: &Arc<SessionConnection>) {
    session
        .send(ServerFrame::Handshake(HandshakeFrame::Connected {
            user_id: session.user.0.clone(),
            server_version: gatehouse_core::VERSION.to_string(),
        }))
        .await;

    match state.guard.usage(&session.user, None).await {
        Ok(snapshot) => {
            session
                .send(ServerFrame::Handshake(HandshakeFrame::RateLimitInfo {
                    usage: snapshot.current,
                    limits: snapshot.limits,
                }))
                .await;
        }
        Err(e) => warn!(user = %session.user, error = %e, "usage snapshot unavailable"),
    }
}

async fn handle_message(
    state: &GatewayState,
    session: &Arc<SessionConnection>,
    chat_id: String,
    message: String,
    meta: &ClientMeta,
) {
    if message.trim().is_empty() || chat_id.trim().is_empty() {
        session
            .send(ServerFrame::error(
                ErrorCode::InvalidMessage,
                "chat_id and message must be non-empty",
            ))
            .await;
        return;
    }

    // One generation per connection; a second message is rejected, never
    // queued.
    if session.is_generating() {
        session
            .send(ServerFrame::error(
                ErrorCode::AlreadyProcessing,
                "a message is already being processed on this connection",
            ))
            .await;
        return;
    }

    let chat = ChatId(chat_id);
    match state.guard.admit(&session.user, &chat).await {
        Err(e) => {
            // Fail closed: the store being down blocks the prompt with its
            // own code, and no violation row is written.
            warn!(user = %session.user, error = %e, "admission store unavailable");
            session
                .send(ServerFrame::error(
                    ErrorCode::StoreUnavailable,
                    "unable to verify usage limits, try again shortly",
                ))
                .await;
        }
        Ok(Decision::Block {
            scope,
            limit,
            prompts_used,
        }) => {
            state.recorder.record(Violation {
                user_id: session.user.clone(),
                chat_id: Some(chat),
                scope,
                limit_value: limit,
                prompts_used,
                decided_action: "blocked".to_string(),
                user_message: Some(message),
                ip_address: meta.ip_address.clone(),
                user_agent: meta.user_agent.clone(),
                occurred_at: Utc::now(),
            });
            session
                .send(ServerFrame::error(
                    scope.error_code(),
                    format!("rate limit exceeded ({prompts_used}/{limit})"),
                ))
                .await;
        }
        Ok(Decision::Allow(_)) => {
            let Some(cancel) = session.try_begin_generation() else {
                session
                    .send(ServerFrame::error(
                        ErrorCode::AlreadyProcessing,
                        "a message is already being processed on this connection",
                    ))
                    .await;
                return;
            };

            let (events_tx, events_rx) = mpsc::channel(64);
            let dispatcher = StreamDispatcher::new(session.outbound_sender());
            let pipeline = state.pipeline.clone();
            let user = session.user.clone();
            let session = session.clone();
            tokio::spawn(async move {
                let run = pipeline.run(&user, &chat, &message, cancel, events_tx);
                let forward = dispatcher.forward(events_rx);
                tokio::join!(run, forward);
                // Back to idle whichever way the message ended.
                session.end_generation();
            });
        }
    }
}
