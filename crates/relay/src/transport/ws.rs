// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session WebSocket handler.
//!
//! Each connection gets its own session for as long as the socket stays
//! open. Closing the socket destroys the session and frees its account.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::error::PoolError;
use crate::state::RelayState;
use crate::transport::message::{ClientMessage, ServerMessage};

/// Capacity of a session's outbound queue.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Commands a session may have queued behind a slow one before new ones are dropped.
const COMMAND_CAPACITY: usize = 32;

/// Close code sent when no account could be bound (RFC 6455 "try again later").
const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

/// `GET /ws/pois`: WebSocket upgrade for a relay session.
pub async fn ws_handler(
    State(state): State<Arc<RelayState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<RelayState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);

    let session = match state.manager.create(tx).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            reject(&mut ws_tx, "No accounts available").await;
            return;
        }
        Err(PoolError::Registration(e)) => {
            tracing::warn!("auto-registration failed: {e:#}");
            reject(&mut ws_tx, &format!("Auto-registration failed: {e:#}")).await;
            return;
        }
        Err(e) => {
            reject(&mut ws_tx, &e.to_string()).await;
            return;
        }
    };
    let session_id = session.id().to_owned();
    session.send_message(ServerMessage::SessionReady { session_id: session_id.clone() });

    // Commands run on their own task so a stalled upstream call never blocks
    // the socket loop, and closing the socket still tears the session down.
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<ClientMessage>(COMMAND_CAPACITY);
    let commands = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                session.handle_command(cmd).await;
            }
        })
    };

    let every = state.health_ping;
    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,

            // Session output to the client.
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                if send_json(&mut ws_tx, &msg).await.is_err() {
                    break;
                }
            }

            _ = ping.tick() => {
                session.send_message(ServerMessage::backend_error("health", "health check: error channel alive"));
            }

            // Commands from the client.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(cmd) => {
                            if cmd_tx.try_send(cmd).is_err() {
                                tracing::debug!(session_id = %session_id, "command queue full, command dropped");
                            }
                        }
                        Err(e) => {
                            tracing::debug!(session_id = %session_id, err = %e, "malformed client message ignored");
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session_id, err = %e, "client WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    drop(cmd_tx);
    state.manager.destroy(&session_id).await;
    commands.abort();
}

async fn send_json(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(text) => ws_tx.send(Message::Text(text.into())).await,
        Err(e) => {
            tracing::warn!(err = %e, "outbound message not serializable");
            Ok(())
        }
    }
}

/// Report why no session could be created, then close.
async fn reject(ws_tx: &mut SplitSink<WebSocket, Message>, message: &str) {
    let msg = ServerMessage::SessionError { message: message.to_owned() };
    if send_json(ws_tx, &msg).await.is_ok() {
        let frame = CloseFrame { code: CLOSE_TRY_AGAIN_LATER, reason: "session unavailable".into() };
        let _ = ws_tx.send(Message::Close(Some(frame))).await;
    }
}
