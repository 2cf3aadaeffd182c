//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID, registers the connection's outbound
//! channel in the hub, and enters a `select!` loop:
//! - Incoming client frames → parse + hand to the session service
//! - Queued frames from the hub → forward to client
//!
//! All room traffic, the joiner's own bootstrap included, arrives through
//! the outbound channel. Only gateway errors (bad JSON, protocol misuse) are
//! written straight to the socket.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register outbound channel
//! 2. Client sends frames → session service mutates + fans out
//! 3. Close, `leave-room`, or eviction → disconnect → peers get `user-left`

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{self, Frame};
use crate::services::session::{self, Session};
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // The hub holds the only sender; eviction drops it and ends this loop.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_buffer);
    state.hub.write().await.clients.insert(client_id, client_tx);

    let mut session = Session::new(client_id);
    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for reply in process_inbound_text(&state, &mut session, &text).await {
                            let _ = send_frame(&mut socket, &reply).await;
                        }
                        if session.is_closed() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            queued = client_rx.recv() => {
                let Some(frame) = queued else {
                    warn!(%client_id, "ws: outbound channel closed");
                    break;
                };
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    session::disconnect(&state, &mut session).await;
    let _ = socket.send(Message::Close(None)).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Keeps websocket transport concerns apart from frame handling so tests can
/// exercise dispatch without a socket.
async fn process_inbound_text(state: &AppState, session: &mut Session, text: &str) -> Vec<Frame> {
    let req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(client_id = %session.client_id(), error = %e, "ws: invalid inbound frame");
            return vec![Frame::error("E_INVALID_FRAME", format!("invalid json: {e}"))];
        }
    };

    // Cursor moves are too frequent to log.
    if req.event != frame::CURSOR_MOVE {
        debug!(client_id = %session.client_id(), event = %req.event, "ws: recv frame");
    }

    match session::handle_frame(state, session, &req).await {
        Ok(()) => vec![],
        Err(e) => {
            warn!(client_id = %session.client_id(), event = %req.event, error = %e, "ws: rejected frame");
            vec![Frame::error_from(&e)]
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
