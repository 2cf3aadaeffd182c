//! Session service — binds connections to rooms and fans out room events.
//!
//! DESIGN
//! ======
//! A `Session` tracks one connection's binding: unbound until it joins a
//! room, bound to exactly one room after that, and closed once it leaves or
//! disconnects. There is no re-bind; a closed session stays closed.
//!
//! Each handler runs to completion against `&mut Hub`, and every outbound
//! frame (the joiner's own `room-joined` included) is queued on the
//! recipients' channels before the hub guard is released. Recipient sets:
//!
//! | event        | recipients                          |
//! |--------------|-------------------------------------|
//! | join-room    | joiner: room-joined; others: user-joined + users-update |
//! | draw         | room minus sender                   |
//! | cursor-move  | room minus sender                   |
//! | undo / redo  | whole room, only if the cursor moved |
//! | clear-canvas | whole room                          |
//! | leave        | remaining members: user-left + users-update |
//!
//! Draw and cursor frames skip the sender because the client has already
//! applied them locally. Undo/redo/clear depend on the server-side cursor,
//! so the sender waits for the echo like everyone else.
//!
//! ERROR HANDLING
//! ==============
//! Room-bound events from an unbound session, and lookups that miss because
//! a room or participant is gone, are silent no-ops. Only protocol misuse
//! (unknown event, missing room name, second join) becomes a `SessionError`
//! for the sender.

use rand::Rng;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::frame::{self, Frame};
use crate::services::history::Operation;
use crate::services::room::{Participant, Point, Room};
use crate::state::{AppState, Hub};

/// Colors handed out to joining participants. Picks are uniform and may
/// repeat within a room.
pub const PALETTE: [&str; 12] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2", "#F8B739", "#52B788",
    "#E76F51", "#2A9D8F",
];

const DEFAULT_USERNAME: &str = "Anonymous";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("already joined room {0}")]
    AlreadyJoined(String),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("{0} required")]
    MissingField(&'static str),
}

impl crate::frame::ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyJoined(_) => "E_ALREADY_JOINED",
            Self::UnknownEvent(_) => "E_UNKNOWN_EVENT",
            Self::MissingField(_) => "E_MISSING_FIELD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Unbound,
    Bound(String),
    Closed,
}

/// One connection's view of where it belongs.
#[derive(Debug)]
pub struct Session {
    client_id: Uuid,
    binding: Binding,
}

impl Session {
    #[must_use]
    pub fn new(client_id: Uuid) -> Self {
        Self { client_id, binding: Binding::Unbound }
    }

    #[must_use]
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    #[must_use]
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Name of the bound room, if any.
    #[must_use]
    pub fn room(&self) -> Option<&str> {
        match &self.binding {
            Binding::Bound(name) => Some(name),
            Binding::Unbound | Binding::Closed => None,
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.binding == Binding::Closed
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Handle one inbound frame under the hub's write guard.
///
/// # Errors
///
/// Returns a `SessionError` for protocol misuse; room state is untouched.
pub async fn handle_frame(state: &AppState, session: &mut Session, req: &Frame) -> Result<(), SessionError> {
    let mut hub = state.hub.write().await;
    dispatch(&mut hub, session, req)
}

/// Tear down a connection: drop its outbound channel and run the leave path
/// if it is still bound.
pub async fn disconnect(state: &AppState, session: &mut Session) {
    let mut hub = state.hub.write().await;
    hub.clients.remove(&session.client_id);
    leave(&mut hub, session);
}

/// Route a frame to its handler by event name.
///
/// # Errors
///
/// Returns a `SessionError` for protocol misuse; room state is untouched.
pub fn dispatch(hub: &mut Hub, session: &mut Session, req: &Frame) -> Result<(), SessionError> {
    match req.event.as_str() {
        frame::JOIN_ROOM => join(hub, session, req),
        frame::LEAVE_ROOM => {
            leave(hub, session);
            Ok(())
        }
        frame::DRAW => {
            draw(hub, session, req);
            Ok(())
        }
        frame::CURSOR_MOVE => {
            cursor_move(hub, session, req);
            Ok(())
        }
        frame::UNDO => {
            step(hub, session, frame::UNDO);
            Ok(())
        }
        frame::REDO => {
            step(hub, session, frame::REDO);
            Ok(())
        }
        frame::CLEAR_CANVAS => {
            clear(hub, session);
            Ok(())
        }
        other => Err(SessionError::UnknownEvent(other.to_owned())),
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

fn join(hub: &mut Hub, session: &mut Session, req: &Frame) -> Result<(), SessionError> {
    match &session.binding {
        Binding::Unbound => {}
        Binding::Bound(room) => return Err(SessionError::AlreadyJoined(room.clone())),
        // The connection is on its way out; nothing left to bind.
        Binding::Closed => return Ok(()),
    }

    let Some(room_name) = req.str_field("roomName") else {
        return Err(SessionError::MissingField("roomName"));
    };
    let username = req.str_field("username").unwrap_or(DEFAULT_USERNAME);
    let color = pick_color();
    let client_id = session.client_id;

    let room = hub
        .registry
        .join(room_name, Participant::new(client_id, username, color));
    let users = users_value(&room.participants());
    let drawing_state = serde_json::to_value(room.log().snapshot()).unwrap_or_default();
    session.binding = Binding::Bound(room_name.to_owned());

    let joined = Frame::new(frame::ROOM_JOINED)
        .with_data("userId", client_id.to_string())
        .with_data("color", color)
        .with_data("users", users.clone())
        .with_data("drawingState", drawing_state);
    send_to(hub, client_id, joined);
    if !hub.clients.contains_key(&client_id) {
        return Ok(());
    }

    let announce = Frame::new(frame::USER_JOINED)
        .with_data("id", client_id.to_string())
        .with_data("username", username)
        .with_data("color", color);
    broadcast(hub, room_name, &announce, Some(client_id));
    broadcast(hub, room_name, &Frame::new(frame::USERS_UPDATE).with_data("users", users), Some(client_id));

    Ok(())
}

fn leave(hub: &mut Hub, session: &mut Session) {
    let binding = std::mem::replace(&mut session.binding, Binding::Closed);
    let Binding::Bound(room_name) = binding else {
        return;
    };

    let lagging = depart(hub, &room_name, session.client_id);
    evict(hub, lagging);
}

fn draw(hub: &mut Hub, session: &Session, req: &Frame) {
    let Some(room_name) = session.room() else {
        debug!(client_id = %session.client_id, "draw before join ignored");
        return;
    };
    let Some(room) = member_room(hub, session) else {
        return;
    };

    room.log_mut().append(Operation::new(req.data.clone()));
    debug!(room = %room_name, entries = room.log().len(), "stroke appended");

    let echo = Frame::with_payload(frame::DRAW, req.data.clone());
    broadcast(hub, room_name, &echo, Some(session.client_id));
}

fn cursor_move(hub: &mut Hub, session: &Session, req: &Frame) {
    let Some(room_name) = session.room() else {
        return;
    };

    let (x, y) = (coordinate(req, "x"), coordinate(req, "y"));
    let point = Point::new(x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
    if !hub.registry.update_cursor(room_name, session.client_id, point) {
        return;
    }

    // Coordinates are relayed as sent, so integers stay integers.
    let update = Frame::new(frame::CURSOR_UPDATE)
        .with_data("userId", session.client_id.to_string())
        .with_data("x", x)
        .with_data("y", y);
    broadcast(hub, room_name, &update, Some(session.client_id));
}

/// Shared undo/redo path. `event` is `frame::UNDO` or `frame::REDO`.
fn step(hub: &mut Hub, session: &Session, event: &'static str) {
    let Some(room_name) = session.room() else {
        return;
    };
    let Some(room) = member_room(hub, session) else {
        return;
    };

    let log = room.log_mut();
    let moved = if event == frame::UNDO { log.undo() } else { log.redo() };
    if !moved {
        debug!(room = %room_name, event, "nothing to step; ignored");
        return;
    }

    let history_index = log.cursor();
    debug!(room = %room_name, event, history_index, "history cursor moved");
    broadcast(hub, room_name, &Frame::new(event).with_data("historyIndex", history_index), None);
}

fn clear(hub: &mut Hub, session: &Session) {
    let Some(room_name) = session.room() else {
        return;
    };
    let Some(room) = member_room(hub, session) else {
        return;
    };

    room.log_mut().clear();
    debug!(room = %room_name, "canvas cleared");
    broadcast(hub, room_name, &Frame::new(frame::CLEAR_CANVAS), None);
}

// =============================================================================
// FAN-OUT
// =============================================================================

/// Queue a frame for one connection.
pub fn send_to(hub: &mut Hub, client_id: Uuid, frame: Frame) {
    let Some(tx) = hub.clients.get(&client_id) else {
        return;
    };
    if tx.try_send(frame).is_err() {
        evict(hub, vec![client_id]);
    }
}

/// Queue a frame for every participant of a room, optionally excluding one.
pub fn broadcast(hub: &mut Hub, room_name: &str, frame: &Frame, exclude: Option<Uuid>) {
    let lagging = fan_out(hub, room_name, frame, exclude);
    evict(hub, lagging);
}

/// Queue a frame for a room's connections and return the ones that could
/// not take it.
fn fan_out(hub: &Hub, room_name: &str, frame: &Frame, exclude: Option<Uuid>) -> Vec<Uuid> {
    let Some(room) = hub.registry.get(room_name) else {
        return Vec::new();
    };

    let mut lagging = Vec::new();
    for client_id in room.participant_ids() {
        if exclude == Some(client_id) {
            continue;
        }
        let Some(tx) = hub.clients.get(&client_id) else {
            continue;
        };
        if tx.try_send(frame.clone()).is_err() {
            lagging.push(client_id);
        }
    }
    lagging
}

/// Remove a participant from its room and tell the remaining members.
/// Returns connections that lagged on the notices. A participant already
/// gone from the roster produces no notices.
fn depart(hub: &mut Hub, room_name: &str, client_id: Uuid) -> Vec<Uuid> {
    if hub.registry.leave(room_name, client_id).is_none() {
        return Vec::new();
    }

    let left = Frame::new(frame::USER_LEFT).with_data("id", client_id.to_string());
    let mut lagging = fan_out(hub, room_name, &left, None);
    let users = users_value(&hub.registry.list_participants(room_name));
    lagging.extend(fan_out(hub, room_name, &Frame::new(frame::USERS_UPDATE).with_data("users", users), None));
    lagging
}

/// Drop connections that can no longer keep up and take them out of their
/// room right away. Their connection loop sees the channel close and ends;
/// its own leave path then finds nothing left to do.
fn evict(hub: &mut Hub, mut pending: Vec<Uuid>) {
    while let Some(client_id) = pending.pop() {
        if hub.clients.remove(&client_id).is_none() {
            continue;
        }
        warn!(%client_id, "client queue full or closed; evicting connection");

        if let Some(room_name) = hub.registry.room_of(client_id) {
            pending.extend(depart(hub, &room_name, client_id));
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Uniform pick from `PALETTE`, not checked against colors already in use.
#[must_use]
pub fn pick_color() -> &'static str {
    PALETTE[rand::rng().random_range(0..PALETTE.len())]
}

/// The session's room, provided the session is still on its roster.
fn member_room<'a>(hub: &'a mut Hub, session: &Session) -> Option<&'a mut Room> {
    let room = hub.registry.get_mut(session.room()?)?;
    room.participant(session.client_id)?;
    Some(room)
}

/// Numeric coordinate as sent by the client; 0 when absent or not a number.
fn coordinate(req: &Frame, key: &str) -> serde_json::Value {
    req.data
        .get(key)
        .filter(|v| v.is_number())
        .cloned()
        .unwrap_or_else(|| serde_json::Value::from(0))
}

fn users_value(users: &[Participant]) -> serde_json::Value {
    serde_json::to_value(users).unwrap_or_default()
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
