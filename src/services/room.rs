//! Room service — room lifecycle and participant rosters.
//!
//! DESIGN
//! ======
//! Rooms are created lazily on first join and destroyed the moment their
//! last participant leaves; that is the only eviction path. History is not
//! kept for empty rooms, so rejoining a vacated name starts from an empty
//! log.
//!
//! Lookups that miss (room gone, participant gone) return `None`/`false`
//! instead of erroring. Callers treat them as transient races with a
//! disconnect.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::history::OperationLog;

// =============================================================================
// TYPES
// =============================================================================

/// 2D canvas position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One connected user's identity and presentation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub username: String,
    pub color: String,
    pub cursor: Point,
}

impl Participant {
    #[must_use]
    pub fn new(id: Uuid, username: impl Into<String>, color: impl Into<String>) -> Self {
        Self { id, username: username.into(), color: color.into(), cursor: Point::default() }
    }
}

/// A named group of participants sharing one operation log.
#[derive(Debug)]
pub struct Room {
    name: String,
    participants: HashMap<Uuid, Participant>,
    log: OperationLog,
}

impl Room {
    fn new(name: &str) -> Self {
        Self { name: name.to_owned(), participants: HashMap::new(), log: OperationLog::new() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut OperationLog {
        &mut self.log
    }

    #[must_use]
    pub fn participant(&self, id: Uuid) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn participant_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.participants.keys().copied()
    }

    #[must_use]
    pub fn participants(&self) -> Vec<Participant> {
        self.participants.values().cloned().collect()
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Every live room, keyed by name.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the named room, creating it with an empty log if needed.
    ///
    /// A room created here without a following `join` has no participants;
    /// it is only collected once someone joins and then leaves.
    pub fn get_or_create(&mut self, room_name: &str) -> &mut Room {
        self.rooms.entry(room_name.to_owned()).or_insert_with(|| {
            info!(room = %room_name, "created room");
            Room::new(room_name)
        })
    }

    /// Add a participant to a room. A second join with the same id replaces
    /// the first entry.
    pub fn join(&mut self, room_name: &str, participant: Participant) -> &mut Room {
        let room = self.get_or_create(room_name);
        info!(room = %room_name, participant = %participant.id, "participant joined room");
        room.participants.insert(participant.id, participant);
        room
    }

    /// Remove a participant. Destroys the room (and its log) if it is now
    /// empty. Returns the removed participant, if there was one.
    pub fn leave(&mut self, room_name: &str, participant_id: Uuid) -> Option<Participant> {
        let room = self.rooms.get_mut(room_name)?;
        let removed = room.participants.remove(&participant_id);
        info!(
            room = %room_name,
            participant = %participant_id,
            remaining = room.participants.len(),
            "participant left room"
        );

        if room.participants.is_empty() {
            self.rooms.remove(room_name);
            info!(room = %room_name, "destroyed empty room");
        }
        removed
    }

    /// Record a participant's cursor. Returns false if the room or the
    /// participant no longer exists.
    pub fn update_cursor(&mut self, room_name: &str, participant_id: Uuid, point: Point) -> bool {
        let Some(participant) = self
            .rooms
            .get_mut(room_name)
            .and_then(|room| room.participants.get_mut(&participant_id))
        else {
            return false;
        };
        participant.cursor = point;
        true
    }

    /// Current roster of a room; empty if the room does not exist.
    #[must_use]
    pub fn list_participants(&self, room_name: &str) -> Vec<Participant> {
        self.rooms.get(room_name).map(Room::participants).unwrap_or_default()
    }

    #[must_use]
    /// Name of the room holding this participant, if any.
    pub fn room_of(&self, participant_id: Uuid) -> Option<String> {
        self.rooms
            .values()
            .find(|room| room.participants.contains_key(&participant_id))
            .map(|room| room.name.clone())
    }

    pub fn get(&self, room_name: &str) -> Option<&Room> {
        self.rooms.get(room_name)
    }

    pub fn get_mut(&mut self, room_name: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_name)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
