//! Room listing — read-only view of live rooms.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub name: String,
    pub participants: usize,
    pub strokes: usize,
    pub history_index: i64,
}

/// `GET /api/rooms` — every live room, sorted by name.
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let hub = state.hub.read().await;
    let mut rooms: Vec<RoomSummary> = hub
        .registry
        .rooms()
        .map(|room| RoomSummary {
            name: room.name().to_owned(),
            participants: room.participant_count(),
            strokes: room.log().len(),
            history_index: room.log().cursor(),
        })
        .collect();
    rooms.sort_by(|a, b| a.name.cmp(&b.name));
    Json(rooms)
}
