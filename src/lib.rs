//! drawroom — shared-canvas collaboration server.
//!
//! Each room keeps one linear history of strokes with an undo/redo cursor.
//! Connections join a room over a websocket, receive a bootstrap snapshot,
//! and then see every peer's strokes, cursors and history moves live.

pub mod config;
pub mod frame;
pub mod routes;
pub mod services;
pub mod state;
