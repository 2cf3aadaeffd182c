//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! All mutable collaboration state lives in one `Hub`: the room registry
//! and the outbound channel of every live connection. Each inbound event
//! is handled under the hub's write guard, fan-out included, so handlers
//! are atomic with respect to each other and every recipient sees a room's
//! frames in the same order.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::frame::Frame;
use crate::services::room::RoomRegistry;

// =============================================================================
// HUB
// =============================================================================

#[derive(Debug, Default)]
pub struct Hub {
    pub registry: RoomRegistry,
    /// Live connections: `client_id` -> sender for outgoing frames.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<RwLock<Hub>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { hub: Arc::new(RwLock::new(Hub::new())), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
