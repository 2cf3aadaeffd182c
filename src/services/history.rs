//! History service — per-room linear operation log with undo/redo.
//!
//! DESIGN
//! ======
//! The log is a vector of opaque operations plus a count of how many are
//! currently applied. Entries past the applied prefix are suspended and
//! available for redo. Appending while entries are suspended truncates them:
//! there is exactly one timeline per room.
//!
//! On the wire the position is expressed as `historyIndex`, the index of the
//! last applied entry (`-1` when nothing is applied).

use serde::{Deserialize, Serialize};

use crate::frame::Data;

// =============================================================================
// OPERATION
// =============================================================================

/// One atomic drawing action. Never inspected or mutated by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(Data);

impl Operation {
    #[must_use]
    pub fn new(payload: Data) -> Self {
        Self(payload)
    }

    #[must_use]
    pub fn payload(&self) -> &Data {
        &self.0
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Full log state handed to a joining client: every entry, applied or not,
/// plus the cursor. Sent as `drawingState` in `room-joined`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub strokes: Vec<Operation>,
    pub history_index: i64,
}

impl HistorySnapshot {
    /// Entries a client must replay to reach the visible state.
    #[must_use]
    pub fn visible(&self) -> &[Operation] {
        let applied = usize::try_from(self.history_index + 1).unwrap_or(0);
        &self.strokes[..applied.min(self.strokes.len())]
    }
}

// =============================================================================
// OPERATION LOG
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    entries: Vec<Operation>,
    /// Number of entries currently applied. `cursor == applied - 1`.
    applied: usize,
}

impl OperationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation, discarding any suspended entries first.
    pub fn append(&mut self, op: Operation) {
        self.entries.truncate(self.applied);
        self.entries.push(op);
        self.applied += 1;
    }

    /// Step the cursor back one entry. Returns false when nothing is applied.
    pub fn undo(&mut self) -> bool {
        if self.applied == 0 {
            return false;
        }
        self.applied -= 1;
        true
    }

    /// Step the cursor forward one entry. Returns false when nothing is suspended.
    pub fn redo(&mut self) -> bool {
        if self.applied == self.entries.len() {
            return false;
        }
        self.applied += 1;
        true
    }

    #[must_use]
    pub fn visible_entries(&self) -> &[Operation] {
        &self.entries[..self.applied]
    }

    /// Index of the last applied entry, `-1` when none.
    #[must_use]
    pub fn cursor(&self) -> i64 {
        i64::try_from(self.applied).unwrap_or(i64::MAX) - 1
    }

    #[must_use]
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot { strokes: self.entries.clone(), history_index: self.cursor() }
    }

    /// Drop every entry. Not undoable.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.applied = 0;
    }

    /// Total entries, applied and suspended.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
