//! Last-seen cursor per room.

use chat_api::{Cursor, RoomId};
use dashmap::DashMap;

/// In-memory map from room to the last cursor received for it.
///
/// A stored cursor is only ever replaced by a newer non-empty cursor for the
/// same room. Responses without a usable cursor leave the stored one in place,
/// so a room never falls back to reading its feed from the beginning while it
/// is being polled. Entries live until [`reset`](Self::reset) or drop.
#[derive(Debug, Default)]
pub struct CursorStore {
    cursors: DashMap<RoomId, Cursor>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last cursor stored for `room`.
    pub fn get(&self, room: &RoomId) -> Option<Cursor> {
        self.cursors.get(room).map(|entry| entry.value().clone())
    }

    /// Store `cursor` for `room` unless it is absent or empty.
    ///
    /// Returns whether the stored cursor changed.
    pub fn set(&self, room: &RoomId, cursor: Option<Cursor>) -> bool {
        let Some(cursor) = cursor.filter(|cursor| !cursor.is_empty()) else {
            return false;
        };

        match self.cursors.insert(room.clone(), cursor.clone()) {
            Some(previous) => previous != cursor,
            None => true,
        }
    }

    /// Forget the cursor of `room`; the next fetch reads from the beginning.
    pub fn reset(&self, room: &RoomId) -> Option<Cursor> {
        self.cursors.remove(room).map(|(_, cursor)| cursor)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
