//! The pull operation the real-time layer is built on.

use async_trait::async_trait;

use crate::error::Result;
use crate::event::EventPage;
use crate::types::{Cursor, RoomId};

/// Fetches the events of a room that arrived after a cursor.
///
/// Implementations must be idempotent for a given cursor: asking twice from
/// the same position returns the same events (plus any newer ones). A `None`
/// cursor reads from the beginning of the feed.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one fetcher is shared by the poll
/// loops of every room.
#[async_trait]
pub trait EventFetcher: Send + Sync {
    /// Fetch the next page of events for `room`.
    async fn fetch_events(&self, room: &RoomId, cursor: Option<&Cursor>) -> Result<EventPage>;
}
