//! Async and stream access to a room's events.
//!
//! [`RoomUpdates`] sits on top of the callback loop: it installs a generic
//! handler that forwards every event into a channel. Polling, cursor handling
//! and the subscription guard are the same as for callback consumers.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;

use chat_api::{ChatEvent, RoomId};

use crate::error::Result;
use crate::handlers::EventHandlers;
use crate::polling::{EventPoller, UpdatesHandle};

/// Events of one room, received with `.await` or consumed as a [`Stream`].
///
/// Dropping it stops the subscription it was created with.
///
/// ```rust,ignore
/// let mut updates = poller.updates("match-day")?;
/// while let Some(event) = updates.recv().await {
///     println!("{}: {}", event.eventtype, event.body);
/// }
/// ```
#[derive(Debug)]
pub struct RoomUpdates {
    receiver: mpsc::UnboundedReceiver<ChatEvent>,
    handle: UpdatesHandle,
}

impl RoomUpdates {
    /// Wait for the next event.
    ///
    /// Returns `None` once every buffered event was received and the
    /// subscription ended: stopped through this value, its handle or
    /// [`EventPoller::stop_updates`], replaced by other handlers, or shut down.
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        self.receiver.recv().await
    }

    /// Next buffered event, without waiting.
    pub fn try_recv(&mut self) -> Option<ChatEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn room(&self) -> &RoomId {
        self.handle.room()
    }

    pub fn handle(&self) -> &UpdatesHandle {
        &self.handle
    }

    /// Stop the subscription. Events already buffered can still be received,
    /// after which [`recv`](Self::recv) returns `None`.
    pub fn stop(&self) -> bool {
        self.handle.stop()
    }
}

impl Stream for RoomUpdates {
    type Item = ChatEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for RoomUpdates {
    fn drop(&mut self) {
        self.handle.stop();
    }
}

impl EventPoller {
    /// Subscribe `room` at the default interval and receive its events
    /// through a [`RoomUpdates`].
    pub fn updates(&self, room: impl Into<RoomId>) -> Result<RoomUpdates> {
        self.updates_every(room, self.config().default_interval)
    }

    /// Subscribe `room` at `interval` and receive its events through a
    /// [`RoomUpdates`].
    ///
    /// Replaces any handlers installed for the room, like
    /// [`start_updates`](Self::start_updates).
    pub fn updates_every(&self, room: impl Into<RoomId>, interval: Duration) -> Result<RoomUpdates> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handlers = EventHandlers::new().on_event(move |event: &ChatEvent| {
            // The receiver is gone once RoomUpdates is dropped.
            let _ = sender.send(event.clone());
        });
        let handle = self.start_updates(room, interval, handlers)?;

        Ok(RoomUpdates { receiver, handle })
    }
}
