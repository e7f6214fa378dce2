//! # chat-stream
//!
//! Real-time room events over a pull-only REST feed.
//!
//! The [`EventPoller`] runs one interval-driven loop per room. Each tick reads
//! the room's last cursor from the [`CursorStore`], fetches the events since
//! that cursor through an [`EventFetcher`](chat_api::EventFetcher), advances
//! the cursor and dispatches the events in arrival order to the matching
//! [`EventHandlers`] callback. The [`SubscriptionRegistry`] gates every tick:
//! a room that is no longer subscribed skips its ticks, and a response that
//! arrives after the room was unsubscribed is discarded.
//!
//! Three consumption styles share that single loop:
//!
//! - callbacks, via [`EventPoller::start_updates`]
//! - async receive, via [`RoomUpdates::recv`]
//! - a [`futures::Stream`] of events, via [`RoomUpdates`]

mod config;
mod cursor;
mod error;
mod handlers;
pub mod polling;
mod registry;
mod updates;

pub use config::PollerConfig;
pub use cursor::CursorStore;
pub use error::{PollerError, Result};
pub use handlers::EventHandlers;
pub use polling::{EventPoller, PollerStats, RoomStats, TickOutcome, UpdatesHandle};
pub use registry::{SubscriptionGeneration, SubscriptionRegistry};
pub use updates::RoomUpdates;

// Re-export the model types handlers work with
pub use chat_api::{ApiError, ChatEvent, Cursor, EventFetcher, EventPage, EventType, RoomId};
