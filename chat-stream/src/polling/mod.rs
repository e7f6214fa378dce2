//! Per-room poll loops
//!
//! Each subscribed room gets one background task that ticks on a fixed
//! interval, fetches the events since the room's cursor and dispatches them.
//! The [`EventPoller`] owns those tasks; [`UpdatesHandle`] lets a caller stop
//! exactly the subscription it started.

pub mod scheduler;
pub mod task;

pub use scheduler::{EventPoller, PollerStats, RoomStats};
pub use task::{TickOutcome, UpdatesHandle};
