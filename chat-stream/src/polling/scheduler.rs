//! Room loop scheduler and management
//!
//! [`EventPoller`] starts at most one loop per room and keeps it alive across
//! subscribe/unsubscribe cycles. Unsubscribing only flips the registry gate;
//! the loop keeps ticking and picks the room up again on the first tick after
//! a new subscription.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chat_api::{Cursor, EventFetcher, RoomId};
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::config::PollerConfig;
use crate::cursor::CursorStore;
use crate::error::{PollerError, Result};
use crate::handlers::EventHandlers;
use crate::polling::task::{
    shared_slot, RoomCounters, RoomLoop, RoomPollTask, TickOutcome, UpdatesHandle,
};
use crate::registry::{SubscriptionGeneration, SubscriptionRegistry};

/// Drives the poll loops of every room.
///
/// # Example
///
/// ```rust,ignore
/// let poller = EventPoller::new(Arc::new(client), PollerConfig::default());
///
/// let handle = poller.start_updates(
///     "match-day",
///     Duration::from_millis(500),
///     EventHandlers::new().on_goal(|event| println!("GOAL {}", event.body)),
/// )?;
///
/// // later
/// handle.stop();
/// ```
pub struct EventPoller {
    fetcher: Arc<dyn EventFetcher>,
    registry: Arc<SubscriptionRegistry>,
    cursors: Arc<CursorStore>,
    config: PollerConfig,
    tasks: Mutex<HashMap<RoomId, RoomPollTask>>,
}

impl EventPoller {
    pub fn new(fetcher: Arc<dyn EventFetcher>, config: PollerConfig) -> Self {
        Self {
            fetcher,
            registry: Arc::new(SubscriptionRegistry::new()),
            cursors: Arc::new(CursorStore::new()),
            config,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Subscribe `room` and deliver its events to `handlers` every `interval`.
    ///
    /// The first fetch happens right away. If the room already has a loop,
    /// that loop is reused: `handlers` replace the previous ones, the
    /// subscription is renewed and the loop restarts its schedule at
    /// `interval`. A response still in flight for the previous handlers is
    /// discarded; the cursor carries over.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_updates(
        &self,
        room: impl Into<RoomId>,
        interval: Duration,
        handlers: EventHandlers,
    ) -> Result<UpdatesHandle> {
        let room = room.into();
        if interval.is_zero() {
            return Err(PollerError::InvalidInterval);
        }
        let runtime = Handle::try_current().map_err(|_| PollerError::NoRuntime)?;
        let handlers = Arc::new(handlers);

        let mut tasks = self.tasks.lock();

        if let Some(task) = tasks.get(&room).filter(|task| task.is_running()) {
            let generation = task.install(handlers, interval, || self.registry.resubscribe(&room));
            tracing::debug!(
                room = %room,
                %generation,
                ?interval,
                "renewed subscription on running loop"
            );
            return Ok(self.handle(room, generation, task));
        }

        if tasks.remove(&room).is_some() {
            tracing::warn!(room = %room, "room poll loop had exited, restarting it");
        }

        if tasks.len() >= self.config.max_rooms {
            return Err(PollerError::TooManyRooms {
                max_rooms: self.config.max_rooms,
            });
        }

        let generation = self.registry.resubscribe(&room);
        let room_loop = RoomLoop {
            room: room.clone(),
            fetcher: Arc::clone(&self.fetcher),
            registry: Arc::clone(&self.registry),
            cursors: Arc::clone(&self.cursors),
            slot: shared_slot(generation, handlers),
            counters: Arc::new(RoomCounters::default()),
        };
        let task = RoomPollTask::spawn(&runtime, room_loop, interval);
        let handle = self.handle(room.clone(), generation, &task);
        tasks.insert(room.clone(), task);

        tracing::info!(room = %room, ?interval, "started room updates");
        Ok(handle)
    }

    /// [`start_updates`](Self::start_updates) with the configured default interval.
    pub fn start_updates_default(
        &self,
        room: impl Into<RoomId>,
        handlers: EventHandlers,
    ) -> Result<UpdatesHandle> {
        self.start_updates(room, self.config.default_interval, handlers)
    }

    /// Unsubscribe `room`. Returns whether it was subscribed.
    ///
    /// The room's loop keeps running and skips its ticks until the room is
    /// subscribed again. A fetch already in flight completes, but its events
    /// are not dispatched and the cursor is left where it was. The room's
    /// handlers are dropped, which ends any [`RoomUpdates`](crate::RoomUpdates)
    /// reading from it.
    pub fn stop_updates(&self, room: &RoomId) -> bool {
        let unsubscribe = || self.registry.unsubscribe(room);
        let stopped = match self.tasks.lock().get(room) {
            Some(task) => task.release(unsubscribe),
            None => unsubscribe(),
        };
        if stopped {
            tracing::info!(room = %room, "stopped room updates");
        }
        stopped
    }

    /// Unsubscribe `room` and end its loop. Returns whether a loop existed.
    pub async fn shutdown_room(&self, room: &RoomId) -> Result<bool> {
        self.registry.unsubscribe(room);
        let task = self.tasks.lock().remove(room);

        match task {
            Some(task) => {
                task.shutdown(self.config.shutdown_timeout).await?;
                tracing::debug!(room = %room, "room poll loop shut down");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Unsubscribe every room and end all loops.
    ///
    /// Every loop is asked to stop; the first failure is returned after all
    /// of them were handled.
    pub async fn shutdown_all(&self) -> Result<()> {
        self.registry.clear();
        let tasks: Vec<_> = self.tasks.lock().drain().collect();
        let mut first_error = None;

        for (room, task) in tasks {
            match task.shutdown(self.config.shutdown_timeout).await {
                Ok(()) => tracing::debug!(room = %room, "room poll loop shut down"),
                Err(e) => {
                    tracing::warn!(room = %room, error = %e, "room poll loop did not shut down cleanly");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Forget the cursor of `room` so its next fetch reads from the beginning.
    pub fn reset_cursor(&self, room: &RoomId) -> Option<Cursor> {
        self.cursors.reset(room)
    }

    pub fn cursor(&self, room: &RoomId) -> Option<Cursor> {
        self.cursors.get(room)
    }

    pub fn is_subscribed(&self, room: &RoomId) -> bool {
        self.registry.is_subscribed(room)
    }

    /// Whether `room` has a live loop, subscribed or not.
    pub fn is_polling(&self, room: &RoomId) -> bool {
        self.tasks
            .lock()
            .get(room)
            .is_some_and(|task| task.is_running())
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn cursors(&self) -> &Arc<CursorStore> {
        &self.cursors
    }

    /// Snapshot of every room loop.
    pub fn stats(&self) -> PollerStats {
        let tasks = self.tasks.lock();
        let mut rooms: Vec<RoomStats> = tasks
            .iter()
            .map(|(room, task)| RoomStats {
                room: room.clone(),
                interval: task.interval(),
                generation: self.registry.generation(room),
                cursor: self.cursors.get(room),
                polls: task.counters.polls.load(Ordering::Relaxed),
                skipped: task.counters.skipped.load(Ordering::Relaxed),
                errors: task.counters.errors.load(Ordering::Relaxed),
                discarded: task.counters.discarded.load(Ordering::Relaxed),
                events_dispatched: task.counters.events_dispatched.load(Ordering::Relaxed),
                handler_panics: task.counters.handler_panics.load(Ordering::Relaxed),
                last_outcome: *task.counters.last_outcome.lock(),
                uptime: task.started_at.elapsed(),
                is_running: task.is_running(),
            })
            .collect();
        rooms.sort_by(|a, b| a.room.as_str().cmp(b.room.as_str()));

        PollerStats {
            active_loops: tasks.len(),
            max_rooms: self.config.max_rooms,
            subscribed_rooms: self.registry.count(),
            default_interval: self.config.default_interval,
            rooms,
        }
    }

    fn handle(
        &self,
        room: RoomId,
        generation: SubscriptionGeneration,
        task: &RoomPollTask,
    ) -> UpdatesHandle {
        UpdatesHandle::new(room, generation, Arc::clone(&self.registry), task.weak_slot())
    }
}

impl std::fmt::Debug for EventPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPoller")
            .field("config", &self.config)
            .field("loops", &self.tasks.lock().len())
            .field("subscribed", &self.registry.count())
            .finish()
    }
}

/// Statistics for one room loop
#[derive(Debug, Clone)]
pub struct RoomStats {
    pub room: RoomId,
    pub interval: Duration,
    /// Current subscription, `None` while the room is unsubscribed
    pub generation: Option<SubscriptionGeneration>,
    pub cursor: Option<Cursor>,
    /// Fetches issued
    pub polls: u64,
    pub skipped: u64,
    pub errors: u64,
    pub discarded: u64,
    pub events_dispatched: u64,
    /// Callbacks that panicked; the loop carried on with the next event
    pub handler_panics: u64,
    pub last_outcome: Option<TickOutcome>,
    pub uptime: Duration,
    pub is_running: bool,
}

/// Statistics for the whole poller
#[derive(Debug, Clone)]
pub struct PollerStats {
    pub active_loops: usize,
    pub max_rooms: usize,
    pub subscribed_rooms: usize,
    pub default_interval: Duration,
    pub rooms: Vec<RoomStats>,
}

impl std::fmt::Display for PollerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Event Poller Stats:")?;
        writeln!(f, "  Active loops: {}/{}", self.active_loops, self.max_rooms)?;
        writeln!(f, "  Subscribed rooms: {}", self.subscribed_rooms)?;
        writeln!(f, "  Default interval: {:?}", self.default_interval)?;

        if !self.rooms.is_empty() {
            writeln!(f, "  Rooms:")?;
            for room in &self.rooms {
                let state = match room.generation {
                    Some(generation) => generation.to_string(),
                    None => "unsubscribed".to_string(),
                };
                writeln!(
                    f,
                    "    {} [{}] (interval: {:?}, polls: {}, events: {}, errors: {}, discarded: {})",
                    room.room,
                    state,
                    room.interval,
                    room.polls,
                    room.events_dispatched,
                    room.errors,
                    room.discarded
                )?;
                if room.handler_panics > 0 {
                    writeln!(f, "      handler panics: {}", room.handler_panics)?;
                }
            }
        }

        Ok(())
    }
}
