//! The poll loop of a single room.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chat_api::{EventFetcher, EventPage, RoomId};
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Interval, MissedTickBehavior};

use crate::cursor::CursorStore;
use crate::error::{PollerError, Result};
use crate::handlers::EventHandlers;
use crate::registry::{SubscriptionGeneration, SubscriptionRegistry};

/// What a single tick of a room loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The room was not subscribed; nothing was fetched
    Skipped,
    /// The fetch failed; the cursor was left unchanged
    Failed,
    /// The room was unsubscribed or re-subscribed while the fetch was in flight
    Discarded,
    /// The cursor was advanced and this many events were dispatched
    Dispatched(usize),
}

/// Handlers installed for a room, tagged with the subscription they belong to.
pub(crate) struct HandlerSlot {
    generation: SubscriptionGeneration,
    handlers: Arc<EventHandlers>,
}

pub(crate) type SharedSlot = Arc<RwLock<HandlerSlot>>;

pub(crate) fn shared_slot(generation: SubscriptionGeneration, handlers: Arc<EventHandlers>) -> SharedSlot {
    Arc::new(RwLock::new(HandlerSlot {
        generation,
        handlers,
    }))
}

/// End a subscription through `unsubscribe` and drop its handlers.
///
/// Dropping the handlers releases whatever they captured, which closes the
/// channel behind a [`RoomUpdates`](crate::RoomUpdates).
pub(crate) fn release_handlers(slot: &SharedSlot, unsubscribe: impl FnOnce() -> bool) -> bool {
    let mut slot = slot.write();
    let stopped = unsubscribe();
    if stopped {
        slot.handlers = Arc::new(EventHandlers::new());
    }
    stopped
}

/// Per-room counters, updated by the loop and read by stats.
#[derive(Debug, Default)]
pub(crate) struct RoomCounters {
    pub polls: AtomicU64,
    pub skipped: AtomicU64,
    pub errors: AtomicU64,
    pub discarded: AtomicU64,
    pub events_dispatched: AtomicU64,
    pub handler_panics: AtomicU64,
    pub last_outcome: Mutex<Option<TickOutcome>>,
}

impl RoomCounters {
    fn record(&self, outcome: TickOutcome) {
        if outcome != TickOutcome::Skipped {
            self.polls.fetch_add(1, Ordering::Relaxed);
        }

        match outcome {
            TickOutcome::Skipped => self.skipped.fetch_add(1, Ordering::Relaxed),
            TickOutcome::Failed => self.errors.fetch_add(1, Ordering::Relaxed),
            TickOutcome::Discarded => self.discarded.fetch_add(1, Ordering::Relaxed),
            TickOutcome::Dispatched(count) => self
                .events_dispatched
                .fetch_add(count as u64, Ordering::Relaxed),
        };
        *self.last_outcome.lock() = Some(outcome);
    }
}

/// Everything one room's loop needs to run a tick.
pub(crate) struct RoomLoop {
    pub room: RoomId,
    pub fetcher: Arc<dyn EventFetcher>,
    pub registry: Arc<SubscriptionRegistry>,
    pub cursors: Arc<CursorStore>,
    pub slot: SharedSlot,
    pub counters: Arc<RoomCounters>,
}

fn ticker(period: Duration) -> Interval {
    // First tick completes immediately.
    let mut ticks = tokio::time::interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticks
}

impl RoomLoop {
    /// Tick until shut down.
    ///
    /// Every value sent on `period_rx` restarts the schedule with that period,
    /// beginning with an immediate tick. A tick in progress always completes
    /// first.
    async fn run(
        self,
        mut period_rx: watch::Receiver<Duration>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let period = *period_rx.borrow_and_update();
        let mut ticks = ticker(period);
        tracing::debug!(room = %self.room, ?period, "room poll loop started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => break,
                changed = period_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let period = *period_rx.borrow_and_update();
                    ticks = ticker(period);
                    tracing::debug!(room = %self.room, ?period, "room poll schedule restarted");
                }
                _ = ticks.tick() => {
                    let outcome = self.poll_once().await;
                    self.counters.record(outcome);
                }
            }
        }

        tracing::debug!(room = %self.room, "room poll loop stopped");
    }

    /// Run one tick: fetch since the stored cursor and dispatch the result.
    ///
    /// The subscription is checked again once the fetch resolves. A response
    /// for a subscription that is no longer current is dropped without
    /// touching the cursor, so a later subscription re-reads the same range.
    pub(crate) async fn poll_once(&self) -> TickOutcome {
        let Some(generation) = self.registry.generation(&self.room) else {
            return TickOutcome::Skipped;
        };

        let cursor = self.cursors.get(&self.room);
        let result = self.fetcher.fetch_events(&self.room, cursor.as_ref()).await;
        let handlers = self.current_handlers(generation);

        match (result, handlers) {
            (Err(error), Some(handlers)) => {
                tracing::warn!(room = %self.room, %error, "event fetch failed, retrying next tick");
                if panic::catch_unwind(AssertUnwindSafe(|| handlers.report_error(&error))).is_err() {
                    self.handler_panicked(None);
                }
                TickOutcome::Failed
            }
            (Err(error), None) => {
                tracing::debug!(room = %self.room, %error, "event fetch failed after unsubscribe");
                TickOutcome::Failed
            }
            (Ok(page), None) => {
                tracing::debug!(
                    room = %self.room,
                    %generation,
                    events = page.events.len(),
                    "discarding response for superseded subscription"
                );
                TickOutcome::Discarded
            }
            (Ok(page), Some(handlers)) => {
                let EventPage { cursor, events, .. } = page;
                self.cursors.set(&self.room, cursor);

                for event in &events {
                    match panic::catch_unwind(AssertUnwindSafe(|| handlers.dispatch(event))) {
                        Ok(true) => {}
                        Ok(false) => {
                            tracing::trace!(room = %self.room, id = %event.id, "no handler for event")
                        }
                        Err(_) => self.handler_panicked(Some(event.id.as_str())),
                    }
                }

                tracing::trace!(room = %self.room, count = events.len(), "dispatched events");
                TickOutcome::Dispatched(events.len())
            }
        }
    }

    fn handler_panicked(&self, event_id: Option<&str>) {
        self.counters.handler_panics.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            room = %self.room,
            ?event_id,
            "room handler panicked, continuing with the next event"
        );
    }

    /// Handlers to dispatch with, if `generation` is still the live subscription.
    fn current_handlers(&self, generation: SubscriptionGeneration) -> Option<Arc<EventHandlers>> {
        let slot = self.slot.read();
        let live = self.registry.is_current(&self.room, generation) && slot.generation <= generation;
        live.then(|| Arc::clone(&slot.handlers))
    }
}

/// A spawned room loop.
pub(crate) struct RoomPollTask {
    pub slot: SharedSlot,
    pub counters: Arc<RoomCounters>,
    pub started_at: Instant,
    period_tx: watch::Sender<Duration>,
    shutdown_tx: mpsc::Sender<()>,
    task_handle: JoinHandle<()>,
}

impl RoomPollTask {
    pub fn spawn(runtime: &Handle, room_loop: RoomLoop, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (period_tx, period_rx) = watch::channel(interval);
        let slot = Arc::clone(&room_loop.slot);
        let counters = Arc::clone(&room_loop.counters);
        let task_handle = runtime.spawn(room_loop.run(period_rx, shutdown_rx));

        Self {
            slot,
            counters,
            started_at: Instant::now(),
            period_tx,
            shutdown_tx,
            task_handle,
        }
    }

    /// Period the loop currently ticks at.
    pub fn interval(&self) -> Duration {
        *self.period_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.task_handle.is_finished()
    }

    /// Install `handlers` for a new subscription and restart the schedule at
    /// `interval`, with an immediate first tick.
    ///
    /// `subscribe` runs under the slot's write lock so a tick never sees the
    /// new generation paired with the old handlers.
    pub fn install(
        &self,
        handlers: Arc<EventHandlers>,
        interval: Duration,
        subscribe: impl FnOnce() -> SubscriptionGeneration,
    ) -> SubscriptionGeneration {
        let mut slot = self.slot.write();
        let generation = subscribe();
        *slot = HandlerSlot {
            generation,
            handlers,
        };
        drop(slot);

        self.period_tx.send_replace(interval);
        generation
    }

    /// Unsubscribe through `unsubscribe` and drop the room's handlers.
    pub fn release(&self, unsubscribe: impl FnOnce() -> bool) -> bool {
        release_handlers(&self.slot, unsubscribe)
    }

    pub fn weak_slot(&self) -> Weak<RwLock<HandlerSlot>> {
        Arc::downgrade(&self.slot)
    }

    /// Stop the loop after its current tick, aborting it if that takes
    /// longer than `grace`.
    pub async fn shutdown(mut self, grace: Duration) -> Result<()> {
        let _ = self.shutdown_tx.send(()).await;

        match timeout(grace, &mut self.task_handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(Err(e)) => Err(PollerError::ShutdownError(format!(
                "Room poll loop panicked: {e}"
            ))),
            Err(_) => {
                self.task_handle.abort();
                Err(PollerError::ShutdownError(format!(
                    "Room poll loop did not stop within {grace:?}"
                )))
            }
        }
    }
}

impl Drop for RoomPollTask {
    fn drop(&mut self) {
        self.task_handle.abort();
    }
}

/// Handle to one subscription started by
/// [`EventPoller::start_updates`](crate::EventPoller::start_updates).
///
/// Stopping through the handle only ends the subscription it was created for;
/// if the room was subscribed again since, the newer subscription keeps
/// running. Dropping the handle does not stop anything.
#[derive(Clone)]
pub struct UpdatesHandle {
    room: RoomId,
    generation: SubscriptionGeneration,
    registry: Arc<SubscriptionRegistry>,
    slot: Weak<RwLock<HandlerSlot>>,
}

impl UpdatesHandle {
    pub(crate) fn new(
        room: RoomId,
        generation: SubscriptionGeneration,
        registry: Arc<SubscriptionRegistry>,
        slot: Weak<RwLock<HandlerSlot>>,
    ) -> Self {
        Self {
            room,
            generation,
            registry,
            slot,
        }
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn generation(&self) -> SubscriptionGeneration {
        self.generation
    }

    /// Whether this subscription is still the room's live one.
    pub fn is_active(&self) -> bool {
        self.registry.is_current(&self.room, self.generation)
    }

    /// Stop delivering events for this subscription.
    ///
    /// A tick already in flight completes but its events are discarded, and
    /// the subscription's handlers are dropped. Returns whether the
    /// subscription was still active.
    pub fn stop(&self) -> bool {
        let unsubscribe = || self.registry.unsubscribe_generation(&self.room, self.generation);
        match self.slot.upgrade() {
            Some(slot) => release_handlers(&slot, unsubscribe),
            None => unsubscribe(),
        }
    }
}

impl std::fmt::Debug for UpdatesHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdatesHandle")
            .field("room", &self.room)
            .field("generation", &self.generation)
            .field("active", &self.is_active())
            .finish()
    }
}
