//! Room subscription tracking.
//!
//! The registry only records which rooms should receive live updates. It never
//! starts or stops a poll loop; loops read it as a gate on every tick.

use std::sync::atomic::{AtomicU64, Ordering};

use chat_api::RoomId;
use dashmap::DashMap;

/// Identifies one subscription of a room.
///
/// Every transition from unsubscribed to subscribed gets a fresh generation.
/// A tick captures the generation before fetching and only dispatches if it
/// is still current afterwards, so a stop followed by a restart while a fetch
/// is in flight still discards the stale response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionGeneration(u64);

impl SubscriptionGeneration {
    /// Get the raw generation value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Thread-safe set of subscribed rooms.
///
/// Keys are independent: operations on different rooms never wait on each
/// other beyond the map's shard locks.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    rooms: DashMap<RoomId, SubscriptionGeneration>,
    next_generation: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a room, returning its current generation.
    ///
    /// Idempotent: subscribing an already subscribed room keeps its
    /// generation.
    pub fn subscribe(&self, room: &RoomId) -> SubscriptionGeneration {
        *self
            .rooms
            .entry(room.clone())
            .or_insert_with(|| self.next())
            .value()
    }

    /// Subscribe a room under a fresh generation, superseding any current one.
    ///
    /// Responses fetched under the previous generation are discarded.
    pub fn resubscribe(&self, room: &RoomId) -> SubscriptionGeneration {
        let generation = self.next();
        self.rooms.insert(room.clone(), generation);
        generation
    }

    fn next(&self) -> SubscriptionGeneration {
        SubscriptionGeneration(self.next_generation.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Unsubscribe a room. Returns whether it was subscribed.
    ///
    /// Unsubscribing a room that is not subscribed is a no-op.
    pub fn unsubscribe(&self, room: &RoomId) -> bool {
        self.rooms.remove(room).is_some()
    }

    /// Unsubscribe a room only if `generation` is still its current one.
    ///
    /// Lets a consumer release its own subscription without cancelling a
    /// newer subscription of the same room.
    pub fn unsubscribe_generation(&self, room: &RoomId, generation: SubscriptionGeneration) -> bool {
        self.rooms
            .remove_if(room, |_, current| *current == generation)
            .is_some()
    }

    pub fn is_subscribed(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    /// Current generation of a room, if it is subscribed.
    pub fn generation(&self, room: &RoomId) -> Option<SubscriptionGeneration> {
        self.rooms.get(room).map(|entry| *entry.value())
    }

    /// Whether `room` is subscribed under exactly `generation`.
    pub fn is_current(&self, room: &RoomId, generation: SubscriptionGeneration) -> bool {
        self.generation(room) == Some(generation)
    }

    /// All currently subscribed rooms.
    pub fn rooms(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.rooms.len()
    }

    /// Unsubscribe every room.
    pub fn clear(&self) {
        self.rooms.clear();
    }
}
