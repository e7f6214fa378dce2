//! Test doubles shared by the poller integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chat_stream::{ApiError, ChatEvent, Cursor, EventFetcher, EventHandlers, EventPage, EventType, RoomId};

/// Fetcher replaying a per-room script of responses.
///
/// Once a room's script runs out every fetch returns an empty page without a
/// cursor. Each fetch sleeps for the configured delay first.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<RoomId, VecDeque<chat_api::Result<EventPage>>>>,
    calls: Mutex<Vec<(RoomId, Option<Cursor>)>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn push(&self, room: &str, response: chat_api::Result<EventPage>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(RoomId::new(room))
            .or_default()
            .push_back(response);
    }

    pub fn push_page(&self, room: &str, cursor: Option<&str>, events: Vec<ChatEvent>) {
        self.push(room, Ok(page(cursor, events)));
    }

    pub fn push_error(&self, room: &str, error: ApiError) {
        self.push(room, Err(error));
    }

    /// Cursors passed to every fetch of `room`, in call order.
    pub fn cursors_sent(&self, room: &str) -> Vec<Option<Cursor>> {
        let room = RoomId::new(room);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| *called == room)
            .map(|(_, cursor)| cursor.clone())
            .collect()
    }

    pub fn call_count(&self, room: &str) -> usize {
        self.cursors_sent(room).len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventFetcher for ScriptedFetcher {
    async fn fetch_events(&self, room: &RoomId, cursor: Option<&Cursor>) -> chat_api::Result<EventPage> {
        self.calls.lock().unwrap().push((room.clone(), cursor.cloned()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.scripts
            .lock()
            .unwrap()
            .get_mut(room)
            .and_then(|script| script.pop_front())
            .unwrap_or_else(|| Ok(page(None, Vec::new())))
    }
}

pub fn page(cursor: Option<&str>, events: Vec<ChatEvent>) -> EventPage {
    EventPage::new(cursor.map(Cursor::new), events)
}

pub fn event(id: &str, eventtype: &str) -> ChatEvent {
    ChatEvent::new(id, EventType::from(eventtype), format!("body of {id}"))
}

/// Ordered log of `callback:event-id` entries.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn callback(&self, label: &'static str) -> impl Fn(&ChatEvent) + Send + Sync + 'static {
        let log = Arc::clone(&self.0);
        move |event: &ChatEvent| log.lock().unwrap().push(format!("{label}:{}", event.id))
    }

    pub fn error_callback(&self) -> impl Fn(&ApiError) + Send + Sync + 'static {
        let log = Arc::clone(&self.0);
        move |error: &ApiError| log.lock().unwrap().push(format!("error:{error}"))
    }

    /// Handlers recording goals, replies, errors and everything else.
    pub fn handlers(&self) -> EventHandlers {
        EventHandlers::new()
            .on_goal(self.callback("goal"))
            .on_reply(self.callback("reply"))
            .on_event(self.callback("event"))
            .on_error(self.error_callback())
    }
}
