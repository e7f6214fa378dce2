//! Typed event callbacks.

use chat_api::{ApiError, ChatEvent, EventType};

type EventCallback = Box<dyn Fn(&ChatEvent) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&ApiError) + Send + Sync>;

/// Callbacks invoked for the events of one room.
///
/// Each event goes to exactly one callback: the one registered for its
/// [`EventType`], or `on_event` when the type has no dedicated callback or is
/// not recognized. Events without a matching callback are dropped.
///
/// ```rust,ignore
/// let handlers = EventHandlers::new()
///     .on_goal(|event| println!("GOAL: {}", event.body))
///     .on_event(|event| println!("{}: {}", event.eventtype, event.body))
///     .on_error(|error| eprintln!("fetch failed: {error}"));
/// ```
#[derive(Default)]
pub struct EventHandlers {
    on_event: Option<EventCallback>,
    on_goal: Option<EventCallback>,
    on_ad: Option<EventCallback>,
    on_reply: Option<EventCallback>,
    on_reaction: Option<EventCallback>,
    on_purge: Option<EventCallback>,
    on_error: Option<ErrorCallback>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generic callback, used for every event without a dedicated callback.
    pub fn on_event(mut self, f: impl Fn(&ChatEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Box::new(f));
        self
    }

    pub fn on_goal(mut self, f: impl Fn(&ChatEvent) + Send + Sync + 'static) -> Self {
        self.on_goal = Some(Box::new(f));
        self
    }

    /// Callback for advertisement events.
    pub fn on_ad(mut self, f: impl Fn(&ChatEvent) + Send + Sync + 'static) -> Self {
        self.on_ad = Some(Box::new(f));
        self
    }

    pub fn on_reply(mut self, f: impl Fn(&ChatEvent) + Send + Sync + 'static) -> Self {
        self.on_reply = Some(Box::new(f));
        self
    }

    pub fn on_reaction(mut self, f: impl Fn(&ChatEvent) + Send + Sync + 'static) -> Self {
        self.on_reaction = Some(Box::new(f));
        self
    }

    pub fn on_purge(mut self, f: impl Fn(&ChatEvent) + Send + Sync + 'static) -> Self {
        self.on_purge = Some(Box::new(f));
        self
    }

    /// Callback for failed fetches. The loop keeps running after a failure.
    pub fn on_error(mut self, f: impl Fn(&ApiError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    fn typed_callback(&self, event_type: &EventType) -> Option<&EventCallback> {
        match event_type {
            EventType::Goal => self.on_goal.as_ref(),
            EventType::Advertisement => self.on_ad.as_ref(),
            EventType::Reply => self.on_reply.as_ref(),
            EventType::Reaction => self.on_reaction.as_ref(),
            EventType::Purge => self.on_purge.as_ref(),
            EventType::Other(_) => None,
        }
    }

    /// Hand `event` to its callback. Returns whether a callback ran.
    pub fn dispatch(&self, event: &ChatEvent) -> bool {
        match self
            .typed_callback(&event.eventtype)
            .or(self.on_event.as_ref())
        {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    /// Report a failed fetch. Returns whether an error callback ran.
    pub fn report_error(&self, error: &ApiError) -> bool {
        match &self.on_error {
            Some(callback) => {
                callback(error);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_event", &self.on_event.is_some())
            .field("on_goal", &self.on_goal.is_some())
            .field("on_ad", &self.on_ad.is_some())
            .field("on_reply", &self.on_reply.is_some())
            .field("on_reaction", &self.on_reaction.is_some())
            .field("on_purge", &self.on_purge.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    fn recording_handlers() -> (EventHandlers, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let record = |label: &'static str, log: &Arc<Mutex<Vec<String>>>| {
            let log = Arc::clone(log);
            move |event: &ChatEvent| log.lock().unwrap().push(format!("{label}:{}", event.id))
        };

        let handlers = EventHandlers::new()
            .on_event(record("event", &log))
            .on_goal(record("goal", &log))
            .on_ad(record("ad", &log))
            .on_reply(record("reply", &log))
            .on_reaction(record("reaction", &log))
            .on_purge(record("purge", &log));
        (handlers, log)
    }

    #[rstest]
    #[case(EventType::Goal, "goal:e")]
    #[case(EventType::Advertisement, "ad:e")]
    #[case(EventType::Reply, "reply:e")]
    #[case(EventType::Reaction, "reaction:e")]
    #[case(EventType::Purge, "purge:e")]
    #[case(EventType::Other("speech".to_string()), "event:e")]
    #[case(EventType::Other(String::new()), "event:e")]
    fn test_dispatch_routes_by_type(#[case] event_type: EventType, #[case] expected: &str) {
        let (handlers, log) = recording_handlers();

        assert!(handlers.dispatch(&ChatEvent::new("e", event_type, "body")));
        assert_eq!(*log.lock().unwrap(), vec![expected.to_string()]);
    }

    #[test]
    fn test_typed_event_falls_back_to_generic() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let handlers = EventHandlers::new()
            .on_event(move |event: &ChatEvent| sink.lock().unwrap().push(event.id.clone()));

        handlers.dispatch(&ChatEvent::new("g", EventType::Goal, ""));
        handlers.dispatch(&ChatEvent::new("p", EventType::Purge, ""));

        assert_eq!(*log.lock().unwrap(), vec!["g".to_string(), "p".to_string()]);
    }

    #[test]
    fn test_unhandled_event_is_dropped() {
        let handlers = EventHandlers::new().on_goal(|_| {});
        assert!(!handlers.dispatch(&ChatEvent::new("r", EventType::Reply, "")));
    }

    #[test]
    fn test_report_error() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let handlers =
            EventHandlers::new().on_error(move |error: &ApiError| *sink.lock().unwrap() = Some(error.clone()));

        assert!(handlers.report_error(&ApiError::Unauthorized));
        assert_eq!(*seen.lock().unwrap(), Some(ApiError::Unauthorized));
        assert!(!EventHandlers::new().report_error(&ApiError::Unauthorized));
    }
}
