//! Chat event models as returned by the updates endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Cursor;

/// Classification of a chat event, taken from its `eventtype` field.
///
/// Matching is case-insensitive. Types the SDK has no dedicated handler for
/// are kept verbatim in [`EventType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Goal,
    Advertisement,
    Reply,
    Reaction,
    Purge,
    Other(String),
}

impl EventType {
    /// Wire name of this event type.
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Goal => "goal",
            EventType::Advertisement => "advertisement",
            EventType::Reply => "reply",
            EventType::Reaction => "reaction",
            EventType::Purge => "purge",
            EventType::Other(raw) => raw,
        }
    }
}

impl Default for EventType {
    fn default() -> Self {
        EventType::Other(String::new())
    }
}

impl From<&str> for EventType {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "goal" => EventType::Goal,
            "advertisement" => EventType::Advertisement,
            "reply" => EventType::Reply,
            "reaction" => EventType::Reaction,
            "purge" => EventType::Purge,
            _ => EventType::Other(raw.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(raw: String) -> Self {
        EventType::from(raw.as_str())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a chat event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    pub userid: String,
    pub handle: Option<String>,
    pub displayname: Option<String>,
    pub pictureurl: Option<String>,
}

/// A single event in a room's feed. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Resource kind reported by the service, e.g. `chat.event`
    #[serde(default)]
    pub kind: String,
    pub id: String,
    pub roomid: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub eventtype: EventType,
    pub userid: Option<String>,
    pub user: Option<ChatUser>,
    /// When the service accepted the event
    pub added: Option<DateTime<Utc>>,
    /// Server timestamp in milliseconds
    pub ts: Option<i64>,
    /// Event this one replies or reacts to
    pub replytoid: Option<String>,
    pub customtype: Option<String>,
    pub custompayload: Option<String>,
}

impl ChatEvent {
    /// Build a minimal event, mostly useful in tests and fixtures.
    pub fn new(id: impl Into<String>, eventtype: EventType, body: impl Into<String>) -> Self {
        Self {
            kind: "chat.event".to_string(),
            id: id.into(),
            roomid: None,
            body: body.into(),
            eventtype,
            userid: None,
            user: None,
            added: None,
            ts: None,
            replytoid: None,
            customtype: None,
            custompayload: None,
        }
    }

    pub fn event_type(&self) -> &EventType {
        &self.eventtype
    }
}

/// One page of the updates feed: the events since the requested cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    #[serde(default)]
    pub kind: String,
    /// Position to resume from; may be absent or empty
    pub cursor: Option<Cursor>,
    /// Whether the server holds more events past this page
    #[serde(default)]
    pub more: bool,
    #[serde(default)]
    pub itemcount: u64,
    #[serde(default)]
    pub events: Vec<ChatEvent>,
}

impl EventPage {
    /// Build a page from a cursor and events.
    pub fn new(cursor: Option<Cursor>, events: Vec<ChatEvent>) -> Self {
        Self {
            kind: "list.chatevents".to_string(),
            cursor,
            more: false,
            itemcount: events.len() as u64,
            events,
        }
    }

    /// The cursor to continue from, ignoring empty cursors.
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref().filter(|cursor| !cursor.is_empty())
    }
}

/// Envelope wrapped around every service response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub kind: String,
    pub message: Option<String>,
    pub code: Option<u16>,
    pub data: Option<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("goal", EventType::Goal)]
    #[case("GOAL", EventType::Goal)]
    #[case("advertisement", EventType::Advertisement)]
    #[case("Reply", EventType::Reply)]
    #[case("reaction", EventType::Reaction)]
    #[case(" purge ", EventType::Purge)]
    #[case("speech", EventType::Other("speech".to_string()))]
    #[case("", EventType::Other(String::new()))]
    fn test_event_type_parsing(#[case] raw: &str, #[case] expected: EventType) {
        assert_eq!(EventType::from(raw), expected);
    }

    #[test]
    fn test_unknown_event_type_round_trips_verbatim() {
        let event_type = EventType::from("Announcement");
        assert_eq!(String::from(event_type), "Announcement");
    }

    #[test]
    fn test_chat_event_deserialization() {
        let json = r#"{
            "kind": "chat.event",
            "id": "evt-1",
            "roomid": "room-1",
            "body": "What a strike!",
            "eventtype": "goal",
            "userid": "u-7",
            "user": { "userid": "u-7", "handle": "fan7", "displayname": "Fan Seven" },
            "added": "2024-03-01T18:22:11.123Z",
            "ts": 1709317331123,
            "unknownfield": true
        }"#;

        let event: ChatEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.id, "evt-1");
        assert_eq!(event.eventtype, EventType::Goal);
        assert_eq!(event.user.as_ref().unwrap().handle.as_deref(), Some("fan7"));
        assert_eq!(event.ts, Some(1709317331123));
        assert!(event.added.is_some());
        assert!(event.replytoid.is_none());
    }

    #[test]
    fn test_missing_event_type_defaults_to_other() {
        let event: ChatEvent = serde_json::from_str(r#"{ "id": "evt-2" }"#).unwrap();
        assert_eq!(event.eventtype, EventType::Other(String::new()));
        assert_eq!(event.body, "");
    }

    #[test]
    fn test_event_page_envelope() {
        let json = r#"{
            "kind": "api.result",
            "message": "Success",
            "code": 200,
            "data": {
                "kind": "list.chatevents",
                "cursor": "c-42",
                "more": false,
                "itemcount": 1,
                "events": [ { "id": "evt-1", "eventtype": "reply", "body": "+1" } ]
            }
        }"#;

        let response: ApiResponse<EventPage> = serde_json::from_str(json).unwrap();
        let page = response.data.unwrap();
        assert_eq!(page.next_cursor(), Some(&Cursor::new("c-42")));
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].eventtype, EventType::Reply);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(Cursor::new("")))]
    fn test_page_without_usable_cursor(#[case] cursor: Option<Cursor>) {
        let page = EventPage::new(cursor, Vec::new());
        assert_eq!(page.next_cursor(), None);
    }
}
