//! # chat-sdk
//!
//! Live chat room events over the hosted chat service's REST API.
//!
//! The service only offers a cursor-paginated pull endpoint. [`ChatSession`]
//! turns it into a push-style feed: one poll loop per room fetches the events
//! since the room's last cursor and hands them to typed callbacks, an async
//! receiver or a stream. The user token is held in one shared cell; when the
//! service rejects it the session refreshes it once, no matter how many rooms
//! noticed, and every room's next request carries the new token.
//!
//! ```rust,no_run
//! use chat_sdk::{ChatSession, ClientConfig, EventHandlers};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_sdk::SessionError> {
//!     chat_sdk::logging::init_logging(chat_sdk::logging::LoggingMode::Development)?;
//!
//!     let session = ChatSession::builder(ClientConfig::new(
//!         "https://api.example.com/api/v3",
//!         "my-app",
//!         "my-api-token",
//!     ))
//!     .token("user-token")
//!     .build()?;
//!
//!     let handle = session.start_updates(
//!         "match-day",
//!         EventHandlers::new()
//!             .on_goal(|event| println!("GOAL! {}", event.body))
//!             .on_event(|event| println!("{}: {}", event.eventtype, event.body))
//!             .on_error(|error| eprintln!("fetch failed: {error}")),
//!     )?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     handle.stop();
//!     session.shutdown().await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! chat-sdk (ChatSession, logging)
//!     ↓
//! chat-stream (EventPoller, SubscriptionRegistry, CursorStore)
//!     ↓
//! chat-api (ChatClient, ChatEvent, EventFetcher)
//!     ↓
//! chat-auth (TokenHolder, TokenRefreshBroadcaster)
//! ```

pub mod logging;

mod error;
mod session;

pub use error::{Result, SessionError};
pub use session::{ChatSession, ChatSessionBuilder};

pub use chat_api::{ApiError, ChatEvent, ChatUser, ClientConfig, Cursor, EventType, RoomId};
pub use chat_auth::{AuthError, Token, TokenHolder, TokenRefresher, TokenStream};
pub use chat_stream::{
    EventHandlers, PollerConfig, PollerError, PollerStats, RoomStats, RoomUpdates, UpdatesHandle,
};
