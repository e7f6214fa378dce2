//! # chat-api
//!
//! Typed access to the hosted chat service's event feed.
//!
//! This crate holds the data model consumed by the real-time layer
//! ([`ChatEvent`], [`EventPage`], [`RoomId`], [`Cursor`]), the
//! [`EventFetcher`] seam the poller depends on, and [`ChatClient`], the
//! reqwest-backed implementation that authorizes every request with the token
//! currently held in a [`chat_auth::TokenHolder`].

mod client;
mod error;
mod event;
mod fetcher;
mod types;

pub use client::{ChatClient, ClientConfig, API_TOKEN_HEADER};
pub use error::{ApiError, Result};
pub use event::{ApiResponse, ChatEvent, ChatUser, EventPage, EventType};
pub use fetcher::EventFetcher;
pub use types::{Cursor, RoomId};

// Re-export the credential types every client needs
pub use chat_auth::{Token, TokenHolder, TokenRefreshBroadcaster};
