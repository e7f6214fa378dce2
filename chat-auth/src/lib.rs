//! # chat-auth
//!
//! Credential plumbing for long-lived chat sessions.
//!
//! A [`TokenHolder`] is the single owned cell for the current user token. It is
//! injected into every request-issuing collaborator, which reads it lazily at
//! call time. The [`TokenRefreshBroadcaster`] replaces that token when it goes
//! stale: concurrent refresh requests collapse into one external call, the new
//! token is written to the holder and then pushed to every observer.
//!
//! ```rust,ignore
//! use chat_auth::{Token, TokenHolder, TokenRefreshBroadcaster};
//!
//! let holder = TokenHolder::new(Some(Token::new("initial")));
//! let broadcaster = TokenRefreshBroadcaster::new(holder.clone(), || async {
//!     Ok(Token::new("fresh"))
//! });
//!
//! let mut tokens = broadcaster.observe();
//! broadcaster.request_refresh().await?;
//! assert_eq!(tokens.next_token().await, Some(Token::new("fresh")));
//! ```

mod error;
mod proactive;
mod refresh;
mod token;

pub use error::{AuthError, Result};
pub use proactive::ProactiveRefresh;
pub use refresh::{TokenRefreshBroadcaster, TokenRefresher, TokenStream};
pub use token::{Token, TokenHolder};
