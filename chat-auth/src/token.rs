//! The credential value and the shared cell that owns it.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Opaque user credential attached to outgoing requests.
///
/// The value is never parsed or inspected by the SDK. `Debug` output is
/// redacted so tokens do not leak into logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Create a new token from a string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the raw token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the token carries no value at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} bytes>)", self.0.len())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Shared, mutable cell holding the current token.
///
/// Cloning a holder yields another handle to the same cell. Writers replace
/// the whole value under a lock, so a reader never observes a partial write.
/// `None` means requests go out unauthenticated.
#[derive(Debug, Clone, Default)]
pub struct TokenHolder {
    current: Arc<RwLock<Option<Token>>>,
}

impl TokenHolder {
    /// Create a holder with an optional initial token.
    pub fn new(initial: Option<Token>) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }

    /// Current token, if any.
    pub fn get(&self) -> Option<Token> {
        self.current.read().clone()
    }

    /// Replace the current token, returning the previous one.
    pub fn set(&self, token: Option<Token>) -> Option<Token> {
        std::mem::replace(&mut *self.current.write(), token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }
}
