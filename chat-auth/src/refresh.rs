//! Single-flight token refresh with fan-out to observers.
//!
//! This module contains the [`TokenRefreshBroadcaster`] which handles:
//! - Collapsing concurrent refresh requests into one external refresh call
//! - Writing the refreshed token into the shared [`TokenHolder`]
//! - Pushing every refreshed token to all live observers
//! - Handing a failed outcome only to the callers of that attempt

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::{AuthError, Result};
use crate::token::{Token, TokenHolder};

/// Capacity of the observer channel. Observers that fall further behind skip
/// to the most recent tokens.
const OBSERVER_CAPACITY: usize = 16;

/// External operation that exchanges credentials for a fresh token.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<Token>>`, so a
/// closure is usually enough.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Obtain a new token from the auth server.
    async fn refresh_token(&self) -> Result<Token>;
}

#[async_trait]
impl<F, Fut> TokenRefresher for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Token>> + Send + 'static,
{
    async fn refresh_token(&self) -> Result<Token> {
        (self)().await
    }
}

type RefreshFlight = Shared<BoxFuture<'static, Result<Token>>>;

struct Inner {
    holder: TokenHolder,
    refresher: Arc<dyn TokenRefresher>,
    in_flight: Mutex<Option<RefreshFlight>>,
    sender: broadcast::Sender<Token>,
    refresh_calls: AtomicU64,
}

/// Clears the in-flight slot when the refresh task finishes, even by panic.
struct FlightGuard<'a> {
    slot: &'a Mutex<Option<RefreshFlight>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

impl Inner {
    async fn run_refresh(&self) -> Result<Token> {
        let _guard = FlightGuard {
            slot: &self.in_flight,
        };
        let attempt = self.refresh_calls.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(attempt, "invoking external token refresh");

        let outcome = self.refresher.refresh_token().await;
        match &outcome {
            Ok(token) => {
                self.holder.set(Some(token.clone()));
                // No observers is not an error.
                let observers = self.sender.send(token.clone()).unwrap_or(0);
                tracing::info!(attempt, observers, "token refreshed");
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "token refresh failed, keeping last known token");
            }
        }
        outcome
    }
}

/// Coordinates token refreshes for every component sharing a [`TokenHolder`].
///
/// Cloning yields another handle to the same broadcaster. Observers created by
/// [`observe`](Self::observe) complete once every handle has been dropped.
#[derive(Clone)]
pub struct TokenRefreshBroadcaster {
    inner: Arc<Inner>,
}

impl TokenRefreshBroadcaster {
    /// Create a broadcaster that writes refreshed tokens into `holder`.
    pub fn new<R>(holder: TokenHolder, refresher: R) -> Self
    where
        R: TokenRefresher + 'static,
    {
        Self::from_arc(holder, Arc::new(refresher))
    }

    /// Create a broadcaster from an already shared refresher.
    pub fn from_arc(holder: TokenHolder, refresher: Arc<dyn TokenRefresher>) -> Self {
        let (sender, _) = broadcast::channel(OBSERVER_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                holder,
                refresher,
                in_flight: Mutex::new(None),
                sender,
                refresh_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Signal that the current token may be stale and wait for the outcome.
    ///
    /// If a refresh is already in flight this call joins it and receives the
    /// same outcome; otherwise a new refresh is started on the tokio runtime.
    /// The refresh runs to completion even if every caller stops waiting.
    pub async fn request_refresh(&self) -> Result<Token> {
        self.join_or_start().await
    }

    fn join_or_start(&self) -> RefreshFlight {
        let mut slot = self.inner.in_flight.lock();
        if let Some(flight) = slot.as_ref() {
            tracing::debug!("joining in-flight token refresh");
            return flight.clone();
        }

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.run_refresh().await });
        let flight = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(AuthError::Interrupted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        *slot = Some(flight.clone());
        flight
    }

    /// Subscribe to refreshed tokens.
    ///
    /// Only refreshes that complete after this call are delivered; earlier
    /// tokens are not replayed.
    pub fn observe(&self) -> TokenStream {
        TokenStream::new(self.inner.sender.subscribe())
    }

    /// The holder this broadcaster writes to.
    pub fn holder(&self) -> &TokenHolder {
        &self.inner.holder
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Number of times the external refresher has been invoked.
    pub fn refresh_calls(&self) -> u64 {
        self.inner.refresh_calls.load(Ordering::Relaxed)
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }
}

impl std::fmt::Debug for TokenRefreshBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRefreshBroadcaster")
            .field("refreshing", &self.is_refreshing())
            .field("refresh_calls", &self.refresh_calls())
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Push-style stream of refreshed tokens.
pub struct TokenStream {
    inner: BoxStream<'static, Token>,
}

impl TokenStream {
    fn new(rx: broadcast::Receiver<Token>) -> Self {
        let inner = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(token) => return Some((token, rx)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "token observer lagged behind");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed();

        Self { inner }
    }

    /// Wait for the next refreshed token.
    ///
    /// Returns `None` once the broadcaster has been torn down.
    pub async fn next_token(&mut self) -> Option<Token> {
        self.inner.next().await
    }
}

impl Stream for TokenStream {
    type Item = Token;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Token>> {
        self.inner.poll_next_unpin(cx)
    }
}
