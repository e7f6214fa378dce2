//! Periodic token refresh ahead of expiry.
//!
//! The [`ProactiveRefresh`] task asks the broadcaster for a refresh on a fixed
//! period, so long-lived sessions rotate their token before the server starts
//! rejecting it. Refreshes go through [`TokenRefreshBroadcaster::request_refresh`]
//! and therefore join any refresh already in flight.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use crate::error::{AuthError, Result};
use crate::refresh::TokenRefreshBroadcaster;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Background task refreshing the token every `period`.
///
/// The first refresh happens one full period after start. Failed refreshes are
/// logged by the broadcaster and retried on the next period.
pub struct ProactiveRefresh {
    background_task: Option<JoinHandle<()>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl ProactiveRefresh {
    /// Start refreshing through `broadcaster` every `period`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidPeriod` if `period` is zero and
    /// `AuthError::NoRuntime` when called outside a tokio runtime.
    pub fn start(broadcaster: TokenRefreshBroadcaster, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(AuthError::InvalidPeriod);
        }
        let runtime = Handle::try_current().map_err(|_| AuthError::NoRuntime)?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let background_task = runtime.spawn(Self::refresh_task(broadcaster, period, shutdown_rx));

        Ok(Self {
            background_task: Some(background_task),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    async fn refresh_task(
        broadcaster: TokenRefreshBroadcaster,
        period: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::debug!(?period, "proactive token refresh started");

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    // Outcome is logged by the broadcaster.
                    let _ = broadcaster.request_refresh().await;
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        tracing::debug!("proactive token refresh stopped");
    }

    /// Stop the background task, waiting up to five seconds for it to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }

        let Some(task) = self.background_task.take() else {
            return Ok(());
        };

        match timeout(SHUTDOWN_TIMEOUT, task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AuthError::Shutdown(format!("Refresh task panicked: {e}"))),
            Err(_) => Err(AuthError::Shutdown(
                "Refresh task shutdown timed out after 5 seconds".to_string(),
            )),
        }
    }
}

impl Drop for ProactiveRefresh {
    fn drop(&mut self) {
        if let Some(task) = self.background_task.take() {
            task.abort();
        }
    }
}
