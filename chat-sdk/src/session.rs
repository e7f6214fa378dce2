//! ChatSession - main entry point for the SDK
//!
//! Wires one token holder into the HTTP client, the refresh broadcaster and
//! every room loop, so a refreshed token is picked up by the next fetch of
//! every room without restarting anything.

use std::sync::Arc;
use std::time::Duration;

use chat_api::{ChatClient, ClientConfig, EventFetcher, RoomId};
use chat_auth::{
    AuthError, ProactiveRefresh, Token, TokenHolder, TokenRefreshBroadcaster, TokenRefresher, TokenStream,
};
use chat_stream::{
    EventHandlers, EventPoller, PollerConfig, PollerStats, RoomUpdates, UpdatesHandle,
};

use crate::error::{Result, SessionError};

/// A connection to one chat application.
///
/// # Example
///
/// ```rust,ignore
/// use chat_sdk::{ChatSession, ClientConfig, EventHandlers, Token};
///
/// let session = ChatSession::builder(ClientConfig::new(endpoint, app_id, api_token))
///     .token(Token::new(user_token))
///     .refresher(|| async { exchange_refresh_secret().await })
///     .build()?;
///
/// session.start_updates(
///     "match-day",
///     EventHandlers::new()
///         .on_goal(|event| println!("GOAL: {}", event.body))
///         .on_event(|event| println!("{}", event.body)),
/// )?;
/// ```
pub struct ChatSession {
    tokens: TokenHolder,
    refresh: Option<TokenRefreshBroadcaster>,
    client: Arc<ChatClient>,
    poller: EventPoller,
    proactive: Option<ProactiveRefresh>,
}

impl ChatSession {
    pub fn builder(config: ClientConfig) -> ChatSessionBuilder {
        ChatSessionBuilder::new(config)
    }

    /// Deliver the events of `room` to `handlers` at the default interval.
    pub fn start_updates(
        &self,
        room: impl Into<RoomId>,
        handlers: EventHandlers,
    ) -> Result<UpdatesHandle> {
        Ok(self.poller.start_updates_default(room, handlers)?)
    }

    /// Deliver the events of `room` to `handlers` every `interval`.
    pub fn start_updates_every(
        &self,
        room: impl Into<RoomId>,
        interval: Duration,
        handlers: EventHandlers,
    ) -> Result<UpdatesHandle> {
        Ok(self.poller.start_updates(room, interval, handlers)?)
    }

    /// Stop delivering events for `room`. Returns whether it was subscribed.
    pub fn stop_updates(&self, room: &RoomId) -> bool {
        self.poller.stop_updates(room)
    }

    /// Receive the events of `room` through a stream.
    pub fn updates(&self, room: impl Into<RoomId>) -> Result<RoomUpdates> {
        Ok(self.poller.updates(room)?)
    }

    /// Refresh the token now, joining a refresh already in flight.
    pub async fn request_refresh(&self) -> Result<Token> {
        let broadcaster = self.refresh.as_ref().ok_or(SessionError::RefreshUnavailable)?;
        Ok(broadcaster.request_refresh().await?)
    }

    /// Stream of every token refreshed from now on.
    pub fn observe_tokens(&self) -> Result<TokenStream> {
        self.refresh
            .as_ref()
            .map(TokenRefreshBroadcaster::observe)
            .ok_or(SessionError::RefreshUnavailable)
    }

    pub fn tokens(&self) -> &TokenHolder {
        &self.tokens
    }

    pub fn client(&self) -> &Arc<ChatClient> {
        &self.client
    }

    pub fn poller(&self) -> &EventPoller {
        &self.poller
    }

    pub fn stats(&self) -> PollerStats {
        self.poller.stats()
    }

    /// Stop every room loop and the proactive refresh task.
    pub async fn shutdown(self) -> Result<()> {
        let polling = self.poller.shutdown_all().await;
        if let Some(proactive) = self.proactive {
            proactive.shutdown().await?;
        }
        tracing::info!("chat session shut down");
        Ok(polling?)
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("client", &self.client)
            .field("authenticated", &self.tokens.is_authenticated())
            .field("refresh", &self.refresh.is_some())
            .field("proactive_refresh", &self.proactive.is_some())
            .field("poller", &self.poller)
            .finish()
    }
}

/// Builder for [`ChatSession`].
pub struct ChatSessionBuilder {
    config: ClientConfig,
    token: Option<Token>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    poller_config: PollerConfig,
    refresh_every: Option<Duration>,
}

impl ChatSessionBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            token: None,
            refresher: None,
            poller_config: PollerConfig::default(),
            refresh_every: None,
        }
    }

    /// Initial user token. Without one, requests are sent unauthenticated.
    pub fn token(mut self, token: impl Into<Token>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Operation producing a fresh token, used whenever the service rejects
    /// the current one.
    pub fn refresher<R>(mut self, refresher: R) -> Self
    where
        R: TokenRefresher + 'static,
    {
        self.refresher = Some(Arc::new(refresher));
        self
    }

    pub fn poller_config(mut self, config: PollerConfig) -> Self {
        self.poller_config = config;
        self
    }

    /// Also refresh the token every `period`, ahead of expiry.
    ///
    /// Requires a refresher.
    pub fn refresh_every(mut self, period: Duration) -> Self {
        self.refresh_every = Some(period);
        self
    }

    pub fn build(self) -> Result<ChatSession> {
        let tokens = TokenHolder::new(self.token);
        let refresh = self
            .refresher
            .map(|refresher| TokenRefreshBroadcaster::from_arc(tokens.clone(), refresher));

        let mut client = ChatClient::new(self.config, tokens.clone())?;
        if let Some(broadcaster) = &refresh {
            client = client.with_refresh(broadcaster.clone());
        }
        let client = Arc::new(client);

        let proactive = match (self.refresh_every, &refresh) {
            (None, _) => None,
            (Some(_), None) => return Err(SessionError::RefreshUnavailable),
            (Some(period), _) if period.is_zero() => return Err(SessionError::InvalidRefreshPeriod),
            (Some(period), Some(broadcaster)) => {
                match ProactiveRefresh::start(broadcaster.clone(), period) {
                    Ok(proactive) => Some(proactive),
                    Err(AuthError::NoRuntime) => return Err(SessionError::NoRuntime),
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let fetcher: Arc<dyn EventFetcher> = Arc::clone(&client) as Arc<dyn EventFetcher>;
        let poller = EventPoller::new(fetcher, self.poller_config);

        tracing::debug!(
            endpoint = %client.config().endpoint,
            authenticated = tokens.is_authenticated(),
            refresh = refresh.is_some(),
            "chat session created"
        );

        Ok(ChatSession {
            tokens,
            refresh,
            client,
            poller,
            proactive,
        })
    }
}
