//! Authorized HTTP client for the chat service.
//!
//! Every request carries the application's API token and, when one is held,
//! the user token read from the shared [`TokenHolder`] at the moment the
//! request is built. A request that is already in flight keeps the token it
//! was built with; refreshed tokens apply from the next request on.

use std::time::Duration;

use async_trait::async_trait;
use chat_auth::{Token, TokenHolder, TokenRefreshBroadcaster};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, Result};
use crate::event::{ApiResponse, EventPage};
use crate::fetcher::EventFetcher;
use crate::types::{Cursor, RoomId};

/// Header carrying the application API token.
pub const API_TOKEN_HEADER: &str = "x-api-token";

/// Connection settings for [`ChatClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the service, e.g. `https://api.example.com/api/v3`
    pub endpoint: String,
    /// Application ID, the first path segment of every resource
    pub app_id: String,
    /// Application API token
    pub api_token: String,
    /// Timeout for a whole request
    pub request_timeout: Duration,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration with default timeouts.
    pub fn new(
        endpoint: impl Into<String>,
        app_id: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            app_id: app_id.into(),
            api_token: api_token.into(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }

    fn base_url(&self) -> Result<Url> {
        if self.app_id.trim().is_empty() {
            return Err(ApiError::InvalidConfig("app id must not be empty".to_string()));
        }
        let url = Url::parse(self.endpoint.trim())
            .map_err(|e| ApiError::InvalidConfig(format!("endpoint {:?}: {e}", self.endpoint)))?;
        if url.cannot_be_a_base() {
            return Err(ApiError::InvalidConfig(format!(
                "endpoint {:?} cannot be used as a base URL",
                self.endpoint
            )));
        }
        Ok(url)
    }
}

/// HTTP client for the chat service.
pub struct ChatClient {
    http: reqwest::Client,
    base: Url,
    config: ClientConfig,
    tokens: TokenHolder,
    refresh: Option<TokenRefreshBroadcaster>,
}

impl ChatClient {
    /// Create a client that authorizes requests with the token in `tokens`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidConfig` if the endpoint is not a valid base
    /// URL or the app id is empty.
    pub fn new(config: ClientConfig, tokens: TokenHolder) -> Result<Self> {
        let base = config.base_url()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http,
            base,
            config,
            tokens,
            refresh: None,
        })
    }

    /// Request a token refresh whenever the service rejects the current token.
    pub fn with_refresh(mut self, broadcaster: TokenRefreshBroadcaster) -> Self {
        self.refresh = Some(broadcaster);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenHolder {
        &self.tokens
    }

    /// Fetch the events of `room` that arrived after `cursor`.
    ///
    /// An absent or empty cursor reads from the beginning of the feed.
    pub async fn get_updates(&self, room: &RoomId, cursor: Option<&Cursor>) -> Result<EventPage> {
        let url = self.room_url(room, &["updates"])?;
        let mut request = self.http.get(url);
        if let Some(cursor) = cursor.filter(|cursor| !cursor.is_empty()) {
            request = request.query(&[("cursor", cursor.as_str())]);
        }

        tracing::debug!(%room, ?cursor, "requesting room updates");
        let sent_with = self.tokens.get();
        let response = self.authorized(request, sent_with.as_ref()).send().await?;
        self.read_envelope(response, sent_with.as_ref()).await
    }

    fn room_url(&self, room: &RoomId, tail: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidConfig("endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend([self.config.app_id.as_str(), "chat", "rooms", room.as_str()])
            .extend(tail);
        Ok(url)
    }

    /// Attach the API token and the user token read for this request.
    fn authorized(&self, request: RequestBuilder, token: Option<&Token>) -> RequestBuilder {
        let request = request.header(API_TOKEN_HEADER, &self.config.api_token);
        match token {
            Some(token) if !token.is_empty() => request.bearer_auth(token.as_str()),
            _ => request,
        }
    }

    async fn read_envelope<T: DeserializeOwned>(
        &self,
        response: Response,
        sent_with: Option<&Token>,
    ) -> Result<T> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.token_rejected(sent_with).await;
            return Err(ApiError::Unauthorized);
        }

        let body = response.bytes().await?;
        if !status.is_success() {
            let message = serde_json::from_slice::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> =
            serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
        envelope
            .data
            .ok_or_else(|| ApiError::Decode("response envelope carries no data".to_string()))
    }

    async fn token_rejected(&self, sent_with: Option<&Token>) {
        let Some(broadcaster) = &self.refresh else {
            tracing::warn!("token rejected and no refresher is configured");
            return;
        };
        // Another request already got the rejected token replaced.
        if self.tokens.get().as_ref() != sent_with {
            tracing::debug!("rejected token was already replaced");
            return;
        }

        match broadcaster.request_refresh().await {
            Ok(_) => tracing::info!("token rejected, refreshed for the next request"),
            Err(e) => tracing::warn!(error = %e, "token rejected and refresh failed"),
        }
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base", &self.base.as_str())
            .field("app_id", &self.config.app_id)
            .field("authenticated", &self.tokens.is_authenticated())
            .field("refresh", &self.refresh.is_some())
            .finish()
    }
}

#[async_trait]
impl EventFetcher for ChatClient {
    async fn fetch_events(&self, room: &RoomId, cursor: Option<&Cursor>) -> Result<EventPage> {
        self.get_updates(room, cursor).await
    }
}
