use async_trait::async_trait;
use reqwest::Client;
use shared::config::Config;
use shared::models::{HistoryPage, HistoryResponse, RoomId};
use tracing::debug;
use url::Url;

use crate::error::ClientError;
use crate::rest::ensure_success;

/// The REST boundary the history fetcher speaks to.
///
/// A trait seam so the pagination and room-switch races can be exercised
/// against scripted fakes in tests.
#[async_trait]
pub trait HistoryApi: Send + Sync {
    /// Requests one page of messages for `room`, newest page first.
    ///
    /// # Errors
    /// Transport or API failures; the caller releases its in-flight gate and
    /// may retry.
    async fn fetch_page(
        &self,
        room: &RoomId,
        page: u32,
        limit: u32,
    ) -> Result<HistoryPage, ClientError>;
}

impl std::fmt::Debug for dyn HistoryApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HistoryApi")
    }
}

/// [`HistoryApi`] over the real backend.
#[derive(Debug, Clone)]
pub struct RestHistoryClient {
    http: Client,
    api_base: Url,
    token: String,
}

impl RestHistoryClient {
    /// Builds a history client against the configured REST base.
    ///
    /// # Errors
    /// Fails when the configured server URL cannot serve as a base.
    pub fn new(config: &Config, token: impl Into<String>) -> Result<Self, ClientError> {
        let api_base = config
            .api_base()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self {
            http: Client::new(),
            api_base,
            token: token.into(),
        })
    }
}

#[async_trait]
impl HistoryApi for RestHistoryClient {
    async fn fetch_page(
        &self,
        room: &RoomId,
        page: u32,
        limit: u32,
    ) -> Result<HistoryPage, ClientError> {
        let endpoint = self
            .api_base
            .join("chat/getAllMessage")
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        debug!(room = %room, page, limit, "fetching history page");

        let response = self
            .http
            .get(endpoint)
            .bearer_auth(&self.token)
            .query(&[
                ("roomId", room.as_str().to_string()),
                ("page", page.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let parsed: HistoryResponse = response.json().await?;
        Ok(parsed.into_page())
    }
}
