use reqwest::Client;
use shared::config::Config;
use shared::models::{
    DeleteRoomRequest, RenameRoomRequest, RoomId, RoomListResponse, RoomSummary, SortOrder,
};
use tracing::debug;
use url::Url;

use crate::error::ClientError;
use crate::rest::ensure_success;

/// REST client for the room directory (the sidebar's list/rename/delete).
#[derive(Debug, Clone)]
pub struct RoomDirectory {
    http: Client,
    api_base: Url,
    token: String,
}

impl RoomDirectory {
    /// Builds a directory client against the configured REST base.
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

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.api_base
            .join(path)
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    /// Lists the user's rooms in the given sort order.
    ///
    /// # Errors
    /// Transport or API failures.
    pub async fn list(&self, sort: SortOrder) -> Result<Vec<RoomSummary>, ClientError> {
        debug!(%sort, "listing rooms");
        let response = self
            .http
            .get(self.endpoint("chat/getAllRoom")?)
            .bearer_auth(&self.token)
            .query(&[("sort", sort.as_str())])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let parsed: RoomListResponse = response.json().await?;
        Ok(parsed.data)
    }

    /// Renames a room.
    ///
    /// # Errors
    /// Transport or API failures.
    pub async fn rename(&self, room: &RoomId, name: &str) -> Result<(), ClientError> {
        debug!(room = %room, name, "renaming room");
        let response = self
            .http
            .put(self.endpoint("chat/changeRoomName")?)
            .bearer_auth(&self.token)
            .json(&RenameRoomRequest {
                room_id: room.clone(),
                room_name: name.to_string(),
            })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Deletes a room. The caller is responsible for clearing the active
    /// room context if the deleted room was active.
    ///
    /// # Errors
    /// Transport or API failures.
    pub async fn delete(&self, room: &RoomId) -> Result<(), ClientError> {
        debug!(room = %room, "deleting room");
        let response = self
            .http
            .delete(self.endpoint("chat/deleteRoom")?)
            .bearer_auth(&self.token)
            .json(&DeleteRoomRequest {
                room_id: room.clone(),
            })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
