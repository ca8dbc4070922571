use serde::{Deserialize, Serialize};

use super::{RoomId, Turn};

/// Payload of a `room:create` event: asks the backend to allocate a new room
/// seeded with the user's first message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomCreateRequest {
    pub message: String,
}

/// Payload of a `query:send` event: one user turn into an existing room.
///
/// `messages` carries the transcript as already known to the client, which
/// the backend uses as conversational context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuerySendRequest {
    pub message: String,
    pub room_id: RoomId,
    #[serde(default)]
    pub messages: Vec<Turn>,
}

/// Payload of a `room:created` confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreatedEvent {
    pub room_id: RoomId,
}

/// Payload of a `query:response` event: the assistant's reply for a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponseEvent {
    pub room_id: RoomId,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<serde_json::Value>,
}

impl QueryResponseEvent {
    /// Converts the reply into an assistant [`Turn`], carrying the display
    /// hints through unchanged.
    #[must_use]
    pub fn into_turn(self) -> Turn {
        Turn {
            sender: super::Sender::Ai,
            message: self.message,
            graph: self.ticker,
            table: self.table,
        }
    }
}

/// Events emitted by the client over the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload")]
pub enum ClientEvent {
    #[serde(rename = "room:create")]
    RoomCreate(RoomCreateRequest),
    #[serde(rename = "query:send")]
    QuerySend(QuerySendRequest),
}

/// Events pushed by the server over the socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "room:created")]
    RoomCreated(RoomCreatedEvent),
    #[serde(rename = "query:response")]
    QueryResponse(QueryResponseEvent),
}
