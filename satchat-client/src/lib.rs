#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod chat;
pub mod connection;
pub mod error;
pub mod history;
pub mod prefs;
mod rest;
pub mod rooms;
pub mod session;
pub mod transcript;

pub use chat::{ChatClient, ChatOptions, ChatUpdate, FetchOutcome, FetchResults};
pub use connection::{Connection, ConnectionConfig, ConnectionManager, ConnectionStatus, LiveEvents};
pub use error::ClientError;
pub use history::{HistoryApi, RestHistoryClient};
pub use prefs::Preferences;
pub use rooms::RoomDirectory;
pub use session::{ConversationSession, FetchTicket, SessionToken};
pub use transcript::Transcript;
