pub mod chat;
pub mod completion;
pub mod config;
pub mod rooms;
pub mod session;
