use std::io;
use std::path::PathBuf;
use std::{env, fs};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use shared::models::SortOrder;
use tracing::warn;

/// Small locally persisted preferences: the auth token, the theme flag, and
/// the chat-list sort order. Plain last-write-wins key-value storage; a
/// missing or unreadable file just yields defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    /// Bearer token for the REST and socket boundaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Dark-mode flag mirrored from the account on login.
    #[serde(default)]
    pub dark_mode: bool,

    /// Preferred sort order for the room directory listing.
    #[serde(default)]
    pub chat_sort: SortOrder,
}

impl Preferences {
    /// Location of the preferences file.
    ///
    /// `SATCHAT_CONFIG_DIR` overrides the platform config directory, which
    /// keeps tests and scripted use hermetic.
    #[must_use]
    pub fn path() -> PathBuf {
        if let Ok(dir) = env::var("SATCHAT_CONFIG_DIR") {
            return PathBuf::from(dir).join("prefs.toml");
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("satchat").join("prefs.toml"))
            .unwrap_or_else(|| PathBuf::from("./prefs.toml"))
    }

    /// Loads preferences, falling back to defaults when the file is missing
    /// or unreadable.
    #[must_use]
    pub fn load() -> Self {
        let path = Self::path();
        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|error| {
                warn!(path = %path.display(), %error, "ignoring corrupt preferences file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persists preferences, creating the parent directory as needed.
    ///
    /// # Errors
    /// I/O failures writing the file.
    pub fn save(&self) -> io::Result<()> {
        let path = Self::path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, content)
    }
}
