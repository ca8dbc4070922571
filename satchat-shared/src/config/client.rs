use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};
use thiserror::Error;
use url::Url;

/// Failure loading or validating the client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value failed validation or could not be interpreted.
    #[error("{0}")]
    Invalid(String),
    /// The configuration file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The configuration file could not be parsed as YAML.
    #[error(transparent)]
    Yaml(#[from] serde_yml::Error),
    /// The configuration file could not be parsed as JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Reconnection policy for the socket transport.
///
/// The defaults mirror the backend's published client settings: up to ten
/// attempts, two seconds between the first retries, capped at five seconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Maximum number of reconnection attempts before giving up.
    pub max_attempts: u32,

    /// Delay before the first reconnection attempt, in milliseconds.
    pub initial_delay_ms: u64,

    /// Upper bound on the delay between attempts, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 2000,
            max_delay_ms: 5000,
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait before the given (zero-based) reconnection attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay_ms
            .saturating_mul(u64::from(attempt) + 1)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// The main configuration structure for the SatChat client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the REST backend (the `api/` prefix is appended).
    pub server_url: Url,

    /// URL of the socket endpoint.
    pub socket_url: Url,

    /// Number of history messages requested per page.
    pub page_size: u32,

    /// Seconds to wait for an assistant reply before reporting a failure.
    pub response_timeout_secs: u64,

    /// Seconds to wait for the socket handshake to complete.
    pub connect_timeout_secs: u64,

    /// Logging level
    pub log_level: String,

    /// Socket reconnection policy.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl Config {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            server_url: Url::parse("https://dev-user.olympus-demo.com/")
                .expect("default server URL is valid"),
            socket_url: Url::parse("wss://dev-user.olympus-demo.com/")
                .expect("default socket URL is valid"),
            page_size: crate::models::DEFAULT_PAGE_SIZE,
            response_timeout_secs: 45,
            connect_timeout_secs: 10,
            log_level: "info".to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Precedence, lowest to highest: built-in defaults, config file,
    /// `SATCHAT_*` environment variables, then the explicit server override.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to the configuration file.
    /// * `server_override` - Optional REST base URL overriding the configuration.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed, an
    /// environment variable holds an invalid value, or validation fails.
    pub fn load_config(
        config_path: Option<PathBuf>,
        server_override: Option<Url>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::with_defaults();

        // Load from file if provided
        if let Some(path) = config_path {
            let content = fs::read_to_string(&path)?;
            let file_config: Config =
                if path.extension().and_then(|ext| ext.to_str()) == Some("yaml") {
                    serde_yml::from_str(&content)?
                } else if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                    serde_json::from_str(&content)?
                } else {
                    return Err(ConfigError::Invalid(
                        "Unsupported configuration format. Use 'yaml' or 'json'.".to_string(),
                    ));
                };
            config = file_config;
        }

        // Use environment variables only if values are not already set
        let defaults = Config::with_defaults();
        if config.server_url == defaults.server_url {
            if let Ok(server) = env::var("SATCHAT_SERVER_URL") {
                config.server_url = Url::parse(&server).map_err(|_| {
                    ConfigError::Invalid("Invalid SATCHAT_SERVER_URL value: must be a valid URL".to_string())
                })?;
            }
        }
        if config.socket_url == defaults.socket_url {
            if let Ok(socket) = env::var("SATCHAT_SOCKET_URL") {
                config.socket_url = Url::parse(&socket).map_err(|_| {
                    ConfigError::Invalid("Invalid SATCHAT_SOCKET_URL value: must be a valid URL".to_string())
                })?;
            }
        }
        if config.page_size == defaults.page_size {
            if let Ok(page_size) = env::var("SATCHAT_PAGE_SIZE") {
                config.page_size = page_size.parse().map_err(|_| {
                    ConfigError::Invalid("Invalid SATCHAT_PAGE_SIZE value: must be a positive number".to_string())
                })?;
            }
        }
        if config.response_timeout_secs == defaults.response_timeout_secs {
            if let Ok(timeout) = env::var("SATCHAT_RESPONSE_TIMEOUT_SECS") {
                config.response_timeout_secs = timeout.parse().map_err(|_| {
                    ConfigError::Invalid(
                        "Invalid SATCHAT_RESPONSE_TIMEOUT_SECS value: must be a positive number".to_string(),
                    )
                })?;
            }
        }
        if config.log_level == defaults.log_level {
            if let Ok(log_level) = env::var("SATCHAT_LOG_LEVEL") {
                config.log_level = log_level;
            }
        }

        // Override with command-line arguments if provided
        if let Some(server) = server_override {
            config.server_url = server;
        }

        // Validate configuration
        if config.page_size == 0 {
            return Err(ConfigError::Invalid(
                "Invalid page size. Must be greater than 0.".to_string(),
            ));
        }
        if config.response_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "Invalid response timeout. Must be greater than 0.".to_string(),
            ));
        }
        match config.socket_url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "Invalid socket URL scheme '{other}'. Use 'ws' or 'wss'."
                )));
            }
        }

        Ok(config)
    }

    /// REST API base, i.e. the server URL with the `api/` prefix appended.
    ///
    /// # Errors
    /// Returns an error when the configured server URL cannot be a base.
    pub fn api_base(&self) -> Result<Url, url::ParseError> {
        self.server_url.join("api/")
    }

    /// Bounded wait for an assistant reply.
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// Bounded wait for the socket handshake.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn cleanup_env_vars() {
        unsafe {
            std::env::remove_var("SATCHAT_SERVER_URL");
            std::env::remove_var("SATCHAT_SOCKET_URL");
            std::env::remove_var("SATCHAT_PAGE_SIZE");
            std::env::remove_var("SATCHAT_RESPONSE_TIMEOUT_SECS");
            std::env::remove_var("SATCHAT_LOG_LEVEL");
        }
    }

    #[test]
    #[serial]
    fn test_load_config_defaults() {
        cleanup_env_vars();

        let config = Config::load_config(None, None).unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.response_timeout_secs, 45);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.socket_url.scheme(), "wss");
    }

    #[test]
    #[serial]
    fn test_load_config_from_yaml_file() {
        cleanup_env_vars();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            concat!(
                "server_url: \"http://localhost:9000/\"\n",
                "socket_url: \"ws://localhost:9000/\"\n",
                "page_size: 25\n",
                "response_timeout_secs: 30\n",
                "connect_timeout_secs: 5\n",
                "log_level: \"debug\"\n",
            )
        )
        .unwrap();

        let config = Config::load_config(Some(path), None).unwrap();
        assert_eq!(config.server_url.as_str(), "http://localhost:9000/");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.response_timeout_secs, 30);
        assert_eq!(config.log_level, "debug");
        // Unspecified sections fall back to defaults.
        assert_eq!(config.reconnect, ReconnectPolicy::default());
    }

    #[test]
    #[serial]
    fn test_load_config_from_json_file() {
        cleanup_env_vars();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let json = serde_json::json!({
            "server_url": "http://localhost:9000/",
            "socket_url": "ws://localhost:9000/",
            "page_size": 5,
            "response_timeout_secs": 60,
            "connect_timeout_secs": 10,
            "log_level": "trace"
        });
        std::fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

        let config = Config::load_config(Some(path), None).unwrap();
        assert_eq!(config.page_size, 5);
        assert_eq!(config.response_timeout_secs, 60);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    #[serial]
    fn test_load_config_rejects_unknown_extension() {
        cleanup_env_vars();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "page_size = 10").unwrap();

        let result = Config::load_config(Some(path), None);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_load_config_with_environment_variables() {
        cleanup_env_vars();

        unsafe {
            std::env::set_var("SATCHAT_SERVER_URL", "http://localhost:8000/");
            std::env::set_var("SATCHAT_SOCKET_URL", "ws://localhost:8000/");
            std::env::set_var("SATCHAT_PAGE_SIZE", "15");
            std::env::set_var("SATCHAT_LOG_LEVEL", "debug");
        }

        let config = Config::load_config(None, None).unwrap();
        assert_eq!(config.server_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.socket_url.as_str(), "ws://localhost:8000/");
        assert_eq!(config.page_size, 15);
        assert_eq!(config.log_level, "debug");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_load_config_invalid_page_size_environment() {
        cleanup_env_vars();

        unsafe {
            std::env::set_var("SATCHAT_PAGE_SIZE", "not-a-number");
        }

        let result = Config::load_config(None, None);
        assert!(result.is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_load_config_server_override_wins() {
        cleanup_env_vars();

        unsafe {
            std::env::set_var("SATCHAT_SERVER_URL", "http://localhost:8000/");
        }

        let override_url = Url::parse("http://localhost:7777/").unwrap();
        let config = Config::load_config(None, Some(override_url.clone())).unwrap();
        assert_eq!(config.server_url, override_url);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_load_config_rejects_non_ws_socket_scheme() {
        cleanup_env_vars();

        unsafe {
            std::env::set_var("SATCHAT_SOCKET_URL", "https://localhost:8000/");
        }

        let result = Config::load_config(None, None);
        assert!(result.is_err());

        cleanup_env_vars();
    }

    #[test]
    fn test_api_base_appends_prefix() {
        let config = Config::with_defaults();
        let base = config.api_base().unwrap();
        assert!(base.as_str().ends_with("/api/"));
    }

    #[test]
    fn test_reconnect_delay_is_capped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(5000));
        assert_eq!(policy.delay_for_attempt(9), Duration::from_millis(5000));
    }
}
