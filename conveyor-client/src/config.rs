//! Dispatcher configuration
//!
//! All credentials, header material, and poll budgets live in an explicit
//! configuration object handed to each dispatcher at construction; there is
//! no global state.

use std::time::Duration;
use thiserror::Error;

/// Invalid or incomplete dispatcher configuration
#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(String);

/// Configuration shared by the dispatchers
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL (e.g., "http://localhost:8080")
    pub backend_url: String,

    /// Bearer-style token identifying this orchestrator to the backend
    pub auth_token: String,

    /// Secret key forwarded so the backend can read and write the shared
    /// result store on the orchestrator's behalf
    pub secret_key: String,

    /// Database host hint forwarded as a header when set
    pub db_host: Option<String>,

    /// Managed database instance hint forwarded as a header when set
    pub db_instance: Option<String>,

    /// Wall-clock budget for the poll phase
    pub poll_timeout: Duration,

    /// Cap on a single result-poll backoff sleep
    pub poll_backoff_cap: Duration,

    /// Multiplier for the file-sentinel poll backoff (its sleeps grow as
    /// `multiplier * 2^attempt`, against the same cap)
    pub sentinel_backoff_multiplier: u64,
}

impl Config {
    /// Creates a new configuration with default poll budgets
    pub fn new(
        backend_url: impl Into<String>,
        auth_token: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            backend_url: backend_url.into(),
            auth_token: auth_token.into(),
            secret_key: secret_key.into(),
            db_host: None,
            db_instance: None,
            // Backend workers time out after an hour
            poll_timeout: Duration::from_secs(3600),
            poll_backoff_cap: Duration::from_secs(60),
            sentinel_backoff_multiplier: 5,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - CONVEYOR_BACKEND_URL (required)
    /// - CONVEYOR_AUTH_TOKEN (required)
    /// - CONVEYOR_SECRET_KEY (required)
    /// - CONVEYOR_DB_HOST (optional)
    /// - CONVEYOR_DB_INSTANCE (optional)
    /// - CONVEYOR_POLL_TIMEOUT (optional, seconds, default: 3600)
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend_url = std::env::var("CONVEYOR_BACKEND_URL")
            .map_err(|_| ConfigError("CONVEYOR_BACKEND_URL environment variable not set".to_string()))?;
        let auth_token = std::env::var("CONVEYOR_AUTH_TOKEN")
            .map_err(|_| ConfigError("CONVEYOR_AUTH_TOKEN environment variable not set".to_string()))?;
        let secret_key = std::env::var("CONVEYOR_SECRET_KEY")
            .map_err(|_| ConfigError("CONVEYOR_SECRET_KEY environment variable not set".to_string()))?;

        let mut config = Self::new(backend_url, auth_token, secret_key);

        config.db_host = std::env::var("CONVEYOR_DB_HOST").ok();
        config.db_instance = std::env::var("CONVEYOR_DB_INSTANCE").ok();

        if let Some(secs) = std::env::var("CONVEYOR_POLL_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.poll_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Sets the wall-clock poll budget
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Sets the database location hints
    pub fn with_db_hints(
        mut self,
        host: Option<String>,
        instance: Option<String>,
    ) -> Self {
        self.db_host = host;
        self.db_instance = instance;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_url.is_empty() {
            return Err(ConfigError("backend_url cannot be empty".to_string()));
        }

        if !self.backend_url.starts_with("http://") && !self.backend_url.starts_with("https://") {
            return Err(ConfigError("backend_url must start with http:// or https://".to_string()));
        }

        if self.auth_token.is_empty() {
            return Err(ConfigError("auth_token cannot be empty".to_string()));
        }

        if self.poll_timeout.as_secs() == 0 {
            return Err(ConfigError("poll_timeout must be greater than 0".to_string()));
        }

        if self.poll_backoff_cap.as_secs() == 0 {
            return Err(ConfigError("poll_backoff_cap must be greater than 0".to_string()));
        }

        Ok(())
    }
}
