use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use taskstream_core::DEFAULT_LOG_CAPACITY;
use thiserror::Error;
use url::Url;

use crate::sender::RetryPolicy;

/// Source of receipt timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000/ws";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("endpoint `{endpoint}` is not a valid url: {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
    },
    #[error("endpoint scheme must be ws or wss, got `{0}`")]
    UnsupportedScheme(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Timing and identity of the connection actor.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoint: String,
    pub client_id: String,
    pub connect_timeout: Duration,
    /// Delay before reconnecting after an unclean close.
    pub backoff: Duration,
    /// Liveness check period.
    pub watchdog: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client_id: format!("taskstream-{}", std::process::id()),
            connect_timeout: Duration::from_secs(10),
            backoff: Duration::from_secs(3),
            watchdog: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct EngineConfig {
    pub connection: ConnectionSettings,
    pub retry: RetryPolicy,
    pub llm_model: String,
    pub max_parallel_browsers: u32,
    pub log_capacity: usize,
    pub clock: Clock,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            retry: RetryPolicy::default(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            max_parallel_browsers: 1,
            log_capacity: DEFAULT_LOG_CAPACITY,
            clock: Arc::new(Utc::now),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("connection", &self.connection)
            .field("retry", &self.retry)
            .field("llm_model", &self.llm_model)
            .field("max_parallel_browsers", &self.max_parallel_browsers)
            .field("log_capacity", &self.log_capacity)
            .finish_non_exhaustive()
    }
}

impl EngineConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.connection.endpoint = endpoint.into();
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn validate(&self) -> Result<Url, ConfigError> {
        let endpoint = &self.connection.endpoint;
        let url = Url::parse(endpoint).map_err(|source| ConfigError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            source,
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::Zero("retry attempts"));
        }
        if self.connection.watchdog.is_zero() {
            return Err(ConfigError::Zero("watchdog interval"));
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::Zero("log capacity"));
        }
        Ok(url)
    }
}
