//! `taskstream.ron` settings with environment overrides.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use taskstream_core::DEFAULT_LOG_CAPACITY;
use taskstream_engine::{EngineConfig, DEFAULT_ENDPOINT, DEFAULT_LLM_MODEL};

pub const SETTINGS_FILENAME: &str = "taskstream.ron";
pub const ENV_ENDPOINT: &str = "TASKSTREAM_ENDPOINT";
pub const ENV_STATE_DIR: &str = "TASKSTREAM_STATE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub endpoint: String,
    pub client_id: Option<String>,
    pub state_dir: PathBuf,
    pub llm_model: String,
    pub max_parallel_browsers: u32,
    pub log_capacity: usize,
    pub log_level: String,
    /// Log file; `None` logs to stderr only.
    pub log_file: Option<PathBuf>,
    pub backoff_secs: u64,
    pub watchdog_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client_id: None,
            state_dir: PathBuf::from(".taskstream"),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            max_parallel_browsers: 1,
            log_capacity: DEFAULT_LOG_CAPACITY,
            log_level: "info".to_string(),
            log_file: Some(PathBuf::from("taskstream.log")),
            backoff_secs: 3,
            watchdog_secs: 5,
        }
    }
}

impl AppSettings {
    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        ron::from_str(&text).with_context(|| format!("parsing settings in {}", path.display()))
    }

    /// Applies overrides; `lookup` is `std::env::var` outside tests.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|value| !value.trim().is_empty()) {
            self.endpoint = endpoint.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_STATE_DIR).filter(|value| !value.trim().is_empty()) {
            self.state_dir = PathBuf::from(dir.trim());
        }
        self
    }

    pub fn level_filter(&self) -> LevelFilter {
        stream_logging::parse_level(&self.log_level).unwrap_or(LevelFilter::Info)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default().with_endpoint(self.endpoint.clone());
        if let Some(client_id) = &self.client_id {
            config.connection.client_id = client_id.clone();
        }
        config.connection.backoff = Duration::from_secs(self.backoff_secs);
        config.connection.watchdog = Duration::from_secs(self.watchdog_secs);
        config.llm_model = self.llm_model.clone();
        config.max_parallel_browsers = self.max_parallel_browsers;
        config.log_capacity = self.log_capacity;
        config
    }
}
