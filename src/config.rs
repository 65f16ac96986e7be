use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

/// Static worker configuration, loaded from `config.toml`.
///
/// Per-installation cadence settings live in the database instead
/// (see [`crate::models::ScheduleState`]) so they can change while the
/// worker is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_lock_path")]
    pub lock_path: String,

    pub llm_api_key: Option<String>,

    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,

    #[serde(default = "default_similarity_model")]
    pub similarity_model: String,

    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Newest titles sent to the coarse similarity pass.
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("speedy-digest");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_db_path() -> String {
    data_dir().join("digest.db").to_string_lossy().to_string()
}

fn default_lock_path() -> String {
    std::env::temp_dir()
        .join("speedy-digest-scheduler.lock")
        .to_string_lossy()
        .to_string()
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_similarity_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_summary_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_poll_interval() -> u64 {
    30
}

fn default_candidate_cap() -> usize {
    1000
}

fn default_http_timeout() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            lock_path: default_lock_path(),
            llm_api_key: None,
            llm_base_url: default_llm_base_url(),
            similarity_model: default_similarity_model(),
            summary_model: default_summary_model(),
            poll_interval_secs: default_poll_interval(),
            candidate_cap: default_candidate_cap(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("speedy-digest")
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(AppError::Config(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.candidate_cap == 0 {
            return Err(AppError::Config(
                "candidate_cap must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
