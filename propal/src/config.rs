//! Server configuration
//!
//! Built-in defaults, then an optional `propal.toml`, then `PROPAL_*`
//! environment variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::agent::DEFAULT_MAX_STEPS;
use crate::app_state::DEFAULT_MAX_SESSIONS;

pub const DEFAULT_CONFIG_FILE: &str = "propal.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub model: ModelSettings,
    pub max_steps: usize,
    /// Chat sessions tracked at once
    pub max_sessions: usize,
    /// JSON file of knowledge entries for `askKnowledge`
    pub knowledge_path: Option<PathBuf>,
    /// Empty allows any origin
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub id: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            id: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            model: ModelSettings::default(),
            max_steps: DEFAULT_MAX_STEPS,
            max_sessions: DEFAULT_MAX_SESSIONS,
            knowledge_path: None,
            cors_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from the file and process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = non_empty(std::env::var("PROPAL_CONFIG_PATH").ok()).map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match find_from_cwd(DEFAULT_CONFIG_FILE) {
                Some(path) => Self::from_file(&path).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Ignoring config file; using built-in defaults");
                    Self::default()
                }),
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Override fields from `PROPAL_*` variables, as returned by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key));

        if let Some(value) = var("PROPAL_BIND_ADDR") {
            self.bind_addr = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PROPAL_BIND_ADDR",
                value,
            })?;
        }
        if let Some(value) = var("PROPAL_MODEL") {
            self.model.id = value;
        }
        if let Some(value) = var("PROPAL_MODEL_BASE_URL") {
            self.model.base_url = value;
        }
        if let Some(value) = var("PROPAL_API_KEY_ENV") {
            self.model.api_key_env = value;
        }
        if let Some(value) = var("PROPAL_MAX_STEPS") {
            self.max_steps = value
                .parse::<usize>()
                .ok()
                .filter(|steps| *steps > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "PROPAL_MAX_STEPS",
                    value,
                })?;
        }
        if let Some(value) = var("PROPAL_MAX_SESSIONS") {
            self.max_sessions = value
                .parse::<usize>()
                .ok()
                .filter(|sessions| *sessions > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "PROPAL_MAX_SESSIONS",
                    value,
                })?;
        }
        if let Some(value) = var("PROPAL_KNOWLEDGE_PATH") {
            self.knowledge_path = Some(PathBuf::from(value));
        }
        if let Some(value) = var("PROPAL_CORS_ORIGINS") {
            self.cors_origins = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// First `file_name` in `start` or one of its ancestors.
pub fn find_upwards(start: &Path, file_name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

/// [`find_upwards`] from the working directory.
pub fn find_from_cwd(file_name: &str) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_upwards(&cwd, file_name)
}
