use super::ConfigError;
use crate::shared::EnvironmentName;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_HTTP_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_QUEUE_POLL_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub state_root: PathBuf,
    #[serde(default = "default_environment")]
    pub default_environment: String,
    #[serde(default = "default_http_bind")]
    pub http_bind: String,
    #[serde(default = "default_queue_poll_ms")]
    pub queue_poll_ms: u64,
    #[serde(default = "default_true")]
    pub coerce_numeric_arguments: bool,
}

impl Settings {
    pub fn with_state_root(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
            default_environment: default_environment(),
            http_bind: default_http_bind(),
            queue_poll_ms: default_queue_poll_ms(),
            coerce_numeric_arguments: true,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.state_root.is_absolute() {
            return Err(ConfigError::Settings(
                "`state_root` must be an absolute path".to_string(),
            ));
        }
        if self.default_environment.trim().is_empty() {
            return Err(ConfigError::Settings(
                "`default_environment` must be non-empty".to_string(),
            ));
        }
        EnvironmentName::parse(&self.default_environment).map_err(|err| {
            ConfigError::Settings(format!("`default_environment` is invalid: {err}"))
        })?;
        self.http_bind_addr()?;
        if self.queue_poll_ms == 0 {
            return Err(ConfigError::Settings(
                "`queue_poll_ms` must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.http_bind.parse().map_err(|_| {
            ConfigError::Settings(format!(
                "`http_bind` must be a socket address like {DEFAULT_HTTP_BIND}, got `{}`",
                self.http_bind
            ))
        })
    }
}

fn default_environment() -> String {
    "default".to_string()
}

fn default_http_bind() -> String {
    DEFAULT_HTTP_BIND.to_string()
}

fn default_queue_poll_ms() -> u64 {
    DEFAULT_QUEUE_POLL_MS
}

fn default_true() -> bool {
    true
}
