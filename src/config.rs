//! Configuration for the metadata service connection and retry policy

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Registration socket of the metadata service
pub const DEFAULT_SOCKET_PATH: &str = "/run/rkt/metadata-svc.sock";

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_PAUSE_MS: u64 = 1000;

const ENV_SOCKET: &str = "METADATA_SVC_SOCKET";
const ENV_RETRY_ATTEMPTS: &str = "METADATA_SVC_RETRY_ATTEMPTS";
const ENV_RETRY_PAUSE_MS: &str = "METADATA_SVC_RETRY_PAUSE_MS";
const ENV_VERBOSE: &str = "METADATA_SVC_VERBOSE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Fixed-pause retry policy applied to every metadata service call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub pause_ms: u64,
}

impl RetryConfig {
    pub fn new(max_attempts: usize, pause: Duration) -> Self {
        Self {
            max_attempts,
            pause_ms: u64::try_from(pause.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            pause_ms: DEFAULT_PAUSE_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    pub socket_path: PathBuf,
    pub retry: RetryConfig,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            retry: RetryConfig::default(),
            verbose: false,
            quiet: false,
        }
    }
}

impl RegistrarConfig {
    pub fn with_socket_path(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Self::default()
        }
    }

    /// Build a configuration from defaults overridden by `METADATA_SVC_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(socket) = lookup(ENV_SOCKET) {
            config.socket_path = PathBuf::from(socket);
        }
        if let Some(value) = lookup(ENV_RETRY_ATTEMPTS) {
            config.retry.max_attempts = parse_number(ENV_RETRY_ATTEMPTS, &value)?;
        }
        if let Some(value) = lookup(ENV_RETRY_PAUSE_MS) {
            config.retry.pause_ms = parse_number(ENV_RETRY_PAUSE_MS, &value)?;
        }
        config.verbose = lookup(ENV_VERBOSE).is_some_and(|v| v == "true" || v == "1");

        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "socket_path",
                value: String::new(),
                reason: "socket path cannot be empty".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_attempts",
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
