//! Application Configuration
//!
//! Loaded from a YAML file (`RECON_CONFIG_PATH`), inline YAML
//! (`RECON_CONFIG_YAML`) or individual `RECON_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Unified application configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener configuration
    pub server: ServerConfig,

    /// External script configuration
    pub runner: RunnerConfig,

    /// Landing page and static assets
    pub assets: AssetsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment and file
    pub fn load() -> Result<Self> {
        let config = match (
            std::env::var("RECON_CONFIG_PATH").ok(),
            std::env::var("RECON_CONFIG_YAML").ok(),
        ) {
            (Some(path), None) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path));
                }
                let content = std::fs::read_to_string(&path).map_err(ConfigError::FileRead)?;
                serde_yaml::from_str(&content).map_err(ConfigError::ParseYaml)?
            }
            (None, Some(yaml)) => serde_yaml::from_str(&yaml).map_err(ConfigError::ParseYaml)?,
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidValue(
                    "set only one of RECON_CONFIG_PATH and RECON_CONFIG_YAML".to_string(),
                ));
            }
            (None, None) => Self::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            runner: RunnerConfig::from_env()?,
            assets: AssetsConfig::from_env(),
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.runner.validate()?;
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("RECON_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("RECON_PORT".to_string()))?;

        let host = std::env::var("RECON_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(Self { host, port })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// External script configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Executable started for every job
    pub script_path: PathBuf,

    /// Working directory for the script
    pub working_dir: Option<PathBuf>,

    /// Kill jobs that run longer than this; unset means no limit
    pub job_timeout_secs: Option<u64>,

    /// Reject domains and tasks that are not plain hostnames and task names
    pub strict_arguments: bool,

    /// Output chunks buffered between the script and a slow client
    pub stream_buffer: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            script_path: PathBuf::from("./recon_ubuntu.sh"),
            working_dir: None,
            job_timeout_secs: None,
            strict_arguments: false,
            stream_buffer: 32,
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self> {
        let script_path = std::env::var("RECON_SCRIPT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./recon_ubuntu.sh"));

        let working_dir = std::env::var("RECON_WORKING_DIR").ok().map(PathBuf::from);

        let job_timeout_secs = std::env::var("RECON_JOB_TIMEOUT_SECS")
            .ok()
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue("RECON_JOB_TIMEOUT_SECS".to_string()))
            })
            .transpose()?;

        let strict_arguments = std::env::var("RECON_STRICT_ARGUMENTS")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .map_err(|_| ConfigError::InvalidValue("RECON_STRICT_ARGUMENTS".to_string()))?;

        let stream_buffer = std::env::var("RECON_STREAM_BUFFER")
            .unwrap_or_else(|_| "32".to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("RECON_STREAM_BUFFER".to_string()))?;

        Ok(Self {
            script_path,
            working_dir,
            job_timeout_secs,
            strict_arguments,
            stream_buffer,
        })
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.script_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "script_path cannot be empty".to_string(),
            ));
        }
        if self.job_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "job_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.stream_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "stream_buffer must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Landing page and static assets
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// File served at `/`
    pub index_path: PathBuf,

    /// Directory served under `/static`
    pub static_dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("index.html"),
            static_dir: PathBuf::from("static"),
        }
    }
}

impl AssetsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            index_path: std::env::var("RECON_INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_path),
            static_dir: std::env::var("RECON_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue("RECON_LOG_FORMAT".to_string())),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Log format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self> {
        let level = std::env::var("RECON_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let format = match std::env::var("RECON_LOG_FORMAT") {
            Ok(format) => format.parse()?,
            Err(_) => LogFormat::Text,
        };

        Ok(Self { level, format })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    FileRead(std::io::Error),

    #[error("Failed to parse YAML configuration: {0}")]
    ParseYaml(serde_yaml::Error),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
