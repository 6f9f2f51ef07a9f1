//! Server configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gattway_core::LinkConfig;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Radio timeout settings.
    pub radio: RadioConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            radio: RadioConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "server.bind".to_string(),
                message: format!("'{}' is not a valid host:port address", self.server.bind),
            });
        }
        for (field, secs) in [
            ("radio.connect_timeout_secs", self.radio.connect_timeout_secs),
            (
                "radio.discovery_timeout_secs",
                self.radio.discovery_timeout_secs,
            ),
            ("radio.read_timeout_secs", self.radio.read_timeout_secs),
            ("radio.write_timeout_secs", self.radio.write_timeout_secs),
            ("radio.scan_duration_secs", self.radio.scan_duration_secs),
        ] {
            if secs == 0 || secs > 300 {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: format!("{secs} is outside the accepted range (1-300 seconds)"),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, `host:port`.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Radio timeout settings, in whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    /// Bound on connection establishment.
    pub connect_timeout_secs: u64,
    /// Bound on attribute discovery.
    pub discovery_timeout_secs: u64,
    /// Bound on a characteristic read.
    pub read_timeout_secs: u64,
    /// Bound on a characteristic write.
    pub write_timeout_secs: u64,
    /// How long a discovery scan listens for advertisements.
    pub scan_duration_secs: u64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        let defaults = LinkConfig::default();
        Self {
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            discovery_timeout_secs: defaults.discovery_timeout.as_secs(),
            read_timeout_secs: defaults.read_timeout.as_secs(),
            write_timeout_secs: defaults.write_timeout.as_secs(),
            scan_duration_secs: defaults.scan_duration.as_secs(),
        }
    }
}

impl RadioConfig {
    /// Convert into the core's link configuration.
    pub fn to_link_config(&self) -> LinkConfig {
        LinkConfig::default()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .discovery_timeout(Duration::from_secs(self.discovery_timeout_secs))
            .read_timeout(Duration::from_secs(self.read_timeout_secs))
            .write_timeout(Duration::from_secs(self.write_timeout_secs))
            .scan_duration(Duration::from_secs(self.scan_duration_secs))
    }
}

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Could not read the file.
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// One or more fields failed validation.
    #[error("invalid configuration: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single field-level validation failure.
#[derive(Debug)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
