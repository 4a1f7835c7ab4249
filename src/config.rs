//! Service configuration
//!
//! Values come from defaults, then `HOUSING_*` environment variables, then
//! command-line flags.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 8000;

/// Default model artifact written by the training pipeline
pub const DEFAULT_MODEL_PATH: &str = "models/best_model.json";

/// Default line-log sink
pub const DEFAULT_AUDIT_LOG: &str = "logs/predictions.log";

/// Default table sink
pub const DEFAULT_AUDIT_TABLE: &str = "logs/predictions.csv";

/// Default request size limit
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid bind address {0}")]
    InvalidAddress(String),

    #[error("Audit log and audit table must be different files ({0})")]
    SharedAuditPath(PathBuf),
}

/// Runtime configuration for the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub audit_log_path: PathBuf,
    pub audit_table_path: PathBuf,
    pub max_body_bytes: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            audit_log_path: PathBuf::from(DEFAULT_AUDIT_LOG),
            audit_table_path: PathBuf::from(DEFAULT_AUDIT_TABLE),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServiceConfig {
    /// Create from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match lookup("HOUSING_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "HOUSING_PORT".to_string(),
                value,
            })?,
            None => defaults.port,
        };

        let max_body_bytes = match lookup("HOUSING_MAX_BODY_BYTES") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "HOUSING_MAX_BODY_BYTES".to_string(),
                value,
            })?,
            None => defaults.max_body_bytes,
        };

        Ok(Self {
            host: lookup("HOUSING_HOST").unwrap_or(defaults.host),
            port,
            model_path: lookup("HOUSING_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            audit_log_path: lookup("HOUSING_AUDIT_LOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.audit_log_path),
            audit_table_path: lookup("HOUSING_AUDIT_TABLE")
                .map(PathBuf::from)
                .unwrap_or(defaults.audit_table_path),
            max_body_bytes,
        })
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.audit_log_path == self.audit_table_path {
            return Err(ConfigError::SharedAuditPath(self.audit_log_path.clone()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_body_bytes".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
