//! Configuration loading for FAM services
//!
//! Resolution priority: environment variables override the TOML file,
//! which overrides built-in defaults.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Service configuration as read from fam.toml
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bind address for the HTTP listener
    pub host: String,
    /// Port for the HTTP listener
    pub port: u16,
    /// Path to the SQLite database file
    pub database_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5741,
            database_path: PathBuf::from("fam.db"),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file, then apply env overrides
    ///
    /// A missing file is not an error; defaults are used and a warning logged.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            toml::from_str(&text)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides()?;
        info!(
            host = %config.host,
            port = config.port,
            database = %config.database_path.display(),
            "Configuration resolved"
        );
        Ok(config)
    }

    /// Apply FAM_* environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("FAM_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("FAM_PORT") {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid FAM_PORT value: {}", port)))?;
        }
        if let Ok(db) = std::env::var("FAM_DATABASE_PATH") {
            self.database_path = PathBuf::from(db);
        }
        Ok(())
    }

    /// Socket address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
