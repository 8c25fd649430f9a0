//! Configuration loading from TOML files.

pub mod database;
pub mod logging;

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

pub use database::{DatabaseConfig, Dialect};
pub use logging::LoggingConfig;

/// Top-level configuration: logging plus the tagged databases to connect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is malformed,
    /// or validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize tracing from the `[logging]` section.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Look up a configured database by tag.
    #[must_use]
    pub fn database(&self, tag: &str) -> Option<&DatabaseConfig> {
        self.databases.iter().find(|db| db.tag == tag)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for db in &self.databases {
            db.validate()?;
            if !seen.insert(db.tag.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "tag",
                    reason: format!("'{}' is configured more than once", db.tag),
                }
                .into());
            }
        }
        Ok(())
    }
}
