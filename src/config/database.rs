//! Per-tag database connection configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::db::PoolOptions;
use crate::error::ConfigError;

/// SQL dialect of a configured connection.
///
/// Only SQLite is compiled in; other names are rejected when the
/// configuration is parsed rather than when the first query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Dialect {
    Sqlite,
}

impl FromStr for Dialect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            _ => Err(ConfigError::UnsupportedDialect(s.to_string())),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// One `[[databases]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Tag the connection is registered under.
    pub tag: String,
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,
    /// Connection string, e.g. a file path or `sqlite://path`.
    pub url: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_open_conns")]
    pub max_open_conns: u32,
    /// Idle connections the pool keeps ready.
    #[serde(default)]
    pub max_idle_conns: Option<u32>,
    /// Maximum lifetime of a pooled connection (seconds).
    #[serde(default)]
    pub conn_max_lifetime_secs: Option<u64>,
    /// SQLite busy timeout applied to every pooled connection (milliseconds).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,
    /// File receiving a line for every statement executed on this tag.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_dialect() -> Dialect {
    Dialect::Sqlite
}

const fn default_max_open_conns() -> u32 {
    5
}

const fn default_busy_timeout_ms() -> u32 {
    5000
}

impl DatabaseConfig {
    /// Pool options described by this entry.
    #[must_use]
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_open_conns: self.max_open_conns,
            max_idle_conns: self.max_idle_conns,
            conn_max_lifetime: self.conn_max_lifetime_secs.map(Duration::from_secs),
            busy_timeout_ms: self.busy_timeout_ms,
            ..PoolOptions::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.tag.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "tag" });
        }
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "url" });
        }
        if self.max_open_conns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_open_conns",
                reason: "must be greater than 0".to_string(),
            });
        }
        if let Some(idle) = self.max_idle_conns {
            if idle > self.max_open_conns {
                return Err(ConfigError::InvalidValue {
                    field: "max_idle_conns",
                    reason: format!("must be <= max_open_conns ({})", self.max_open_conns),
                });
            }
        }
        if self.conn_max_lifetime_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "conn_max_lifetime_secs",
                reason: "must be greater than 0 when set".to_string(),
            });
        }
        Ok(())
    }
}
