//! Database connection management using Diesel ORM.
//!
//! Provides connection pooling, per-connection pragmas, and migration
//! support for SQLite databases.

use std::time::Duration;

use diesel::migration::MigrationSource;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::Sqlite;
use diesel::SqliteConnection;
use diesel_migrations::MigrationHarness;

use crate::error::{ConfigError, Error, Result};

/// Type alias for a SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Pool settings applied when a tag's pool is (re)built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of connections, idle or in use.
    pub max_open_conns: u32,
    /// Idle connections kept ready. `None` keeps the pool full.
    pub max_idle_conns: Option<u32>,
    /// Connections older than this are closed. `None` keeps them forever.
    pub conn_max_lifetime: Option<Duration>,
    /// How long a checkout waits before failing.
    pub connection_timeout: Duration,
    /// SQLite `busy_timeout` set on every connection (milliseconds).
    pub busy_timeout_ms: u32,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_open_conns: 5,
            max_idle_conns: None,
            conn_max_lifetime: None,
            connection_timeout: Duration::from_secs(30),
            busy_timeout_ms: 5000,
        }
    }
}

impl PoolOptions {
    /// r2d2 panics on a zero pool size or lifetime, so both are rejected here.
    fn validate(&self) -> Result<()> {
        if self.max_open_conns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_open_conns",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.conn_max_lifetime == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidValue {
                field: "conn_max_lifetime",
                reason: "must be greater than 0 when set".to_string(),
            }
            .into());
        }
        if self.connection_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "connection_timeout",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Pragmas applied to each connection as the pool opens it.
#[derive(Debug)]
struct SqlitePragmas {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        configure_sqlite_connection(conn, self.busy_timeout_ms)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Configure SQLite connection pragmas used by every pooled connection.
///
/// # Errors
/// Returns an error if a pragma fails to apply.
pub fn configure_sqlite_connection(
    conn: &mut SqliteConnection,
    busy_timeout_ms: u32,
) -> QueryResult<()> {
    diesel::sql_query(format!("PRAGMA busy_timeout = {busy_timeout_ms}")).execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys = ON").execute(conn)?;
    Ok(())
}

/// Create a connection pool for the given database URL.
///
/// # Errors
/// Returns an error if the options are invalid or the pool cannot open its
/// initial connections.
pub fn create_pool(database_url: &str, options: &PoolOptions) -> Result<DbPool> {
    options.validate()?;
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(options.max_open_conns)
        .min_idle(
            options
                .max_idle_conns
                .map(|idle| idle.min(options.max_open_conns)),
        )
        .max_lifetime(options.conn_max_lifetime)
        .connection_timeout(options.connection_timeout)
        .connection_customizer(Box::new(SqlitePragmas {
            busy_timeout_ms: options.busy_timeout_ms,
        }))
        .build(manager)
        .map_err(|e| Error::Connection(e.to_string()))
}

/// Run all pending migrations from `source`, returning the applied versions.
///
/// # Errors
/// Returns an error if a migration fails.
pub fn run_migrations<S>(conn: &mut SqliteConnection, source: S) -> Result<Vec<String>>
where
    S: MigrationSource<Sqlite>,
{
    let applied = conn
        .run_pending_migrations(source)
        .map_err(|e| Error::Migration(e.to_string()))?;
    Ok(applied.iter().map(ToString::to_string).collect())
}
