//! Registry of tagged database connections.
//!
//! Every helper selects its pool by tag. The registry only maps tags to
//! pools; pooling itself is r2d2's job.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::sqlite::Sqlite;
use diesel::SqliteConnection;
use tracing::{debug, error, info, warn};

use super::connection::{create_pool, DbPool, PoolOptions};
use super::query::Statement;
use super::sql_log::SqlLog;
use crate::config::{Config, Dialect};
use crate::error::{ConfigError, Error, Result};

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// A registered pool plus what is needed to rebuild it.
#[derive(Clone)]
struct Handle {
    url: String,
    options: PoolOptions,
    pool: DbPool,
    sql_log: Option<Arc<SqlLog>>,
}

/// Snapshot of a tag's pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub tag: String,
    pub connections: u32,
    pub idle_connections: u32,
    pub max_open_conns: u32,
}

/// Mapping from connection tag to live pool.
#[derive(Default)]
pub struct Registry {
    connections: DashMap<String, Handle>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Open `url` with default pool options and register it under `tag`.
    ///
    /// # Errors
    /// Returns a connection error if the pool cannot be built.
    pub fn connect(&self, dialect: Dialect, url: &str, tag: &str) -> Result<()> {
        self.connect_with(dialect, url, tag, PoolOptions::default())
    }

    /// Open `url` with `options` and register it under `tag`, replacing any
    /// previous entry for the tag.
    ///
    /// # Errors
    /// Returns a connection error if the pool cannot be built.
    pub fn connect_with(
        &self,
        dialect: Dialect,
        url: &str,
        tag: &str,
        options: PoolOptions,
    ) -> Result<()> {
        let pool = match create_pool(url, &options) {
            Ok(pool) => pool,
            Err(e) => {
                error!(tag, %dialect, error = %e, "database connection failed");
                return Err(e);
            }
        };

        let handle = Handle {
            url: url.to_string(),
            options,
            pool,
            sql_log: None,
        };
        if self.connections.insert(tag.to_string(), handle).is_some() {
            warn!(tag, "replaced existing connection");
        }
        info!(tag, %dialect, "database connected");
        Ok(())
    }

    /// Connect every database listed in `config`, applying its pool
    /// settings and SQL log file.
    ///
    /// # Errors
    /// Stops at the first database that fails to connect.
    pub fn connect_all(&self, config: &Config) -> Result<()> {
        for db in &config.databases {
            self.connect_with(db.dialect, &db.url, &db.tag, db.pool_options())?;
            if let Some(path) = &db.log_file {
                self.set_logger_file(&db.tag, path)?;
            }
        }
        Ok(())
    }

    /// Remove `tag`. Its pool closes once in-flight connections are returned.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTag`] if nothing is registered under `tag`.
    pub fn close(&self, tag: &str) -> Result<()> {
        match self.connections.remove(tag) {
            Some(_) => {
                info!(tag, "database closed");
                Ok(())
            }
            None => Err(Error::UnknownTag(tag.to_string())),
        }
    }

    /// Check out a connection and run `SELECT 1`.
    ///
    /// # Errors
    /// Returns an error if the tag is unknown or the database is unreachable.
    pub fn ping(&self, tag: &str) -> Result<()> {
        self.with_session(tag, "ping", |session| {
            session.execute(Statement::raw("SELECT 1"))?;
            Ok(())
        })
    }

    /// Registered tags, sorted.
    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        tags.sort();
        tags
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.connections.contains_key(tag)
    }

    /// Current pool state for `tag`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTag`] if nothing is registered under `tag`.
    pub fn stats(&self, tag: &str) -> Result<PoolStats> {
        let handle = self.handle(tag)?;
        let state = handle.pool.state();
        Ok(PoolStats {
            tag: tag.to_string(),
            connections: state.connections,
            idle_connections: state.idle_connections,
            max_open_conns: handle.pool.max_size(),
        })
    }

    /// Pool options currently in effect for `tag`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTag`] if nothing is registered under `tag`.
    pub fn pool_options(&self, tag: &str) -> Result<PoolOptions> {
        Ok(self.handle(tag)?.options)
    }

    /// Keep up to `count` idle connections open. Values above the pool size
    /// are lowered to it.
    ///
    /// # Errors
    /// Returns an error if the tag is unknown or the pool cannot be rebuilt.
    pub fn set_max_idle_conns(&self, tag: &str, count: u32) -> Result<()> {
        self.retune(tag, "set_max_idle_conns", |options| {
            options.max_idle_conns = Some(count.min(options.max_open_conns));
            Ok(())
        })
    }

    /// Cap the pool at `count` connections. A lower cap also lowers the idle
    /// setting.
    ///
    /// # Errors
    /// Returns a config error for `0`, or an error if the tag is unknown or
    /// the pool cannot be rebuilt.
    pub fn set_max_open_conns(&self, tag: &str, count: u32) -> Result<()> {
        self.retune(tag, "set_max_open_conns", |options| {
            if count == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "max_open_conns",
                    reason: "must be greater than 0".to_string(),
                }
                .into());
            }
            options.max_open_conns = count;
            options.max_idle_conns = options.max_idle_conns.map(|idle| idle.min(count));
            Ok(())
        })
    }

    /// Close connections older than `lifetime`. `None` or a zero duration
    /// keeps connections regardless of age.
    ///
    /// # Errors
    /// Returns an error if the tag is unknown or the pool cannot be rebuilt.
    pub fn set_conn_max_lifetime(&self, tag: &str, lifetime: Option<Duration>) -> Result<()> {
        self.retune(tag, "set_conn_max_lifetime", |options| {
            options.conn_max_lifetime = lifetime.filter(|d| !d.is_zero());
            Ok(())
        })
    }

    /// Write every statement executed on `tag` to the file at `path`.
    ///
    /// # Errors
    /// Returns an error if the tag is unknown or the file cannot be created.
    pub fn set_logger_file(&self, tag: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let result = self
            .handle(tag)
            .and_then(|_| SqlLog::create(path))
            .and_then(|log| {
                let mut handle = self
                    .connections
                    .get_mut(tag)
                    .ok_or_else(|| Error::UnknownTag(tag.to_string()))?;
                handle.sql_log = Some(Arc::new(log));
                Ok(())
            });
        match &result {
            Ok(()) => info!(tag, path = %path.display(), "SQL log enabled"),
            Err(e) => log_failure("set_logger_file", tag, e),
        }
        result
    }

    /// Rebuild the pool for `tag` with options adjusted by `adjust`.
    ///
    /// The entry stays locked from reading the options until the rebuilt
    /// pool is stored, so concurrent setters on one tag apply in turn. The
    /// old pool keeps serving connections already checked out from it.
    fn retune<F>(&self, tag: &str, op: &'static str, adjust: F) -> Result<()>
    where
        F: FnOnce(&mut PoolOptions) -> Result<()>,
    {
        let result = self
            .connections
            .get_mut(tag)
            .ok_or_else(|| Error::UnknownTag(tag.to_string()))
            .and_then(|mut entry| {
                let mut options = entry.options.clone();
                adjust(&mut options)?;
                entry.pool = create_pool(&entry.url, &options)?;
                entry.options = options;
                Ok(())
            });
        match &result {
            Ok(()) => debug!(tag, op, "pool rebuilt"),
            Err(e) => log_failure(op, tag, e),
        }
        result
    }

    /// Connection string `tag` was opened with.
    pub(crate) fn url(&self, tag: &str) -> Result<String> {
        Ok(self.handle(tag)?.url)
    }

    fn handle(&self, tag: &str) -> Result<Handle> {
        self.connections
            .get(tag)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::UnknownTag(tag.to_string()))
    }

    pub(crate) fn session(&self, tag: &str) -> Result<Session> {
        let handle = self.handle(tag)?;
        Ok(Session {
            tag: tag.to_string(),
            conn: handle.pool.get()?,
            sql_log: handle.sql_log,
        })
    }

    /// Run `f` on a pooled connection for `tag`, logging any failure under
    /// the operation name.
    pub(crate) fn with_session<T, F>(&self, tag: &str, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let result = self.session(tag).and_then(|mut session| f(&mut session));
        if let Err(e) = &result {
            log_failure(op, tag, e);
        }
        result
    }
}

/// Database rejections are errors; caller mistakes and missing rows are
/// warnings.
pub(crate) fn log_failure(op: &'static str, tag: &str, err: &Error) {
    if err.is_database() || matches!(err, Error::Connection(_) | Error::Migration(_)) {
        error!(op, tag, error = %err, "database operation failed");
    } else {
        warn!(op, tag, error = %err, "database operation rejected");
    }
}

/// A checked-out connection bound to its tag.
pub(crate) struct Session {
    tag: String,
    conn: PooledConnection<ConnectionManager<SqliteConnection>>,
    sql_log: Option<Arc<SqlLog>>,
}

impl Session {
    fn trace(&self, statement: &Statement) {
        debug!(tag = %self.tag, sql = statement.sql(), binds = ?statement.binds(), "executing statement");
        if let Some(log) = &self.sql_log {
            log.record(&self.tag, statement);
        }
    }

    /// Execute a statement, returning the number of affected rows.
    pub(crate) fn execute(&mut self, statement: Statement) -> Result<usize> {
        self.trace(&statement);
        Ok(statement.into_query().execute(&mut *self.conn)?)
    }

    pub(crate) fn load<M>(&mut self, statement: Statement) -> Result<Vec<M>>
    where
        M: QueryableByName<Sqlite> + 'static,
    {
        self.trace(&statement);
        Ok(statement.into_query().load::<M>(&mut *self.conn)?)
    }

    pub(crate) fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}
