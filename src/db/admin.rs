//! Schema and database administration.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use diesel::migration::MigrationSource;
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use diesel::QueryableByName;
use tracing::info;

use super::connection;
use super::query::{self, identifier, Statement};
use super::record::{BaseModel, Record};
use super::registry::Registry;
use crate::error::{ConfigError, Error, Result};

/// Leading keywords of table constraints, which name no column.
const TABLE_CONSTRAINTS: &[&str] = &["CONSTRAINT", "PRIMARY", "FOREIGN", "UNIQUE", "CHECK"];

/// One row of `PRAGMA table_info`.
#[derive(QueryableByName)]
struct TableColumn {
    #[diesel(sql_type = Text)]
    name: String,
}

/// Column named by a DDL fragment such as `email TEXT NOT NULL`.
fn column_name(definition: &str) -> Option<&str> {
    let name = definition.split_whitespace().next()?;
    let constraint = TABLE_CONSTRAINTS
        .iter()
        .any(|keyword| name.eq_ignore_ascii_case(keyword));
    (!constraint).then_some(name)
}

impl Registry {
    /// Create `M`'s table if it does not exist, dropping it first when
    /// `drop` is set, then add any of `M`'s columns the table lacks. Base
    /// records also get an index on `deleted_at`.
    ///
    /// Added columns follow SQLite's `ADD COLUMN` rules: no `UNIQUE` or
    /// `PRIMARY KEY`, and `NOT NULL` needs a default.
    ///
    /// # Errors
    /// Returns database errors from the DDL.
    pub fn migrate<M: Record>(&self, tag: &str, drop: bool) -> Result<()> {
        self.with_session(tag, "migrate", |session| {
            let table = identifier(M::TABLE)?;
            if drop {
                session.execute(Statement::raw(format!("DROP TABLE IF EXISTS {table}")))?;
            }

            let mut columns: Vec<&str> = if M::BASE {
                BaseModel::COLUMNS.to_vec()
            } else {
                Vec::new()
            };
            columns.extend_from_slice(M::COLUMNS);
            session.execute(query::create_table(table, &columns)?)?;

            let existing: Vec<TableColumn> =
                session.load(Statement::raw(format!("PRAGMA table_info({table})")))?;
            for definition in &columns {
                let Some(column) = column_name(definition) else {
                    continue;
                };
                if existing.iter().any(|c| c.name.eq_ignore_ascii_case(column)) {
                    continue;
                }
                identifier(column)?;
                session.execute(Statement::raw(format!(
                    "ALTER TABLE {table} ADD COLUMN {definition}"
                )))?;
                info!(tag, table, column, "column added");
            }

            if M::BASE {
                session.execute(Statement::raw(format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_deleted_at ON {table} (deleted_at)"
                )))?;
            }
            Ok(())
        })
    }

    /// Run the pending migrations from `source` on `tag`, returning the
    /// versions applied.
    ///
    /// # Errors
    /// Returns a migration error if any migration fails.
    pub fn run_migrations<S>(&self, tag: &str, source: S) -> Result<Vec<String>>
    where
        S: MigrationSource<Sqlite>,
    {
        self.with_session(tag, "run_migrations", |session| {
            let applied = connection::run_migrations(session.connection(), source)?;
            if !applied.is_empty() {
                info!(tag, count = applied.len(), "migrations applied");
            }
            Ok(applied)
        })
    }

    /// Run a raw statement, returning the number of affected rows.
    ///
    /// # Errors
    /// Returns database errors.
    pub fn execute_raw(&self, tag: &str, sql: &str) -> Result<usize> {
        self.with_session(tag, "execute_raw", |session| {
            session.execute(Statement::raw(sql))
        })
    }

    /// Create the database `name` as a new file beside `tag`'s database
    /// file, by attaching and detaching it on a pooled connection.
    ///
    /// SQLite has no roles, so `owner` is checked and logged only.
    ///
    /// # Errors
    /// Returns identifier errors, a config error when `tag` is not backed by
    /// a file, and a database error when `name` already exists.
    pub fn create_database(&self, tag: &str, name: &str, owner: &str) -> Result<()> {
        self.with_session(tag, "create_database", |session| {
            let name = identifier(name)?;
            let owner = identifier(owner)?;
            let path = sibling_database(&self.url(tag)?, name)?;
            if path.exists() {
                return Err(Error::Database(format!("database \"{name}\" already exists")));
            }

            session.execute(
                Statement::raw(format!("ATTACH DATABASE ? AS {name}"))
                    .bind(path.display().to_string().into()),
            )?;
            session.execute(Statement::raw(format!("DETACH DATABASE {name}")))?;
            info!(tag, name, owner, path = %path.display(), "database created");
            Ok(())
        })
    }

    /// Remove the database `name` created by [`Registry::create_database`],
    /// along with its journal files.
    ///
    /// # Errors
    /// Returns identifier errors, a config error when `tag` is not backed by
    /// a file, and a database error when `name` does not exist or is `tag`'s
    /// own database.
    pub fn drop_database(&self, tag: &str, name: &str) -> Result<()> {
        self.with_session(tag, "drop_database", |_| {
            let name = identifier(name)?;
            let url = self.url(tag)?;
            let path = sibling_database(&url, name)?;
            if !path.exists() {
                return Err(Error::Database(format!("database \"{name}\" does not exist")));
            }
            if same_file(&path, database_file(&url)?) {
                return Err(Error::Database(
                    "cannot drop the currently open database".to_string(),
                ));
            }

            std::fs::remove_file(&path)?;
            for suffix in JOURNAL_SUFFIXES {
                let journal = PathBuf::from(format!("{}{suffix}", path.display()));
                match std::fs::remove_file(&journal) {
                    Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                    _ => {}
                }
            }
            info!(tag, name, path = %path.display(), "database dropped");
            Ok(())
        })
    }
}

/// Files SQLite keeps next to a database while it is in use.
const JOURNAL_SUFFIXES: &[&str] = &["-journal", "-wal", "-shm"];

/// Path of the file behind a SQLite connection string.
fn database_file(url: &str) -> Result<&Path> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("file:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" || url.contains("mode=memory") {
        return Err(ConfigError::InvalidValue {
            field: "url",
            reason: format!("'{url}' is not a database file"),
        }
        .into());
    }
    Ok(Path::new(path))
}

/// File for the database `name` in the directory of `url`'s database.
fn sibling_database(url: &str, name: &str) -> Result<PathBuf> {
    let dir = database_file(url)?
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok(dir.join(format!("{name}.db")))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Remove a file-backed database.
///
/// # Errors
/// Returns the IO error if the file cannot be removed.
pub fn delete_database_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::remove_file(path)?;
    info!(path = %path.display(), "database file deleted");
    Ok(())
}
