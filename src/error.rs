use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unsupported dialect '{0}' (expected sqlite)")]
    UnsupportedDialect(String),

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no connection registered for tag '{0}'")]
    UnknownTag(String),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("{keys} keys given for {values} values")]
    KeyValueMismatch { keys: usize, values: usize },

    #[error("unknown relation '{relation}' on table {table}")]
    UnknownRelation {
        table: &'static str,
        relation: String,
    },

    #[error("no columns to update on table {table}")]
    EmptyUpdate { table: &'static str },

    #[error("record for table {table} has no primary key value")]
    MissingPrimaryKey { table: &'static str },

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("not null constraint violated: {0}")]
    NotNullViolation(String),

    #[error("record not found")]
    NotFound,

    #[error("migration error: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<DieselError> for Error {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Error::NotFound,
            DieselError::DatabaseError(kind, info) => {
                let message = info.message().to_string();
                match kind {
                    DatabaseErrorKind::UniqueViolation => Error::UniqueViolation(message),
                    DatabaseErrorKind::ForeignKeyViolation => Error::ForeignKeyViolation(message),
                    DatabaseErrorKind::NotNullViolation => Error::NotNullViolation(message),
                    _ => Error::Database(message),
                }
            }
            other => Error::Database(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for Error {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Error::Connection(err.to_string())
    }
}

impl From<diesel::ConnectionError> for Error {
    fn from(err: diesel::ConnectionError) -> Self {
        Error::Connection(err.to_string())
    }
}

impl Error {
    /// Whether the error came from the database rejecting a statement, as
    /// opposed to a caller mistake detected before anything was executed.
    #[must_use]
    pub fn is_database(&self) -> bool {
        matches!(
            self,
            Error::UniqueViolation(_)
                | Error::ForeignKeyViolation(_)
                | Error::NotNullViolation(_)
                | Error::Database(_)
        )
    }
}
