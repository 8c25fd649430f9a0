//! Tagged connections and key/value query helpers over Diesel.
//!
//! [`Registry`] maps connection tags to r2d2 pools. The helpers on it are
//! generic over [`Record`] and forward to SQLite through Diesel's raw query
//! builder with bound parameters.

pub mod admin;
pub mod connection;
mod crud;
pub mod query;
pub mod record;
pub mod registry;
mod sql_log;
pub mod value;

pub use admin::delete_database_file;
pub use connection::{configure_sqlite_connection, create_pool, run_migrations, DbPool, PoolOptions};
pub use crud::Upsert;
pub use query::Page;
pub use record::{BaseModel, Preload, Record, RecordId};
pub use registry::{PoolStats, Registry};
pub use value::Value;
