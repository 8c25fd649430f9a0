//! Tagdb - tagged database connections and generic key/value helpers.
//!
//! This crate keeps a registry of named database connections and exposes
//! CRUD helpers (get, list, update, delete, upsert, where-in) that forward
//! to Diesel on the connection selected by tag.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files with per-tag pool settings
//! - [`db`] - Connection registry, record contract and query helpers
//! - [`error`] - Error types for the crate
//! - [`cli`] - Operator commands used by the `tagdb` binary
//!
//! # Example
//!
//! ```no_run
//! use diesel::sql_types::Text;
//! use diesel::QueryableByName;
//! use tagdb::config::Dialect;
//! use tagdb::db::{BaseModel, Page, Record, Registry, Value};
//!
//! #[derive(diesel::QueryableByName)]
//! struct User {
//!     #[diesel(embed)]
//!     base: BaseModel,
//!     #[diesel(sql_type = Text)]
//!     email: String,
//! }
//!
//! impl Record for User {
//!     const TABLE: &'static str = "users";
//!     const COLUMNS: &'static [&'static str] = &["email TEXT NOT NULL UNIQUE"];
//!     const BASE: bool = true;
//!
//!     fn values(&self) -> Vec<(&'static str, Value)> {
//!         vec![("email", self.email.clone().into())]
//!     }
//!     fn base(&self) -> Option<&BaseModel> {
//!         Some(&self.base)
//!     }
//!     fn base_mut(&mut self) -> Option<&mut BaseModel> {
//!         Some(&mut self.base)
//!     }
//! }
//!
//! # fn main() -> tagdb::error::Result<()> {
//! let registry = Registry::global();
//! registry.connect(Dialect::Sqlite, "app.db", "main")?;
//! registry.migrate::<User>("main", false)?;
//!
//! let mut user = User { base: BaseModel::default(), email: "ada@example.com".into() };
//! registry.create("main", &mut user)?;
//!
//! let found: Option<User> = registry.key_value_get("main", "email", "ada@example.com")?;
//! let page: Vec<User> = registry.get_list("main", Page::new(20, 0))?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
