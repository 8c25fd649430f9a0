//! Record contract shared by every query helper.
//!
//! A [`Record`] describes how a Rust type maps onto a table: its name, its
//! primary key, the column DDL used by [`Registry::migrate`], and the values
//! written on insert and update. Reads go through Diesel's
//! [`QueryableByName`], so a record type derives it alongside the impl.
//!
//! [`Registry::migrate`]: super::Registry::migrate

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow, QueryableByName};
use diesel::expression::AsExpression;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::{Nullable, Text, Timestamp};
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::Value;
use super::Registry;
use crate::error::Result;

/// Generated unique identifier of a [`BaseModel`] record.
///
/// Stored as hyphenated UUID text.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh random (v4) identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Whether no identifier has been assigned yet.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromSql<Text, Sqlite> for RecordId {
    fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let text = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
        Ok(Self(Uuid::parse_str(&text)?))
    }
}

impl ToSql<Text, Sqlite> for RecordId {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.0.to_string());
        Ok(IsNull::No)
    }
}

/// Columns most persisted entities carry: an identifier assigned before
/// insertion plus creation, update and soft-delete timestamps.
///
/// Embed it with `#[diesel(embed)]` and set [`Record::BASE`].
#[derive(Debug, Clone, Default, PartialEq, QueryableByName, Serialize, Deserialize)]
pub struct BaseModel {
    #[diesel(sql_type = Text)]
    pub id: RecordId,
    #[diesel(sql_type = Nullable<Timestamp>)]
    #[serde(skip)]
    pub created_at: Option<NaiveDateTime>,
    #[diesel(sql_type = Nullable<Timestamp>)]
    #[serde(skip)]
    pub updated_at: Option<NaiveDateTime>,
    #[diesel(sql_type = Nullable<Timestamp>)]
    #[serde(skip)]
    pub deleted_at: Option<NaiveDateTime>,
}

impl BaseModel {
    /// Column definitions prepended to a base record's table.
    pub const COLUMNS: &'static [&'static str] = &[
        "id TEXT PRIMARY KEY NOT NULL",
        "created_at TIMESTAMP",
        "updated_at TIMESTAMP",
        "deleted_at TIMESTAMP",
    ];

    /// Assign an identifier if none is set and stamp both timestamps.
    pub(crate) fn before_create(&mut self, now: NaiveDateTime) {
        if self.id.is_nil() {
            self.id = RecordId::new();
        }
        self.created_at.get_or_insert(now);
        self.updated_at = Some(now);
    }

    pub(crate) fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.into()),
            ("created_at", self.created_at.into()),
            ("updated_at", self.updated_at.into()),
            ("deleted_at", self.deleted_at.into()),
        ]
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Mapping between a Rust type and a table.
pub trait Record: QueryableByName<Sqlite> + Sized {
    /// Table name.
    const TABLE: &'static str;

    /// Column matched by [`Registry::increment`].
    const PRIMARY_KEY: &'static str = "id";

    /// Column definitions used by [`Registry::migrate`], excluding the
    /// [`BaseModel`] columns.
    const COLUMNS: &'static [&'static str];

    /// Set when the type embeds a [`BaseModel`]. Enables identifier
    /// generation, timestamps and soft delete.
    const BASE: bool = false;

    /// Values written on insert and update, excluding [`BaseModel`] columns.
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Value of the primary key column, or [`Value::Null`] when the record
    /// has none yet. Records without a [`BaseModel`] must override this.
    fn primary_key(&self) -> Value {
        self.base()
            .filter(|base| !base.id.is_nil())
            .map_or(Value::Null, |base| base.id.into())
    }

    fn base(&self) -> Option<&BaseModel> {
        None
    }

    fn base_mut(&mut self) -> Option<&mut BaseModel> {
        None
    }
}

/// Records with named relations that can be loaded after the record itself.
pub trait Preload: Record {
    /// Relations loaded when autoload is requested.
    const RELATIONS: &'static [&'static str];

    /// Load `relation` into `self`, reading through `registry` on `tag`.
    ///
    /// Only names listed in [`Preload::RELATIONS`] are passed in.
    fn preload(&mut self, registry: &Registry, tag: &str, relation: &str) -> Result<()>;
}
