//! Bind values for dynamically built statements.

use std::fmt;

use chrono::NaiveDateTime;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Bool, Double, Nullable, Text, Timestamp};
use diesel::sqlite::Sqlite;
use uuid::Uuid;

use super::record::RecordId;

/// A boxed raw SQL query that binds are appended to one at a time.
pub(crate) type BoxedQuery<'f> = BoxedSqlQuery<'f, Sqlite, SqlQuery>;

/// A single bind parameter.
///
/// Filters, where-in lists, map inserts and column updates all take values
/// of this type so one helper can serve any column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Append this value to `query` as the next positional bind.
    pub(crate) fn bind<'f>(self, query: BoxedQuery<'f>) -> BoxedQuery<'f> {
        match self {
            Value::Null => query.bind::<Nullable<Text>, _>(None::<String>),
            Value::Text(text) => query.bind::<Text, _>(text),
            Value::Integer(int) => query.bind::<BigInt, _>(int),
            Value::Real(real) => query.bind::<Double, _>(real),
            Value::Bool(flag) => query.bind::<Bool, _>(flag),
            Value::Timestamp(ts) => query.bind::<Timestamp, _>(ts),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(text) => write!(f, "'{text}'"),
            Value::Integer(int) => write!(f, "{int}"),
            Value::Real(real) => write!(f, "{real}"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Timestamp(ts) => write!(f, "'{ts}'"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<RecordId> for Value {
    fn from(value: RecordId) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// JSON scalars map onto their SQL counterparts; arrays and objects are
/// stored as their JSON text.
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(flag),
            serde_json::Value::Number(number) => number
                .as_i64()
                .map(Value::Integer)
                .or_else(|| number.as_f64().map(Value::Real))
                .unwrap_or_else(|| Value::Text(number.to_string())),
            serde_json::Value::String(text) => Value::Text(text),
            other => Value::Text(other.to_string()),
        }
    }
}
