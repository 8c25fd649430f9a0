//! Statement building for the key/value helpers.
//!
//! Column names are spliced into SQL text, so every name passes through
//! [`identifier`] first; values always travel as positional binds.

use std::fmt::Write as _;

use diesel::sql_query;

use super::value::{BoxedQuery, Value};
use crate::error::{Error, Result};

/// Validate a (possibly table-qualified) column or table name.
pub(crate) fn identifier(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Validate a projection: `*` or a comma separated list of columns.
pub(crate) fn column_list(select: &str) -> Result<String> {
    let select = select.trim();
    if select == "*" {
        return Ok(select.to_string());
    }
    let columns = select
        .split(',')
        .map(|column| identifier(column.trim()))
        .collect::<Result<Vec<_>>>()?;
    Ok(columns.join(", "))
}

/// Limit and offset of a list query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// `None` returns every row after `offset`.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Page {
    #[must_use]
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    fn render(self, sql: &mut String) {
        match (self.limit, self.offset) {
            (None, 0) => {}
            // SQLite only accepts OFFSET after a LIMIT; -1 means unbounded.
            (None, offset) => {
                let _ = write!(sql, " LIMIT -1 OFFSET {offset}");
            }
            (Some(limit), 0) => {
                let _ = write!(sql, " LIMIT {limit}");
            }
            (Some(limit), offset) => {
                let _ = write!(sql, " LIMIT {limit} OFFSET {offset}");
            }
        }
    }
}

/// SQL text plus its positional binds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    sql: String,
    binds: Vec<Value>,
}

impl Statement {
    pub(crate) fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    pub(crate) fn bind(mut self, value: Value) -> Self {
        self.binds.push(value);
        self
    }

    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }

    pub(crate) fn binds(&self) -> &[Value] {
        &self.binds
    }

    pub(crate) fn into_query(self) -> BoxedQuery<'static> {
        let query: BoxedQuery<'static> = sql_query(self.sql).into_boxed();
        self.binds
            .into_iter()
            .fold(query, |query, value| value.bind(query))
    }
}

/// Conjunction of conditions shared by selects, updates and deletes.
#[derive(Debug, Default)]
pub(crate) struct Filter {
    conditions: Vec<String>,
    binds: Vec<Value>,
}

impl Filter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn eq(mut self, column: &str, value: Value) -> Result<Self> {
        let column = identifier(column)?;
        self.conditions.push(format!("{column} = ?"));
        self.binds.push(value);
        Ok(self)
    }

    /// `column IN (?, ...)`. Callers short-circuit empty lists.
    pub(crate) fn is_in(mut self, column: &str, values: Vec<Value>) -> Result<Self> {
        let column = identifier(column)?;
        let placeholders = vec!["?"; values.len()].join(", ");
        self.conditions.push(format!("{column} IN ({placeholders})"));
        self.binds.extend(values);
        Ok(self)
    }

    /// Exclude soft-deleted rows when the table has them.
    pub(crate) fn live_only(mut self, soft_delete: bool) -> Self {
        if soft_delete {
            self.conditions.push("deleted_at IS NULL".to_string());
        }
        self
    }

    fn render(self, sql: &mut String, binds: &mut Vec<Value>) {
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        binds.extend(self.binds);
    }
}

/// `SELECT columns FROM table WHERE ... LIMIT ... OFFSET ...`.
#[derive(Debug)]
pub(crate) struct Select {
    table: &'static str,
    columns: String,
    filter: Filter,
    page: Page,
}

impl Select {
    pub(crate) fn from(table: &'static str) -> Self {
        Self {
            table,
            columns: "*".to_string(),
            filter: Filter::new(),
            page: Page::all(),
        }
    }

    pub(crate) fn columns(mut self, select: &str) -> Result<Self> {
        self.columns = column_list(select)?;
        Ok(self)
    }

    pub(crate) fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub(crate) fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub(crate) fn build(self) -> Result<Statement> {
        let table = identifier(self.table)?;
        let mut sql = format!("SELECT {} FROM {table}", self.columns);
        let mut binds = Vec::new();
        self.filter.render(&mut sql, &mut binds);
        self.page.render(&mut sql);
        Ok(Statement { sql, binds })
    }
}

/// `INSERT INTO table (columns) VALUES (?, ...)`.
pub(crate) fn insert<'a, I>(table: &str, values: I) -> Result<Statement>
where
    I: IntoIterator<Item = (&'a str, Value)>,
{
    let table = identifier(table)?;
    let mut columns = Vec::new();
    let mut binds = Vec::new();
    for (column, value) in values {
        columns.push(identifier(column)?);
        binds.push(value);
    }
    if columns.is_empty() {
        return Ok(Statement::raw(format!("INSERT INTO {table} DEFAULT VALUES")));
    }
    let placeholders = vec!["?"; binds.len()].join(", ");
    Ok(Statement {
        sql: format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        ),
        binds,
    })
}

/// `UPDATE table SET ... WHERE ...`.
#[derive(Debug)]
pub(crate) struct Update {
    table: &'static str,
    assignments: Vec<String>,
    binds: Vec<Value>,
}

impl Update {
    pub(crate) fn table(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            binds: Vec::new(),
        }
    }

    pub(crate) fn set(mut self, column: &str, value: Value) -> Result<Self> {
        let column = identifier(column)?;
        self.assignments.push(format!("{column} = ?"));
        self.binds.push(value);
        Ok(self)
    }

    pub(crate) fn increment(mut self, column: &str) -> Result<Self> {
        let column = identifier(column)?;
        self.assignments.push(format!("{column} = {column} + 1"));
        Ok(self)
    }

    pub(crate) fn filter(self, filter: Filter) -> Result<Statement> {
        let table = identifier(self.table)?;
        if self.assignments.is_empty() {
            return Err(Error::EmptyUpdate { table: self.table });
        }
        let mut sql = format!("UPDATE {table} SET {}", self.assignments.join(", "));
        let mut binds = self.binds;
        filter.render(&mut sql, &mut binds);
        Ok(Statement { sql, binds })
    }
}

/// `DELETE FROM table WHERE ...`.
pub(crate) fn delete(table: &str, filter: Filter) -> Result<Statement> {
    let table = identifier(table)?;
    let mut sql = format!("DELETE FROM {table}");
    let mut binds = Vec::new();
    filter.render(&mut sql, &mut binds);
    Ok(Statement { sql, binds })
}

/// `CREATE TABLE IF NOT EXISTS table (columns)`.
pub(crate) fn create_table(table: &str, columns: &[&str]) -> Result<Statement> {
    let table = identifier(table)?;
    Ok(Statement::raw(format!(
        "CREATE TABLE IF NOT EXISTS {table} ({})",
        columns.join(", ")
    )))
}
