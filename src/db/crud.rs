//! Key/value query helpers.
//!
//! Each helper builds one statement and runs it on the pool registered
//! under `tag`. Records embedding a [`BaseModel`](super::BaseModel) get
//! identifiers and timestamps stamped here and their soft-deleted rows are
//! hidden from every read.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Utc};
use diesel::deserialize::QueryableByName;
use diesel::sqlite::Sqlite;

use super::query::{self, Filter, Page, Select, Update};
use super::record::{Preload, Record, RecordId};
use super::registry::{log_failure, Registry, Session};
use super::value::Value;
use crate::error::{Error, Result};

/// Outcome of [`Registry::key_value_update_or_create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// Existing rows were updated.
    Updated(usize),
    /// Nothing matched, so the record was inserted.
    Created,
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn insert_record<M: Record>(session: &mut Session, record: &mut M) -> Result<()> {
    if let Some(base) = record.base_mut() {
        base.before_create(now());
    }
    let mut values = record.base().map(|base| base.values()).unwrap_or_default();
    values.extend(record.values());
    session.execute(query::insert(M::TABLE, values)?)?;
    Ok(())
}

fn update_record<M: Record>(
    session: &mut Session,
    record: &mut M,
    key: &str,
    value: Value,
) -> Result<usize> {
    let mut update = Update::table(M::TABLE);
    for (column, column_value) in record.values() {
        update = update.set(column, column_value)?;
    }
    if let Some(base) = record.base_mut() {
        let stamp = now();
        base.updated_at = Some(stamp);
        update = update.set("updated_at", stamp.into())?;
    }
    let filter = Filter::new().eq(key, value)?.live_only(M::BASE);
    session.execute(update.filter(filter)?)
}

impl Registry {
    /// Insert `record`, assigning its identifier and timestamps first when it
    /// embeds a base model.
    ///
    /// # Errors
    /// Returns constraint violations and other database errors.
    pub fn create<M: Record>(&self, tag: &str, record: &mut M) -> Result<()> {
        self.with_session(tag, "create", |session| insert_record(session, record))
    }

    /// Insert a row into `M`'s table from a column/value map.
    ///
    /// For base records a missing `id` is generated and missing timestamps
    /// are stamped. Returns the generated identifier, if any.
    ///
    /// # Errors
    /// Returns identifier and database errors.
    pub fn create_from_map<M, K, I>(&self, tag: &str, values: I) -> Result<Option<RecordId>>
    where
        M: Record,
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut columns: BTreeMap<String, Value> = values
            .into_iter()
            .map(|(column, value)| (column.into(), value))
            .collect();
        let mut generated = None;
        if M::BASE {
            if !columns.contains_key("id") {
                let id = RecordId::new();
                columns.insert("id".to_string(), id.into());
                generated = Some(id);
            }
            let stamp = now();
            columns
                .entry("created_at".to_string())
                .or_insert_with(|| stamp.into());
            columns
                .entry("updated_at".to_string())
                .or_insert_with(|| stamp.into());
        }

        self.with_session(tag, "create_from_map", |session| {
            let statement = query::insert(
                M::TABLE,
                columns
                    .iter()
                    .map(|(column, value)| (column.as_str(), value.clone())),
            )?;
            session.execute(statement)?;
            Ok(generated)
        })
    }

    /// First row where `key = value`.
    ///
    /// # Errors
    /// Returns identifier and database errors; a missing row is `Ok(None)`.
    pub fn key_value_get<M>(&self, tag: &str, key: &str, value: impl Into<Value>) -> Result<Option<M>>
    where
        M: Record + 'static,
    {
        let value = value.into();
        self.with_session(tag, "key_value_get", |session| {
            let filter = Filter::new().eq(key, value)?.live_only(M::BASE);
            first(session, Select::from(M::TABLE).filter(filter))
        })
    }

    /// First row matching every `keys[i] = values[i]` pair.
    ///
    /// # Errors
    /// Returns [`Error::KeyValueMismatch`] when the slices differ in length.
    pub fn multi_key_value_get<M>(&self, tag: &str, keys: &[&str], values: &[Value]) -> Result<Option<M>>
    where
        M: Record + 'static,
    {
        self.with_session(tag, "multi_key_value_get", |session| {
            if keys.len() != values.len() {
                return Err(Error::KeyValueMismatch {
                    keys: keys.len(),
                    values: values.len(),
                });
            }
            let mut filter = Filter::new();
            for (key, value) in keys.iter().zip(values) {
                filter = filter.eq(key, value.clone())?;
            }
            first(session, Select::from(M::TABLE).filter(filter.live_only(M::BASE)))
        })
    }

    /// Rows where `key = value`, paginated.
    ///
    /// # Errors
    /// Returns identifier and database errors.
    pub fn key_value_get_list<M>(
        &self,
        tag: &str,
        key: &str,
        value: impl Into<Value>,
        page: Page,
    ) -> Result<Vec<M>>
    where
        M: Record + 'static,
    {
        let value = value.into();
        self.with_session(tag, "key_value_get_list", |session| {
            let filter = Filter::new().eq(key, value)?.live_only(M::BASE);
            session.load(Select::from(M::TABLE).filter(filter).page(page).build()?)
        })
    }

    /// Rows of `M`'s table where `key = value`, projected onto `select` and
    /// loaded as `P`.
    ///
    /// # Errors
    /// Returns identifier and database errors, including a projection that
    /// lacks a column `P` needs.
    pub fn key_value_select_get_list<M, P>(
        &self,
        tag: &str,
        select: &str,
        key: &str,
        value: impl Into<Value>,
        page: Page,
    ) -> Result<Vec<P>>
    where
        M: Record,
        P: QueryableByName<Sqlite> + 'static,
    {
        let value = value.into();
        self.with_session(tag, "key_value_select_get_list", |session| {
            let filter = Filter::new().eq(key, value)?.live_only(M::BASE);
            let statement = Select::from(M::TABLE)
                .columns(select)?
                .filter(filter)
                .page(page)
                .build()?;
            session.load(statement)
        })
    }

    /// Every row of `M`'s table, paginated.
    ///
    /// # Errors
    /// Returns database errors.
    pub fn get_list<M>(&self, tag: &str, page: Page) -> Result<Vec<M>>
    where
        M: Record + 'static,
    {
        self.with_session(tag, "get_list", |session| {
            let filter = Filter::new().live_only(M::BASE);
            session.load(Select::from(M::TABLE).filter(filter).page(page).build()?)
        })
    }

    /// First row where `key = value`, with `relations` loaded. With
    /// `autoload` every relation `M` declares is loaded as well.
    ///
    /// # Errors
    /// Returns [`Error::UnknownRelation`] for names `M` does not declare,
    /// before any query runs.
    pub fn key_value_get_with_relations<M>(
        &self,
        tag: &str,
        key: &str,
        value: impl Into<Value>,
        relations: &[&str],
        autoload: bool,
    ) -> Result<Option<M>>
    where
        M: Preload + 'static,
    {
        if let Some(unknown) = relations.iter().find(|r| !M::RELATIONS.contains(*r)) {
            let err = Error::UnknownRelation {
                table: M::TABLE,
                relation: (*unknown).to_string(),
            };
            log_failure("key_value_get_with_relations", tag, &err);
            return Err(err);
        }

        let Some(mut record) = self.key_value_get::<M>(tag, key, value)? else {
            return Ok(None);
        };

        let mut wanted: Vec<&str> = if autoload {
            M::RELATIONS.to_vec()
        } else {
            Vec::new()
        };
        for relation in relations {
            if !wanted.contains(relation) {
                wanted.push(*relation);
            }
        }
        for relation in wanted {
            record.preload(self, tag, relation)?;
        }
        Ok(Some(record))
    }

    /// Write every column of `record` to the rows where `key = value`.
    ///
    /// Returns the number of rows updated.
    ///
    /// # Errors
    /// Returns [`Error::EmptyUpdate`] when `record` has no columns to write,
    /// and identifier and database errors.
    pub fn key_value_update<M: Record>(
        &self,
        tag: &str,
        record: &mut M,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<usize> {
        let value = value.into();
        self.with_session(tag, "key_value_update", |session| {
            update_record(session, record, key, value)
        })
    }

    /// Update the rows where `key = value`, inserting `record` when none
    /// matched.
    ///
    /// # Errors
    /// Returns identifier and database errors from either step.
    pub fn key_value_update_or_create<M: Record>(
        &self,
        tag: &str,
        record: &mut M,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<Upsert> {
        let value = value.into();
        self.with_session(tag, "key_value_update_or_create", |session| {
            match update_record(session, record, key, value)? {
                0 => {
                    insert_record(session, record)?;
                    Ok(Upsert::Created)
                }
                rows => Ok(Upsert::Updated(rows)),
            }
        })
    }

    /// Delete the rows where `key = value`. Base records are soft deleted.
    ///
    /// # Errors
    /// Returns identifier and database errors.
    pub fn key_value_delete<M: Record>(
        &self,
        tag: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<usize> {
        let value = value.into();
        self.with_session(tag, "key_value_delete", |session| {
            let filter = Filter::new().eq(key, value)?.live_only(M::BASE);
            let statement = if M::BASE {
                Update::table(M::TABLE)
                    .set("deleted_at", now().into())?
                    .filter(filter)?
            } else {
                query::delete(M::TABLE, filter)?
            };
            session.execute(statement)
        })
    }

    /// Remove the rows where `key = value`, soft deleted or not.
    ///
    /// # Errors
    /// Returns identifier and database errors.
    pub fn key_value_hard_delete<M: Record>(
        &self,
        tag: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<usize> {
        let value = value.into();
        self.with_session(tag, "key_value_hard_delete", |session| {
            session.execute(query::delete(M::TABLE, Filter::new().eq(key, value)?)?)
        })
    }

    /// Add one to `column` on the row identified by `record`'s primary key.
    ///
    /// # Errors
    /// Returns [`Error::MissingPrimaryKey`] when `record` has no key value,
    /// and identifier and database errors.
    pub fn increment<M: Record>(&self, tag: &str, record: &M, column: &str) -> Result<usize> {
        self.with_session(tag, "increment", |session| {
            let key = record.primary_key();
            if key.is_null() {
                return Err(Error::MissingPrimaryKey { table: M::TABLE });
            }
            let mut update = Update::table(M::TABLE).increment(column)?;
            if M::BASE {
                update = update.set("updated_at", now().into())?;
            }
            let filter = Filter::new()
                .eq(M::PRIMARY_KEY, key)?
                .live_only(M::BASE);
            session.execute(update.filter(filter)?)
        })
    }

    /// Set a single `column` to `new_value` on the rows where
    /// `filter_key = value`.
    ///
    /// # Errors
    /// Returns identifier and database errors.
    pub fn key_value_update_column<M: Record>(
        &self,
        tag: &str,
        filter_key: &str,
        value: impl Into<Value>,
        column: &str,
        new_value: impl Into<Value>,
    ) -> Result<usize> {
        let value = value.into();
        let new_value = new_value.into();
        self.with_session(tag, "key_value_update_column", |session| {
            let mut update = Update::table(M::TABLE).set(column, new_value)?;
            if M::BASE && column != "updated_at" {
                update = update.set("updated_at", now().into())?;
            }
            let filter = Filter::new().eq(filter_key, value)?.live_only(M::BASE);
            session.execute(update.filter(filter)?)
        })
    }

    /// Rows where `key = value` and `in_key` is one of `in_list`, projected
    /// onto `select` and loaded as `P`.
    ///
    /// # Errors
    /// Returns identifier and database errors.
    #[allow(clippy::too_many_arguments)]
    pub fn key_value_where_in_select<M, P, V>(
        &self,
        tag: &str,
        key: &str,
        value: impl Into<Value>,
        select: &str,
        in_key: &str,
        in_list: impl IntoIterator<Item = V>,
    ) -> Result<Vec<P>>
    where
        M: Record,
        P: QueryableByName<Sqlite> + 'static,
        V: Into<Value>,
    {
        let value = value.into();
        let in_list: Vec<Value> = in_list.into_iter().map(Into::into).collect();
        self.with_session(tag, "key_value_where_in_select", |session| {
            let select = Select::from(M::TABLE).columns(select)?;
            let filter = Filter::new().eq(key, value)?;
            where_in(session, select, filter, in_key, in_list, M::BASE)
        })
    }

    /// Rows where `key = value` and `in_key` is one of `in_list`.
    ///
    /// # Errors
    /// Returns identifier and database errors.
    pub fn key_value_where_in<M, V>(
        &self,
        tag: &str,
        key: &str,
        value: impl Into<Value>,
        in_key: &str,
        in_list: impl IntoIterator<Item = V>,
    ) -> Result<Vec<M>>
    where
        M: Record + 'static,
        V: Into<Value>,
    {
        let value = value.into();
        let in_list: Vec<Value> = in_list.into_iter().map(Into::into).collect();
        self.with_session(tag, "key_value_where_in", |session| {
            let filter = Filter::new().eq(key, value)?;
            where_in(session, Select::from(M::TABLE), filter, in_key, in_list, M::BASE)
        })
    }

    /// Rows where `in_key` is one of `in_list`.
    ///
    /// # Errors
    /// Returns identifier and database errors.
    pub fn where_in<M, V>(
        &self,
        tag: &str,
        in_key: &str,
        in_list: impl IntoIterator<Item = V>,
    ) -> Result<Vec<M>>
    where
        M: Record + 'static,
        V: Into<Value>,
    {
        let in_list: Vec<Value> = in_list.into_iter().map(Into::into).collect();
        self.with_session(tag, "where_in", |session| {
            where_in(session, Select::from(M::TABLE), Filter::new(), in_key, in_list, M::BASE)
        })
    }
}

fn first<M>(session: &mut Session, select: Select) -> Result<Option<M>>
where
    M: QueryableByName<Sqlite> + 'static,
{
    let rows: Vec<M> = session.load(select.page(Page::new(1, 0)).build()?)?;
    Ok(rows.into_iter().next())
}

/// An empty list matches nothing, so no statement is sent for it.
fn where_in<P>(
    session: &mut Session,
    select: Select,
    filter: Filter,
    in_key: &str,
    in_list: Vec<Value>,
    soft_delete: bool,
) -> Result<Vec<P>>
where
    P: QueryableByName<Sqlite> + 'static,
{
    query::identifier(in_key)?;
    if in_list.is_empty() {
        return Ok(Vec::new());
    }
    let filter = filter.is_in(in_key, in_list)?.live_only(soft_delete);
    session.load(select.filter(filter).build()?)
}
