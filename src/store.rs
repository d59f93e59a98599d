//! # Model Store
//!
//! The query-assembly engine. [`ModelStore`] turns a model's column maps
//! (plus, for lists, a [`ListParams`]) into parameterized statements and
//! drives their execution against whatever [`Connection`] it was given —
//! the pool directly, or a handle obtained from the transaction manager.
//! The store itself is stateless per call and never retries.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};
use sqlx::Row;

use crate::{
    Error,
    database::Connection,
    model::{CreateModel, DeleteModel, GetModel, ListModel, PkModel, UpdateModel},
    query_builder::{DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder},
    value::{Value, sorted_entries},
};

/// Per-call configuration for [`ModelStore::list`]. Constructed by the
/// caller, consumed once, discarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListParams {
    /// Equality filters, ANDed together. A [`Value::Null`] value matches
    /// with `IS NULL`.
    pub conditions: HashMap<String, Value>,
    /// Raw filter expressions with `?` placeholders and their positional
    /// arguments, ANDed together.
    pub condition_expressions: Vec<(String, Vec<Value>)>,
    /// SELECT DISTINCT, and `count(distinct (…))` when counting.
    pub distinct: bool,
    /// Column allow-list. Entries not present in the model's list column
    /// map are dropped; empty means every mapped column.
    pub columns: Vec<String>,
    /// Zero-based page number.
    pub page: u64,
    /// Rows per page. `0` means unbounded: no LIMIT or OFFSET at all.
    pub page_size: u64,
    /// Also run a COUNT over the same filters and return the total.
    pub with_total_count: bool,
    /// Run only the COUNT; the main SELECT is never built.
    pub only_count: bool,
    /// Explicit sort expressions. `None` falls back to the model's default
    /// sort; `Some(vec![])` means no ORDER BY even when a default exists.
    pub sort: Option<Vec<String>>,
}

/// A generic store for one table.
///
/// Synthesizes CREATE/READ/UPDATE/DELETE/LIST statements from the column
/// maps of the models passed in; no per-entity SQL anywhere.
///
/// # Example
///
/// ```rust,ignore
/// let store = ModelStore::new(db.clone(), "users");
/// store.create(&mut user).await?;
///
/// let mut lookup = User { id: user.id, ..User::default() };
/// let found = store.get(&mut lookup).await?;
/// ```
pub struct ModelStore<C> {
    pub con: C,
    pub table_name: String,
}

impl<C: Connection> ModelStore<C> {
    pub fn new(con: C, table_name: impl Into<String>) -> Self {
        Self { con, table_name: table_name.into() }
    }

    /// Inserts the model's create column map. A non-empty returning column
    /// map appends a `RETURNING` clause and the single returned row is
    /// scanned back into the model; zero returned rows leave the targets
    /// untouched and still count as success.
    pub async fn create<M: CreateModel>(&self, m: &mut M) -> Result<(), Error> {
        let mut qb =
            InsertBuilder::new(self.con.driver(), &self.table_name).set_map(m.create_column_map());

        let returning_columns: Vec<&'static str> = {
            let map = m.returning_column_map();
            let mut names: Vec<_> = map.keys().copied().collect();
            names.sort_unstable();
            names
        };

        if !returning_columns.is_empty() {
            qb = qb.suffix(&format!("RETURNING {}", returning_columns.join(",")), Vec::new());
        }

        let (sql, args) = qb.build()?;
        debug!("create query: {sql}");

        if returning_columns.is_empty() {
            self.con.execute(&sql, args).await.map_err(Error::Exec)?;
            return Ok(());
        }

        if let Some(row) = self.con.fetch_optional(&sql, args).await.map_err(Error::Query)? {
            let mut map = m.returning_column_map();
            for (idx, col) in returning_columns.iter().enumerate() {
                map.get_mut(col)
                    .ok_or_else(|| Error::Scan(sqlx::Error::ColumnNotFound((*col).to_string())))?
                    .scan_from(&row, idx)
                    .map_err(Error::Scan)?;
            }
        }

        Ok(())
    }

    /// Updates the model's update column map, qualified by its primary-key
    /// map. Matching zero rows is indistinguishable from matching one; the
    /// affected-row count is deliberately not inspected.
    pub async fn update<M: UpdateModel>(&self, m: &M) -> Result<(), Error> {
        let mut qb =
            UpdateBuilder::new(self.con.driver(), &self.table_name).set_map(m.update_column_map());
        for (col, value) in sorted_entries(m.pk_column_map()) {
            qb = qb.where_eq(col, value);
        }

        let (sql, args) = qb.build()?;
        debug!("update query: {sql}");

        self.con.execute(&sql, args).await.map_err(Error::Exec)?;
        Ok(())
    }

    /// Upsert: inserts the create column map and, on primary-key conflict,
    /// applies the update column map in place.
    ///
    /// The update column map must be non-empty and disjoint from the
    /// primary-key map; the engine does not re-filter it.
    pub async fn update_or_create<M: CreateModel + UpdateModel>(&self, m: &mut M) -> Result<(), Error> {
        let pk_names: Vec<String> =
            sorted_entries(m.pk_column_map()).into_iter().map(|(col, _)| format!("\"{}\"", col)).collect();

        let update_entries = sorted_entries(m.update_column_map());
        let assignments: Vec<String> =
            update_entries.iter().map(|(col, _)| format!("\"{}\" = ?", col)).collect();
        let update_values: Vec<Value> = update_entries.into_iter().map(|(_, value)| value).collect();

        let qb = InsertBuilder::new(self.con.driver(), &self.table_name)
            .set_map(m.create_column_map())
            .suffix(
                &format!("ON CONFLICT ({}) DO UPDATE SET {}", pk_names.join(","), assignments.join(", ")),
                update_values,
            );

        let (sql, args) = qb.build()?;
        debug!("upsert query: {sql}");

        self.con.execute(&sql, args).await.map_err(Error::Exec)?;
        Ok(())
    }

    /// Conflict-tolerant insert: the primary-key values are merged into the
    /// insert map and an existing row turns the statement into a no-op.
    pub async fn create_if_not_exist<M: CreateModel + PkModel>(&self, m: &mut M) -> Result<(), Error> {
        let pk_names: Vec<String> =
            sorted_entries(m.pk_column_map()).into_iter().map(|(col, _)| format!("\"{}\"", col)).collect();

        let mut insert_map = m.create_column_map();
        insert_map.extend(m.pk_column_map());

        let qb = InsertBuilder::new(self.con.driver(), &self.table_name)
            .set_map(insert_map)
            .suffix(&format!("ON CONFLICT ({}) DO NOTHING", pk_names.join(",")), Vec::new());

        let (sql, args) = qb.build()?;
        debug!("create if not exist query: {sql}");

        self.con.execute(&sql, args).await.map_err(Error::Exec)?;
        Ok(())
    }

    /// Deletes the row matching the model's primary-key map.
    pub async fn delete<M: DeleteModel>(&self, m: &M) -> Result<(), Error> {
        let mut qb = DeleteBuilder::new(self.con.driver(), &self.table_name);
        for (col, value) in sorted_entries(m.pk_column_map()) {
            qb = qb.where_eq(col, value);
        }

        let (sql, args) = qb.build()?;
        debug!("delete query: {sql}");

        self.con.execute(&sql, args).await.map_err(Error::Exec)?;
        Ok(())
    }

    /// Point lookup by primary key, scanning the full list column map back
    /// into `m`.
    ///
    /// Returns `Ok(false)` when no row matches — an expected outcome, never
    /// an error.
    pub async fn get<M: GetModel>(&self, m: &mut M) -> Result<bool, Error> {
        let col_names: Vec<&'static str> = {
            let map = m.list_column_map();
            let mut names: Vec<_> = map.keys().copied().collect();
            names.sort_unstable();
            names
        };
        if col_names.is_empty() {
            return Err(Error::NoColumns);
        }

        let mut qb = SelectBuilder::new(self.con.driver(), &self.table_name)
            .columns(col_names.iter().copied())
            .limit(1);
        for (col, value) in sorted_entries(m.pk_column_map()) {
            qb = qb.where_eq(col, value);
        }
        let qb = m.get_interceptor(qb);

        let (sql, args) = qb.build()?;
        debug!("get query: {sql}");

        match self.con.fetch_optional(&sql, args).await.map_err(Error::Query)? {
            None => Ok(false),
            Some(row) => {
                let mut map = m.list_column_map();
                for (idx, col) in col_names.iter().enumerate() {
                    map.get_mut(col)
                        .ok_or_else(|| Error::Scan(sqlx::Error::ColumnNotFound((*col).to_string())))?
                        .scan_from(&row, idx)
                        .map_err(Error::Scan)?;
                }
                Ok(true)
            }
        }
    }

    /// Lists rows into fresh `M` instances and, when requested, counts them.
    ///
    /// Counting runs on the same filtered (and intercepted) query the rows
    /// are fetched with, so the total always agrees with the filters. The
    /// returned count is `0` unless `with_total_count` or `only_count` was
    /// set; with `only_count` the row list is empty and the main SELECT is
    /// never built.
    pub async fn list<M>(&self, params: &ListParams) -> Result<(Vec<M>, i64), Error>
    where
        M: ListModel + Default,
    {
        let mut qb = SelectBuilder::new(self.con.driver(), &self.table_name);

        let mut conditions: Vec<_> = params.conditions.iter().collect();
        conditions.sort_by(|a, b| a.0.cmp(b.0));
        for (col, value) in conditions {
            qb = qb.where_eq(col, value.clone());
        }
        for (expr, args) in &params.condition_expressions {
            qb = qb.where_expr(expr, args.clone());
        }

        // Probe instance: consulted for its map and default sort, never
        // part of the result set.
        let mut probe = M::default();

        let col_names: Vec<&'static str> = {
            let map = probe.list_column_map();
            if params.columns.is_empty() {
                let mut names: Vec<_> = map.keys().copied().collect();
                names.sort_unstable();
                names
            } else {
                params
                    .columns
                    .iter()
                    .filter_map(|col| map.get_key_value(col.as_str()).map(|(name, _)| *name))
                    .collect()
            }
        };
        if col_names.is_empty() {
            return Err(Error::NoColumns);
        }

        qb = probe.list_interceptor(qb, params);

        let mut total_count: i64 = 0;
        if params.with_total_count || params.only_count {
            qb = if params.distinct {
                qb.column(&format!("count(distinct ({}))", col_names.join(",")))
            } else {
                qb.column("count(*)")
            };

            let (sql, args) = qb.build()?;
            debug!("list count query: {sql}");

            let row = self.con.fetch_one(&sql, args).await.map_err(Error::Query)?;
            total_count = row.try_get::<i64, _>(0).map_err(Error::Scan)?;

            if params.only_count {
                return Ok((Vec::new(), total_count));
            }

            qb = qb.clear_columns();
        }

        if params.distinct {
            qb = qb.distinct();
        }
        qb = qb.columns(col_names.iter().copied());

        if params.page_size > 0 {
            qb = qb.offset(params.page * params.page_size).limit(params.page_size);
        }

        match &params.sort {
            None => {
                let sort_columns = probe.default_sort_columns();
                if !sort_columns.is_empty() {
                    qb = qb.order_by(sort_columns);
                }
            }
            Some(sort) if !sort.is_empty() => {
                qb = qb.order_by(sort.iter().cloned());
            }
            Some(_) => {}
        }

        let (sql, args) = qb.build()?;
        debug!("list query: {sql}");

        let rows = self.con.fetch_all(&sql, args).await.map_err(Error::Query)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut item = M::default();
            {
                let mut map = item.list_column_map();
                for (idx, col) in col_names.iter().enumerate() {
                    map.get_mut(col)
                        .ok_or_else(|| Error::Scan(sqlx::Error::ColumnNotFound((*col).to_string())))?
                        .scan_from(row, idx)
                        .map_err(Error::Scan)?;
                }
            }
            items.push(item);
        }

        Ok((items, total_count))
    }
}
