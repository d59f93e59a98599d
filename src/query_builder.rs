//! # Query Builder Module
//!
//! This module provides the statement builders the model store assembles its
//! SQL through. Each builder accepts structured clause calls and renders a
//! placeholder-style query string plus an ordered argument list, with
//! driver-specific placeholder syntax (`$n` for PostgreSQL, `?` elsewhere).
//!
//! Rendering failures (missing projection, empty SET, placeholder/argument
//! count mismatch) surface as [`Error::Build`], distinct from execution
//! errors. The builders never talk to the database themselves.

// ============================================================================
// External Crate Imports
// ============================================================================

use sqlx::any::AnyArguments;

// ============================================================================
// Internal Crate Imports
// ============================================================================

use crate::{
    Error,
    database::Drivers,
    value::{Value, ValueMap, sorted_entries},
};

// ============================================================================
// Shared Rendering Helpers
// ============================================================================

/// One WHERE conjunct or statement suffix: a SQL fragment using `?`
/// placeholders plus its positional arguments.
#[derive(Debug, Clone)]
struct Fragment {
    expr: String,
    args: Vec<Value>,
}

/// Rewrites the `?` placeholders of a fragment into the driver's syntax and
/// binds the fragment's arguments in order.
///
/// The placeholder count must match the argument count; the fragment must
/// not contain literal `?` characters outside placeholder positions.
fn render_fragment(
    fragment: &Fragment,
    driver: Drivers,
    counter: &mut usize,
    out: &mut AnyArguments<'_>,
) -> Result<String, Error> {
    let placeholders = fragment.expr.matches('?').count();
    if placeholders != fragment.args.len() {
        return Err(Error::Build(format!(
            "expression {:?} has {} placeholders but {} arguments",
            fragment.expr,
            placeholders,
            fragment.args.len()
        )));
    }

    let mut rendered = String::with_capacity(fragment.expr.len());
    let mut parts = fragment.expr.split('?');
    rendered.push_str(parts.next().unwrap_or_default());
    for (value, part) in fragment.args.iter().zip(parts) {
        match driver {
            Drivers::Postgres => {
                rendered.push_str(&format!("${}", counter));
                rendered.push_str(value.placeholder_cast(driver));
                *counter += 1;
            }
            _ => rendered.push('?'),
        }
        value.bind(driver, out);
        rendered.push_str(part);
    }

    Ok(rendered)
}

fn eq_fragment(col: &str, value: Value) -> Fragment {
    // Equality against Null never matches in SQL; render IS NULL instead.
    if value.is_null() {
        Fragment { expr: format!("\"{}\" IS NULL", col), args: Vec::new() }
    } else {
        Fragment { expr: format!("\"{}\" = ?", col), args: vec![value] }
    }
}

// ============================================================================
// SelectBuilder
// ============================================================================

/// A builder for SELECT statements.
///
/// This is also the query representation handed to model interceptors, which
/// may add joins or predicates before projection and pagination are applied.
///
/// # Example
///
/// ```rust,ignore
/// let (sql, args) = SelectBuilder::new(Drivers::Postgres, "users")
///     .columns(["id", "name"])
///     .where_eq("active", true.into())
///     .order_by(["name"])
///     .limit(10)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    driver: Drivers,
    table: String,
    columns: Vec<String>,
    distinct: bool,
    joins: Vec<String>,
    wheres: Vec<Fragment>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectBuilder {
    pub fn new(driver: Drivers, table: &str) -> Self {
        Self {
            driver,
            table: table.to_string(),
            columns: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            wheres: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Appends a single projection expression (a column name, `count(*)`, …).
    pub fn column(mut self, expr: &str) -> Self {
        self.columns.push(expr.to_string());
        self
    }

    /// Appends several projection expressions.
    pub fn columns<I>(mut self, cols: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.columns.extend(cols.into_iter().map(Into::into));
        self
    }

    /// Drops the current projection, keeping filters, joins, and everything
    /// else intact. Lets a count projection be swapped for the real one on
    /// the same filtered query.
    pub fn clear_columns(mut self) -> Self {
        self.columns.clear();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Appends a raw join fragment, e.g. `JOIN roles ON roles.id = role_id`.
    pub fn join(mut self, fragment: &str) -> Self {
        self.joins.push(fragment.to_string());
        self
    }

    /// ANDs `"col" = ?` into the WHERE clause. A [`Value::Null`] renders as
    /// `"col" IS NULL`.
    pub fn where_eq(mut self, col: &str, value: Value) -> Self {
        self.wheres.push(eq_fragment(col, value));
        self
    }

    /// ANDs a raw expression with `?` placeholders into the WHERE clause.
    /// The expression is parenthesized so embedded ORs stay contained.
    pub fn where_expr(mut self, expr: &str, args: Vec<Value>) -> Self {
        self.wheres.push(Fragment { expr: format!("({})", expr), args });
        self
    }

    pub fn order_by<I>(mut self, cols: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.order_by.extend(cols.into_iter().map(Into::into));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Renders the statement and its ordered argument list.
    pub fn build<'q>(&self) -> Result<(String, AnyArguments<'q>), Error> {
        if self.columns.is_empty() {
            return Err(Error::Build("select requires at least one column".to_string()));
        }

        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.columns.join(", "));
        sql.push_str(" FROM \"");
        sql.push_str(&self.table);
        sql.push('"');

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        sql.push_str(" WHERE 1=1");

        let mut args = AnyArguments::default();
        let mut counter = 1;
        for fragment in &self.wheres {
            sql.push_str(" AND ");
            sql.push_str(&render_fragment(fragment, self.driver, &mut counter, &mut args)?);
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok((sql, args))
    }
}

// ============================================================================
// InsertBuilder
// ============================================================================

/// A builder for INSERT statements, with a raw suffix slot for
/// `RETURNING …` and `ON CONFLICT …` clauses.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    driver: Drivers,
    table: String,
    values: Vec<(String, Value)>,
    suffix: Option<Fragment>,
}

impl InsertBuilder {
    pub fn new(driver: Drivers, table: &str) -> Self {
        Self { driver, table: table.to_string(), values: Vec::new(), suffix: None }
    }

    pub fn set(mut self, col: &str, value: Value) -> Self {
        self.values.push((col.to_string(), value));
        self
    }

    /// Sets every column of the map. Entries are ordered by column name so
    /// the rendered statement is reproducible.
    pub fn set_map(mut self, map: ValueMap) -> Self {
        for (col, value) in sorted_entries(map) {
            self.values.push((col.to_string(), value));
        }
        self
    }

    /// Appends a raw suffix with `?` placeholders, rendered after the VALUES
    /// list with the placeholder counter carried over.
    pub fn suffix(mut self, fragment: &str, args: Vec<Value>) -> Self {
        self.suffix = Some(Fragment { expr: fragment.to_string(), args });
        self
    }

    pub fn build<'q>(&self) -> Result<(String, AnyArguments<'q>), Error> {
        if self.values.is_empty() {
            return Err(Error::Build("insert requires at least one column".to_string()));
        }

        let mut args = AnyArguments::default();
        let mut counter = 1;

        let mut cols = Vec::with_capacity(self.values.len());
        let mut placeholders = Vec::with_capacity(self.values.len());
        for (col, value) in &self.values {
            cols.push(format!("\"{}\"", col));
            match self.driver {
                Drivers::Postgres => {
                    placeholders.push(format!("${}{}", counter, value.placeholder_cast(self.driver)));
                    counter += 1;
                }
                _ => placeholders.push("?".to_string()),
            }
            value.bind(self.driver, &mut args);
        }

        let mut sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            self.table,
            cols.join(", "),
            placeholders.join(", ")
        );

        if let Some(suffix) = &self.suffix {
            sql.push(' ');
            sql.push_str(&render_fragment(suffix, self.driver, &mut counter, &mut args)?);
        }

        Ok((sql, args))
    }
}

// ============================================================================
// UpdateBuilder
// ============================================================================

/// A builder for UPDATE statements.
///
/// An empty WHERE clause renders an unqualified statement; qualifying the
/// update is the caller's responsibility.
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    driver: Drivers,
    table: String,
    sets: Vec<(String, Value)>,
    wheres: Vec<Fragment>,
}

impl UpdateBuilder {
    pub fn new(driver: Drivers, table: &str) -> Self {
        Self { driver, table: table.to_string(), sets: Vec::new(), wheres: Vec::new() }
    }

    pub fn set(mut self, col: &str, value: Value) -> Self {
        self.sets.push((col.to_string(), value));
        self
    }

    /// Sets every column of the map, ordered by column name.
    pub fn set_map(mut self, map: ValueMap) -> Self {
        for (col, value) in sorted_entries(map) {
            self.sets.push((col.to_string(), value));
        }
        self
    }

    pub fn where_eq(mut self, col: &str, value: Value) -> Self {
        self.wheres.push(eq_fragment(col, value));
        self
    }

    pub fn build<'q>(&self) -> Result<(String, AnyArguments<'q>), Error> {
        if self.sets.is_empty() {
            return Err(Error::Build("update requires at least one column".to_string()));
        }

        let mut args = AnyArguments::default();
        let mut counter = 1;

        let mut assignments = Vec::with_capacity(self.sets.len());
        for (col, value) in &self.sets {
            match self.driver {
                Drivers::Postgres => {
                    assignments
                        .push(format!("\"{}\" = ${}{}", col, counter, value.placeholder_cast(self.driver)));
                    counter += 1;
                }
                _ => assignments.push(format!("\"{}\" = ?", col)),
            }
            value.bind(self.driver, &mut args);
        }

        let mut sql = format!("UPDATE \"{}\" SET {}", self.table, assignments.join(", "));

        let mut conjuncts = Vec::with_capacity(self.wheres.len());
        for fragment in &self.wheres {
            conjuncts.push(render_fragment(fragment, self.driver, &mut counter, &mut args)?);
        }
        if !conjuncts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conjuncts.join(" AND "));
        }

        Ok((sql, args))
    }
}

// ============================================================================
// DeleteBuilder
// ============================================================================

/// A builder for DELETE statements.
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    driver: Drivers,
    table: String,
    wheres: Vec<Fragment>,
}

impl DeleteBuilder {
    pub fn new(driver: Drivers, table: &str) -> Self {
        Self { driver, table: table.to_string(), wheres: Vec::new() }
    }

    pub fn where_eq(mut self, col: &str, value: Value) -> Self {
        self.wheres.push(eq_fragment(col, value));
        self
    }

    pub fn build<'q>(&self) -> Result<(String, AnyArguments<'q>), Error> {
        let mut sql = format!("DELETE FROM \"{}\"", self.table);

        let mut args = AnyArguments::default();
        let mut counter = 1;

        let mut conjuncts = Vec::with_capacity(self.wheres.len());
        for fragment in &self.wheres {
            conjuncts.push(render_fragment(fragment, self.driver, &mut counter, &mut args)?);
        }
        if !conjuncts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conjuncts.join(" AND "));
        }

        Ok((sql, args))
    }
}

// ============================================================================
// Tests
// ============================================================================
