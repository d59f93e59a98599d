//! # Database Module
//!
//! This module provides the core database connection and management
//! functionality for Decanter. It handles connection pooling, driver
//! detection, and the [`Connection`] seam every statement is executed
//! through, across PostgreSQL, MySQL, and SQLite.

// ============================================================================
// External Crate Imports
// ============================================================================

use async_trait::async_trait;
use sqlx::{
    Any, AnyPool, Arguments, Encode, Type,
    any::{AnyArguments, AnyPoolOptions, AnyQueryResult, AnyRow},
};

// ============================================================================
// Internal Crate Imports
// ============================================================================

use crate::Error;

// ============================================================================
// Database Driver Enum
// ============================================================================

/// Supported database drivers for Decanter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drivers {
    /// PostgreSQL driver
    Postgres,
    /// MySQL driver
    MySQL,
    /// SQLite driver
    SQLite,
}

// ============================================================================
// Database Struct
// ============================================================================

/// The main entry point for Decanter database operations.
///
/// `Database` manages a connection pool and implements [`Connection`], so a
/// `ModelStore` can execute directly against the pool when no transaction
/// manager is in play.
///
/// It is designed to be thread-safe and easily shared across an application
/// (the underlying pool is reference-counted).
#[derive(Debug, Clone)]
pub struct Database {
    /// The underlying SQLx connection pool
    pub(crate) pool: AnyPool,
    /// The detected database driver
    pub(crate) driver: Drivers,
}

impl Database {
    /// Creates a new DatabaseBuilder for configuring the connection.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Connects to a database using the provided connection string.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        DatabaseBuilder::new().connect(url).await
    }

    /// Creates a raw SQL query builder.
    ///
    /// The escape hatch for statements the store does not own, schema
    /// provisioning in particular.
    pub fn raw<'a>(&self, sql: &'a str) -> RawQuery<'a, Self> {
        RawQuery::new(self.clone(), sql)
    }
}

// ============================================================================
// DatabaseBuilder Struct
// ============================================================================

pub struct DatabaseBuilder {
    max_connections: u32,
}

impl DatabaseBuilder {
    pub fn new() -> Self {
        Self { max_connections: 5 }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub async fn connect(self, url: &str) -> Result<Database, Error> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().max_connections(self.max_connections).connect(url).await?;
        let driver = if url.starts_with("postgres") {
            Drivers::Postgres
        } else if url.starts_with("mysql") {
            Drivers::MySQL
        } else {
            Drivers::SQLite
        };
        Ok(Database { pool, driver })
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Connection Trait
// ============================================================================

/// Uniform execution surface over the pool or an open transaction.
///
/// All three query shapes accept a SQL string with positional placeholders
/// and a matching ordered argument list.
#[async_trait]
pub trait Connection: Send + Sync {
    fn driver(&self) -> Drivers;

    async fn execute<'q>(&self, sql: &'q str, args: AnyArguments<'q>) -> Result<AnyQueryResult, sqlx::Error>;

    async fn fetch_all<'q>(&self, sql: &'q str, args: AnyArguments<'q>) -> Result<Vec<AnyRow>, sqlx::Error>;

    async fn fetch_one<'q>(&self, sql: &'q str, args: AnyArguments<'q>) -> Result<AnyRow, sqlx::Error>;

    async fn fetch_optional<'q>(&self, sql: &'q str, args: AnyArguments<'q>)
    -> Result<Option<AnyRow>, sqlx::Error>;
}

#[async_trait]
impl Connection for Database {
    fn driver(&self) -> Drivers {
        self.driver
    }

    async fn execute<'q>(&self, sql: &'q str, args: AnyArguments<'q>) -> Result<AnyQueryResult, sqlx::Error> {
        sqlx::query_with(sql, args).execute(&self.pool).await
    }

    async fn fetch_all<'q>(&self, sql: &'q str, args: AnyArguments<'q>) -> Result<Vec<AnyRow>, sqlx::Error> {
        sqlx::query_with(sql, args).fetch_all(&self.pool).await
    }

    async fn fetch_one<'q>(&self, sql: &'q str, args: AnyArguments<'q>) -> Result<AnyRow, sqlx::Error> {
        sqlx::query_with(sql, args).fetch_one(&self.pool).await
    }

    async fn fetch_optional<'q>(
        &self,
        sql: &'q str,
        args: AnyArguments<'q>,
    ) -> Result<Option<AnyRow>, sqlx::Error> {
        sqlx::query_with(sql, args).fetch_optional(&self.pool).await
    }
}

// ============================================================================
// Raw SQL Query Builder
// ============================================================================

pub struct RawQuery<'a, C> {
    conn: C,
    sql: &'a str,
    args: AnyArguments<'a>,
}

impl<'a, C> RawQuery<'a, C>
where
    C: Connection,
{
    pub(crate) fn new(conn: C, sql: &'a str) -> Self {
        Self { conn, sql, args: AnyArguments::default() }
    }

    pub fn bind<T>(mut self, value: T) -> Self
    where
        T: 'a + Encode<'a, Any> + Type<Any> + Send + Sync,
    {
        let _ = self.args.add(value);
        self
    }

    pub async fn fetch_all(self) -> Result<Vec<AnyRow>, Error> {
        self.conn.fetch_all(self.sql, self.args).await.map_err(Error::Query)
    }

    pub async fn fetch_one(self) -> Result<AnyRow, Error> {
        self.conn.fetch_one(self.sql, self.args).await.map_err(Error::Query)
    }

    pub async fn fetch_optional(self) -> Result<Option<AnyRow>, Error> {
        self.conn.fetch_optional(self.sql, self.args).await.map_err(Error::Query)
    }

    pub async fn execute(self) -> Result<u64, Error> {
        let result = self.conn.execute(self.sql, self.args).await.map_err(Error::Exec)?;
        Ok(result.rows_affected())
    }
}
