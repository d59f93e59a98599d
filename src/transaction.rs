//! # Transaction Module
//!
//! Context-scoped transaction propagation. A [`Context`] carries at most
//! one open transaction; [`TransactionManager::tx_fn`] attaches one to a
//! derived context (or joins the one already there), and
//! [`TransactionManager::get_connection`] hands out a [`ConnectionHandle`]
//! that executes against the transaction when one is attached and against
//! the pool otherwise. The handle on the context is the single source of
//! truth — connections are never additionally threaded as parameters.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use log::debug;
use sqlx::{
    Any, Transaction,
    any::{AnyArguments, AnyQueryResult, AnyRow},
};
use tokio::sync::Mutex;

use crate::{
    Error,
    database::{Connection, Database, Drivers},
};

/// Shared slot for one open transaction. Emptied exactly once, by whichever
/// commit or rollback gets there first.
pub(crate) type TxHandle = Arc<Mutex<Option<Transaction<'static, Any>>>>;

/// Execution context for one logical unit of work.
///
/// Cheap to clone. A fresh context carries no transaction; `tx_fn` derives
/// a child context with one attached. The slot is private: nested calls
/// look it up through the manager, never mutate it.
#[derive(Clone, Default)]
pub struct Context {
    tx: Option<TxHandle>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    fn transaction(&self) -> Option<TxHandle> {
        self.tx.clone()
    }

    fn with_transaction(&self, tx: TxHandle) -> Self {
        Self { tx: Some(tx) }
    }
}

/// Hands out connections and runs units of work, joining the transaction
/// found on the context or opening a new one.
#[derive(Clone)]
pub struct TransactionManager {
    db: Database,
}

impl TransactionManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The transaction attached to `ctx` if there is one, the pool
    /// otherwise.
    pub fn get_connection(&self, ctx: &Context) -> ConnectionHandle {
        match ctx.transaction() {
            Some(tx) => ConnectionHandle::Tx { tx, driver: self.db.driver },
            None => ConnectionHandle::Pool(self.db.clone()),
        }
    }

    async fn context_with_transaction(&self, ctx: &Context) -> Result<(Context, TxHandle), Error> {
        if let Some(tx) = ctx.transaction() {
            debug!("joining transaction already on context");
            return Ok((ctx.clone(), tx));
        }

        let tx = self.db.pool.begin().await.map_err(Error::Begin)?;
        debug!("begin transaction");
        let handle: TxHandle = Arc::new(Mutex::new(Some(tx)));
        Ok((ctx.with_transaction(handle.clone()), handle))
    }

    /// Runs `f` inside a transaction.
    ///
    /// If `ctx` already carries a transaction it is reused — no new BEGIN —
    /// otherwise one is begun and attached to the context passed to `f`.
    /// When `f` returns an error the transaction is rolled back and the
    /// error comes back wrapped; when it succeeds an explicit commit is
    /// attempted and its result is the call's result.
    ///
    /// Sharp edge, kept deliberately: a nested `tx_fn` that joined an outer
    /// transaction still commits (or rolls back) the shared physical
    /// transaction when its own function finishes. The outer call's commit
    /// then fails with [`Error::TxClosed`]. Commit/rollback responsibility
    /// is therefore only safe with the outermost caller; nested calls
    /// should be treated as running on borrowed time.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let manager = TransactionManager::new(db.clone());
    /// manager
    ///     .tx_fn(&Context::new(), |ctx| {
    ///         Box::pin(async move {
    ///             let store = ModelStore::new(manager.get_connection(ctx), "users");
    ///             store.create(&mut user).await
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn tx_fn<T, F>(&self, ctx: &Context, f: F) -> Result<T, Error>
    where
        F: for<'c> FnOnce(&'c Context) -> BoxFuture<'c, Result<T, Error>>,
    {
        let (tx_ctx, tx) = self.context_with_transaction(ctx).await?;

        match f(&tx_ctx).await {
            Ok(value) => {
                commit(&tx).await?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(err) => {
                rollback(&tx).await;
                debug!("transaction rolled back");
                Err(Error::TxFunction(Box::new(err)))
            }
        }
    }
}

async fn commit(handle: &TxHandle) -> Result<(), Error> {
    let tx = handle.lock().await.take().ok_or(Error::TxClosed)?;
    tx.commit().await.map_err(Error::Commit)
}

/// Best effort; a handle already emptied by a nested commit or rollback is
/// left alone.
async fn rollback(handle: &TxHandle) {
    if let Some(tx) = handle.lock().await.take() {
        if let Err(err) = tx.rollback().await {
            debug!("rollback failed: {err}");
        }
    }
}

/// A connection-like handle over either the pool or an open transaction.
///
/// The store executes through this without knowing which it got. A
/// transaction handle is meant for sequential use within one unit of work;
/// using it after its transaction finished surfaces a protocol error.
#[derive(Clone)]
pub enum ConnectionHandle {
    Pool(Database),
    Tx { tx: TxHandle, driver: Drivers },
}

fn closed() -> sqlx::Error {
    sqlx::Error::Protocol("transaction already closed".to_string())
}

#[async_trait]
impl Connection for ConnectionHandle {
    fn driver(&self) -> Drivers {
        match self {
            ConnectionHandle::Pool(db) => db.driver,
            ConnectionHandle::Tx { driver, .. } => *driver,
        }
    }

    async fn execute<'q>(&self, sql: &'q str, args: AnyArguments<'q>) -> Result<AnyQueryResult, sqlx::Error> {
        match self {
            ConnectionHandle::Pool(db) => db.execute(sql, args).await,
            ConnectionHandle::Tx { tx, .. } => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or_else(closed)?;
                sqlx::query_with(sql, args).execute(&mut **tx).await
            }
        }
    }

    async fn fetch_all<'q>(&self, sql: &'q str, args: AnyArguments<'q>) -> Result<Vec<AnyRow>, sqlx::Error> {
        match self {
            ConnectionHandle::Pool(db) => db.fetch_all(sql, args).await,
            ConnectionHandle::Tx { tx, .. } => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or_else(closed)?;
                sqlx::query_with(sql, args).fetch_all(&mut **tx).await
            }
        }
    }

    async fn fetch_one<'q>(&self, sql: &'q str, args: AnyArguments<'q>) -> Result<AnyRow, sqlx::Error> {
        match self {
            ConnectionHandle::Pool(db) => db.fetch_one(sql, args).await,
            ConnectionHandle::Tx { tx, .. } => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or_else(closed)?;
                sqlx::query_with(sql, args).fetch_one(&mut **tx).await
            }
        }
    }

    async fn fetch_optional<'q>(
        &self,
        sql: &'q str,
        args: AnyArguments<'q>,
    ) -> Result<Option<AnyRow>, sqlx::Error> {
        match self {
            ConnectionHandle::Pool(db) => db.fetch_optional(sql, args).await,
            ConnectionHandle::Tx { tx, .. } => {
                let mut guard = tx.lock().await;
                let tx = guard.as_mut().ok_or_else(closed)?;
                sqlx::query_with(sql, args).fetch_optional(&mut **tx).await
            }
        }
    }
}
