use thiserror::Error;

/// Errors produced by the store, the statement builders, and the
/// transaction manager.
///
/// Every variant names the step that failed. "Row not found" is never an
/// error here: `ModelStore::get` reports it as `Ok(false)`.
#[derive(Debug, Error)]
pub enum Error {
    /// The resolved column set for a SELECT was empty. No statement is
    /// built or executed in this case.
    #[error("no columns")]
    NoColumns,

    /// A statement could not be rendered (empty SET, placeholder/argument
    /// count mismatch, missing projection).
    #[error("fail to build query: {0}")]
    Build(String),

    /// A row-returning statement failed at the store.
    #[error("fail to query: {0}")]
    Query(#[source] sqlx::Error),

    /// A non-row-returning statement failed at the store.
    #[error("fail to exec: {0}")]
    Exec(#[source] sqlx::Error),

    /// A result row did not decode into the requested write-targets.
    #[error("fail to scan: {0}")]
    Scan(#[source] sqlx::Error),

    /// BEGIN failed.
    #[error("unable to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    /// COMMIT failed.
    #[error("transaction commit: {0}")]
    Commit(#[source] sqlx::Error),

    /// The transaction behind a shared handle was already committed or
    /// rolled back, typically by a nested `tx_fn` call.
    #[error("transaction already closed")]
    TxClosed,

    /// The unit-of-work function passed to `tx_fn` returned an error.
    /// The transaction was rolled back.
    #[error("transaction function: {0}")]
    TxFunction(#[source] Box<Error>),

    /// Connection setup failed.
    #[error(transparent)]
    Connect(#[from] sqlx::Error),
}
