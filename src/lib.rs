//! # Decanter
//!
//! A lightweight generic model store built on top of sqlx. Instead of
//! per-entity SQL or a derive macro, each entity describes itself through
//! small column maps — column name to value for writes, column name to
//! write-target for reads — and [`ModelStore`] synthesizes and executes the
//! CREATE/READ/UPDATE/DELETE/LIST statements from them. A context-scoped
//! [`TransactionManager`] lets arbitrarily nested call chains share one
//! physical transaction without threading connections through every
//! signature.
//!
//! ```rust,ignore
//! let db = Database::connect("postgres://localhost/app").await?;
//! let store = ModelStore::new(db.clone(), "users");
//!
//! let mut user = User { name: "ada".into(), ..User::default() };
//! store.create(&mut user).await?; // id filled in via RETURNING
//!
//! let (users, total) = store
//!     .list::<User>(&ListParams {
//!         conditions: [("active".to_string(), true.into())].into(),
//!         page_size: 20,
//!         with_total_count: true,
//!         ..ListParams::default()
//!     })
//!     .await?;
//! ```

mod database;
mod error;
mod model;
mod query_builder;
mod sort;
mod store;
mod transaction;
mod value;

pub use database::{Connection, Database, DatabaseBuilder, Drivers, RawQuery};
pub use error::Error;
pub use model::{CreateModel, DeleteModel, GetModel, ListModel, PkModel, UpdateModel};
pub use query_builder::{DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};
pub use sort::construct_sort_columns;
pub use store::{ListParams, ModelStore};
pub use transaction::{ConnectionHandle, Context, TransactionManager};
pub use value::{ScanTarget, TargetMap, Value, ValueMap};
