//! # Model Capability Traits
//!
//! A model is any value that describes, per operation, which columns
//! participate and where their values live. Each operation has its own
//! narrow trait; a concrete entity type implements the capabilities it
//! supports and nothing else. There is no base hierarchy and no
//! reflection: the maps are written out by hand, which keeps the engine
//! fully generic while every map entry stays type-checked at the call site.
//!
//! # Example
//!
//! ```rust,ignore
//! use decanter::{ListModel, PkModel, TargetMap, ValueMap};
//!
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl PkModel for User {
//!     fn pk_column_map(&self) -> ValueMap {
//!         ValueMap::from([("id", self.id.into())])
//!     }
//! }
//!
//! impl ListModel for User {
//!     fn list_column_map(&mut self) -> TargetMap<'_> {
//!         TargetMap::from([
//!             ("id", &mut self.id as _),
//!             ("name", &mut self.name as _),
//!         ])
//!     }
//!
//!     fn default_sort_columns(&self) -> Vec<String> {
//!         vec!["id".to_string()]
//!     }
//! }
//! ```

use crate::{
    query_builder::SelectBuilder,
    store::ListParams,
    value::{TargetMap, ValueMap},
};

/// The primary-key shape shared by point lookup, update, and delete.
///
/// The returned map must be non-empty; an empty map yields an unqualified
/// statement, which the engine does not defend against.
pub trait PkModel {
    /// Returns the primary-key columns with their current values.
    fn pk_column_map(&self) -> ValueMap;
}

/// Capability to appear in list results.
pub trait ListModel {
    /// Returns the readable columns with a write-target for each. Produced
    /// fresh on every call; the engine never caches it.
    fn list_column_map(&mut self) -> TargetMap<'_>;

    /// Sort applied when the caller supplies no explicit sort. Empty means
    /// no stable order; the engine never invents one.
    fn default_sort_columns(&self) -> Vec<String> {
        Vec::new()
    }

    /// Hook over the in-progress list query, applied after base filters and
    /// before counting, projection, pagination, and ordering. Override it
    /// to inject joins or extra predicates; the default changes nothing.
    fn list_interceptor(&self, qb: SelectBuilder, _params: &ListParams) -> SelectBuilder {
        qb
    }
}

/// Capability to be fetched by primary key. Reuses the list column map as
/// the projection, so a `get` always returns the full mapped shape.
pub trait GetModel: ListModel + PkModel {
    /// Hook over the point-lookup query, applied just before execution.
    /// The default changes nothing.
    fn get_interceptor(&self, qb: SelectBuilder) -> SelectBuilder {
        qb
    }
}

/// Capability to be inserted.
pub trait CreateModel {
    /// Returns the columns to insert with their values.
    fn create_column_map(&self) -> ValueMap;

    /// Write-targets for server-generated columns captured through a
    /// `RETURNING` clause. Empty (the default) means no RETURNING clause.
    fn returning_column_map(&mut self) -> TargetMap<'_> {
        TargetMap::new()
    }
}

/// Capability to be updated in place. The map should contain only the
/// columns the caller intends to change.
pub trait UpdateModel: PkModel {
    fn update_column_map(&self) -> ValueMap;
}

/// Capability to be deleted by primary key.
pub trait DeleteModel: PkModel {}
