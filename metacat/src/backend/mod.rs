//! Storage backend adapters.
//!
//! A backend adapter hides one concrete metadata store behind the
//! [BackendAdapterProvider] surface: point reads and writes, key deletion,
//! filter-clause translation, and query execution. The two reference
//! adapters stand in for the production technologies at the same seam: a
//! fixed-column relational table ([ColumnAdapter]) and a per-entity JSON
//! document table ([DocumentAdapter]).

mod adapter;
mod column;
mod document;

pub use adapter::*;
pub use column::*;
pub use document::*;
