//! Common types shared across the metadata layer.
//!
//! This module hosts the semi-structured value representation
//! ([MetaValue]), entity identity types ([EntityId], [EntityType]), the
//! hierarchy abstraction over the external catalog's attachment graph, and
//! small shared utilities.

mod entity;
mod hierarchy;
mod util;
mod value;

pub use entity::*;
pub use hierarchy::*;
pub use util::*;
pub use value::*;
