//! Declarative filter expressions over entity metadata.
//!
//! A filter is a disjunction of conjunctive groups: the outer list combines
//! with OR, the clauses within each group with AND. Clauses carry a
//! comparison operator encoded as a key suffix (`bytes.gt`, `created_at.lte`)
//! and a typed value produced by coercion. The [FilterEngine] drives parsing,
//! validation, and compilation into backend-native predicates.

mod clause;
mod coercion;
mod engine;
mod expression;

pub use clause::*;
pub use coercion::*;
pub use engine::*;
pub use expression::*;
