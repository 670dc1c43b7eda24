use crate::backend::{BackendAdapter, EntityRecord, NativePredicate};
use crate::errors::MetaResult;
use crate::filter::{coerce_clause, FilterExpression};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// A filter expression compiled into backend-native predicates.
///
/// Groups mirror the source expression: each inner list is one AND group of
/// native predicates, and groups combine with OR. Result ordering is
/// backend-defined; OR is commutative, so group order carries no meaning.
pub struct CompiledQuery {
    groups: Vec<Vec<NativePredicate>>,
}

impl CompiledQuery {
    pub(crate) fn new(groups: Vec<Vec<NativePredicate>>) -> Self {
        CompiledQuery { groups }
    }

    pub fn groups(&self) -> &[Vec<NativePredicate>] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Evaluates the query against a single record.
    ///
    /// An empty query matches everything. Used by the in-memory reference
    /// adapters; network-backed adapters would render the predicates into
    /// their native query language instead.
    pub fn matches(&self, record: &EntityRecord) -> MetaResult<bool> {
        if self.groups.is_empty() {
            return Ok(true);
        }
        for group in &self.groups {
            let mut all = true;
            for predicate in group {
                if !predicate.matches(record)? {
                    all = false;
                    break;
                }
            }
            if all {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Display for CompiledQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .groups
            .iter()
            .map(|group| {
                let clauses: Vec<String> = group.iter().map(|p| p.to_string()).collect();
                format!("({})", clauses.join(" AND "))
            })
            .collect();
        write!(f, "{}", rendered.join(" OR "))
    }
}

/// Parses, validates, and compiles declarative filter expressions.
///
/// The engine owns the PARSE and VALIDATE stages of a listing call:
/// normalization of the input forms, per-clause type coercion, and the
/// validation rules (wildcard legality, numeric keys, timestamp grammar,
/// duplicate clauses). Compilation delegates each clause to the resolved
/// plugin's backend adapter, which translates it into its native predicate
/// form; the engine combines per-group predicates with AND and groups with
/// OR.
///
/// # Examples
///
/// ```rust,ignore
/// let engine = FilterEngine::new(&serde_json::json!({"length.gt": "100"}), true)?;
/// let query = engine.compile(&plugin.adapter())?;
/// let records = plugin.adapter().execute(&query, None)?;
/// ```
#[derive(Debug)]
pub struct FilterEngine {
    expression: FilterExpression,
}

impl FilterEngine {
    /// Parses and validates a filter expression from its JSON form.
    ///
    /// # Arguments
    ///
    /// * `input` - A mapping, list of mappings, or serialized form
    /// * `strict_coerce` - Whether numeric-key validation applies; false for
    ///   plugins that store raw untyped values
    ///
    /// # Errors
    ///
    /// `InvalidFilter` with group/key context for every validation failure.
    pub fn new(input: &serde_json::Value, strict_coerce: bool) -> MetaResult<Self> {
        let expression = FilterExpression::parse(input)?;
        Self::from_expression(expression, strict_coerce)
    }

    /// Validates and coerces an already-parsed expression.
    pub fn from_expression(
        mut expression: FilterExpression,
        strict_coerce: bool,
    ) -> MetaResult<Self> {
        for (index, group) in expression.groups_mut().iter_mut().enumerate() {
            for clause in group.clauses_mut() {
                coerce_clause(clause, index, strict_coerce)?;
            }
        }
        Ok(FilterEngine { expression })
    }

    pub fn expression(&self) -> &FilterExpression {
        &self.expression
    }

    /// Returns the metadata keys the expression mentions, excluding `name`.
    pub fn filter_keys(&self) -> BTreeSet<String> {
        self.expression.filter_keys()
    }

    /// Compiles the expression into backend-native predicates.
    pub fn compile(&self, adapter: &BackendAdapter) -> MetaResult<CompiledQuery> {
        let mut groups = Vec::with_capacity(self.expression.groups().len());
        for group in self.expression.groups() {
            let mut predicates = Vec::with_capacity(group.clauses().len());
            for clause in group.clauses() {
                predicates.push(adapter.translate_clause(clause)?);
            }
            groups.push(predicates);
        }
        let query = CompiledQuery::new(groups);
        log::debug!("Compiled filter for adapter '{}': {}", adapter.name(), query);
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MetaValue;
    use crate::errors::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_engine_coerces_numeric_string() {
        let engine = FilterEngine::new(&json!({"length.gt": "100"}), true).unwrap();
        let clause = &engine.expression().groups()[0].clauses()[0];
        assert_eq!(clause.value(), &MetaValue::I64(100));
    }

    #[test]
    fn test_engine_rejects_wildcard_with_ordering() {
        let err = FilterEngine::new(&json!({"name.gt": "*"}), true).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFilter);
    }

    #[test]
    fn test_engine_rejects_bad_numeric_value() {
        let err = FilterEngine::new(&json!({"length.gt": "huge"}), true).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFilter);
    }

    #[test]
    fn test_engine_lenient_mode() {
        let engine = FilterEngine::new(&json!({"length": "huge"}), false).unwrap();
        assert_eq!(engine.expression().groups().len(), 1);
    }

    #[test]
    fn test_filter_keys() {
        let engine =
            FilterEngine::new(&json!({"project": "X", "name": "file*"}), true).unwrap();
        let keys = engine.filter_keys();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains("project"));
    }

    #[test]
    fn test_empty_compiled_query_matches_all() {
        let query = CompiledQuery::new(Vec::new());
        assert!(query.is_empty());
        let record = EntityRecord::new(
            crate::common::EntityId::new("scope", "name"),
            None,
            Default::default(),
        );
        assert!(query.matches(&record).unwrap());
    }
}
