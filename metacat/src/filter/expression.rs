use crate::common::MetaValue;
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::filter::{FilterClause, FilterOperator};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// An ordered set of filter clauses, all ANDed.
///
/// Invariant: no duplicate `(key, operator)` pair within one group; the
/// parser rejects duplicates with the group index in the error message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGroup {
    clauses: Vec<FilterClause>,
}

impl FilterGroup {
    pub fn new(clauses: Vec<FilterClause>) -> Self {
        FilterGroup { clauses }
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub(crate) fn clauses_mut(&mut self) -> &mut [FilterClause] {
        &mut self.clauses
    }
}

impl Display for FilterGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        write!(f, "({})", rendered.join(" AND "))
    }
}

/// A declarative filter over metadata keys: an OR of AND groups.
///
/// Accepted input forms, all normalized here:
/// - a single JSON mapping (one implicit group),
/// - a JSON list of mappings (explicit OR groups),
/// - a JSON string holding either of the above, serialized.
///
/// Each key may carry an operator suffix (`.gt`, `.gte`, `.lt`, `.lte`,
/// `.ne`); no suffix means equality. The `created_before`/`created_after`
/// pseudo-keys are rewritten into `created_at` range clauses during parsing,
/// before any ownership resolution sees the expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpression {
    groups: Vec<FilterGroup>,
}

impl FilterExpression {
    /// Parses and normalizes a filter expression from its JSON form.
    ///
    /// # Errors
    ///
    /// `InvalidFilter` for non-mapping groups, keys containing `.` after
    /// suffix stripping, wildcards combined with non-equality operators, and
    /// duplicate `(key, operator)` pairs within a group. Every error names
    /// the offending group index and key.
    pub fn parse(input: &serde_json::Value) -> MetaResult<Self> {
        let groups_json: Vec<&serde_json::Value> = match input {
            serde_json::Value::Null => Vec::new(),
            serde_json::Value::Object(_) => vec![input],
            serde_json::Value::Array(items) => items.iter().collect(),
            serde_json::Value::String(raw) => {
                let parsed: serde_json::Value = serde_json::from_str(raw)?;
                return Self::parse(&parsed);
            }
            other => {
                log::error!("Filter expression has unsupported form: {}", other);
                return Err(MetaError::new(
                    "filter expression must be a mapping, a list of mappings, or a serialized form",
                    ErrorKind::InvalidFilter,
                ));
            }
        };

        let mut groups = Vec::new();
        for (index, group_json) in groups_json.iter().enumerate() {
            let object = match group_json {
                serde_json::Value::Object(map) => map,
                other => {
                    return Err(MetaError::new(
                        &format!("filter group {} is not a mapping: {}", index, other),
                        ErrorKind::InvalidFilter,
                    ));
                }
            };

            let mut clauses: Vec<FilterClause> = Vec::new();
            for (raw_key, json_value) in object {
                let clause = parse_clause(index, raw_key, json_value)?;
                let duplicate = clauses
                    .iter()
                    .any(|c| c.key() == clause.key() && c.operator() == clause.operator());
                if duplicate {
                    return Err(MetaError::new(
                        &format!(
                            "duplicate clause '{}' with operator '{}' in filter group {}",
                            clause.key(),
                            clause.operator(),
                            index
                        ),
                        ErrorKind::InvalidFilter,
                    ));
                }
                clauses.push(clause);
            }
            if !clauses.is_empty() {
                groups.push(FilterGroup::new(clauses));
            }
        }

        Ok(FilterExpression { groups })
    }

    pub fn from_groups(groups: Vec<FilterGroup>) -> Self {
        FilterExpression { groups }
    }

    pub fn groups(&self) -> &[FilterGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.is_empty()) || self.groups.is_empty()
    }

    pub(crate) fn groups_mut(&mut self) -> &mut [FilterGroup] {
        &mut self.groups
    }

    /// Returns the set of metadata keys this expression mentions, excluding
    /// `name` clauses (always legal against any plugin).
    pub fn filter_keys(&self) -> BTreeSet<String> {
        self.groups
            .iter()
            .flat_map(|g| g.clauses())
            .filter(|c| !c.is_name_clause())
            .map(|c| c.key().to_string())
            .collect()
    }

    /// Returns a copy of this expression with every group's `name` clauses
    /// replaced by an exact-name equality clause.
    ///
    /// Used by the recursive listing expander to re-issue the same filter
    /// against derived child names.
    pub fn rewrite_name(&self, name: &str) -> FilterExpression {
        let name_clause =
            FilterClause::new("name", FilterOperator::Eq, MetaValue::from(name), false);
        let groups = self
            .groups
            .iter()
            .map(|group| {
                let mut clauses: Vec<FilterClause> = group
                    .clauses()
                    .iter()
                    .filter(|c| !c.is_name_clause())
                    .cloned()
                    .collect();
                clauses.push(name_clause.clone());
                FilterGroup::new(clauses)
            })
            .collect();
        FilterExpression { groups }
    }
}

impl Display for FilterExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.groups.iter().map(|g| g.to_string()).collect();
        write!(f, "{}", rendered.join(" OR "))
    }
}

/// Parses a single raw key/value pair into a typed clause.
fn parse_clause(
    group_index: usize,
    raw_key: &str,
    json_value: &serde_json::Value,
) -> MetaResult<FilterClause> {
    // pseudo-keys rewrite into created_at range clauses before anything else
    let (key, operator) = match raw_key {
        "created_before" => ("created_at".to_string(), FilterOperator::Lt),
        "created_after" => ("created_at".to_string(), FilterOperator::Gte),
        _ => match raw_key.rsplit_once('.') {
            Some((stem, suffix)) if !stem.is_empty() => match FilterOperator::from_suffix(suffix) {
                Some(op) => (stem.to_string(), op),
                None => (raw_key.to_string(), FilterOperator::Eq),
            },
            _ => (raw_key.to_string(), FilterOperator::Eq),
        },
    };

    if key.contains('.') {
        return Err(MetaError::new(
            &format!(
                "metadata key '{}' in filter group {} must not contain '.'",
                key, group_index
            ),
            ErrorKind::InvalidFilter,
        ));
    }

    let value = MetaValue::from_json(json_value);
    let wildcard = value.as_str().is_some_and(|s| s.contains('*'));
    if wildcard && !operator.is_equality() {
        return Err(MetaError::new(
            &format!(
                "wildcard value for key '{}' in filter group {} is only legal with eq/ne, got '{}'",
                key,
                group_index,
                operator.symbol()
            ),
            ErrorKind::InvalidFilter,
        ));
    }

    Ok(FilterClause::new(&key, operator, value, wildcard))
}
