use crate::common::MetaValue;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Comparison operator of a filter clause.
///
/// Operators are attached to filter keys as a dot suffix (`bytes.gt`,
/// `created_at.lte`); a key without a suffix means equality. Created through
/// [FilterOperator::from_suffix] during expression parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOperator {
    /// Parses an operator from a key suffix. Returns `None` for unknown
    /// suffixes, which are then treated as part of the key itself.
    pub fn from_suffix(suffix: &str) -> Option<FilterOperator> {
        match suffix {
            "gt" => Some(FilterOperator::Gt),
            "gte" => Some(FilterOperator::Gte),
            "lt" => Some(FilterOperator::Lt),
            "lte" => Some(FilterOperator::Lte),
            "ne" => Some(FilterOperator::Ne),
            _ => None,
        }
    }

    /// Checks whether this is an equality-class operator (`eq`/`ne`).
    ///
    /// Wildcard values are only legal with equality-class operators.
    #[inline]
    pub fn is_equality(&self) -> bool {
        matches!(self, FilterOperator::Eq | FilterOperator::Ne)
    }

    /// Returns the rendered comparison symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
        }
    }

    /// Evaluates this operator against two values.
    ///
    /// Incomparable values (mismatched variants) never satisfy an ordering
    /// operator; for `ne` they trivially differ and match.
    pub fn evaluate(&self, lhs: &MetaValue, rhs: &MetaValue) -> bool {
        match self {
            FilterOperator::Eq => lhs == rhs,
            FilterOperator::Ne => lhs != rhs,
            ordering_op => match lhs.compare(rhs) {
                Some(ord) => match ordering_op {
                    FilterOperator::Gt => ord == Ordering::Greater,
                    FilterOperator::Gte => ord != Ordering::Less,
                    FilterOperator::Lt => ord == Ordering::Less,
                    FilterOperator::Lte => ord != Ordering::Greater,
                    _ => unreachable!(),
                },
                None => false,
            },
        }
    }
}

impl Display for FilterOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A single typed filter condition on one metadata key.
///
/// Clauses within a [FilterGroup](crate::filter::FilterGroup) are ANDed.
/// A clause is flagged `wildcard` when its value is a string containing `*`;
/// adapters translate wildcards to their native pattern form (SQL `LIKE`, a
/// regex, a prefix query).
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    key: String,
    operator: FilterOperator,
    value: MetaValue,
    wildcard: bool,
}

impl FilterClause {
    pub fn new(key: &str, operator: FilterOperator, value: MetaValue, wildcard: bool) -> Self {
        FilterClause {
            key: key.to_string(),
            operator,
            value,
            wildcard,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &MetaValue {
        &self.value
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Checks whether this clause targets the entity name rather than a
    /// metadata key. Name clauses are legal against any plugin and do not
    /// participate in ownership resolution.
    #[inline]
    pub fn is_name_clause(&self) -> bool {
        self.key == "name"
    }

    pub(crate) fn set_value(&mut self, value: MetaValue) {
        self.value = value;
    }
}

impl Display for FilterClause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.key, self.operator, self.value)
    }
}
