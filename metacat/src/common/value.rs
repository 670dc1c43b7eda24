use chrono::{DateTime, SecondsFormat, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Compare two floats for equality with proper NaN handling.
#[inline]
fn num_eq_float(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        true
    } else {
        a == b
    }
}

/// Compare two floats with proper NaN and total ordering.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    // NaN sorts greater than all other values
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// A semi-structured metadata value.
///
/// # Purpose
/// Provides the single shared value representation used across every backend
/// adapter, so the filter engine's coercion logic operates on one type
/// regardless of whether a value ultimately lands in a relational column, a
/// JSON document, or a search index.
///
/// # Variants
/// - `Null`: absence of a value
/// - `Bool(bool)`: boolean true/false
/// - `I64(i64)`: integer value
/// - `F64(f64)`: floating point value
/// - `String(String)`: text value
/// - `Timestamp(DateTime<Utc>)`: point in time
/// - `Array(Vec<MetaValue>)`: ordered collection of values
/// - `Map(BTreeMap<String, MetaValue>)`: nested key/value structure
///
/// # Characteristics
/// - **Comparable**: implements Ord with cross-width numeric comparison
/// - **Serializable**: converts to/from `serde_json::Value`
/// - **Default**: defaults to `Null`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum MetaValue {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a signed 64-bit integer value.
    I64(i64),
    /// Represents a 64-bit floating point value.
    F64(f64),
    /// Represents a string value.
    String(String),
    /// Represents a UTC timestamp value.
    Timestamp(DateTime<Utc>),
    /// Represents an array value.
    Array(Vec<MetaValue>),
    /// Represents a nested map value.
    Map(BTreeMap<String, MetaValue>),
}

impl MetaValue {
    /// Checks if this value is numeric (integer or float).
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, MetaValue::I64(_) | MetaValue::F64(_))
    }

    /// Checks if this value is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, MetaValue::Null)
    }

    /// Returns the boolean value if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value if this is an `I64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetaValue::I64(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the numeric value as `f64` if this is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::I64(i) => Some(*i as f64),
            MetaValue::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the string slice if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the timestamp if this is a `Timestamp`.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            MetaValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns a short name for the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            MetaValue::Null => "null",
            MetaValue::Bool(_) => "boolean",
            MetaValue::I64(_) => "integer",
            MetaValue::F64(_) => "float",
            MetaValue::String(_) => "string",
            MetaValue::Timestamp(_) => "timestamp",
            MetaValue::Array(_) => "array",
            MetaValue::Map(_) => "map",
        }
    }

    /// Compares two values for filter evaluation.
    ///
    /// Numeric values compare across integer/float representations. Values of
    /// different, non-numeric variants are not comparable and yield `None`,
    /// which filter predicates treat as a non-match.
    pub fn compare(&self, other: &MetaValue) -> Option<Ordering> {
        if self.is_numeric() && other.is_numeric() {
            if let (MetaValue::I64(a), MetaValue::I64(b)) = (self, other) {
                return Some(a.cmp(b));
            }
            if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
                return Some(num_cmp_float(a, b));
            }
        }

        match (self, other) {
            (MetaValue::Null, MetaValue::Null) => Some(Ordering::Equal),
            (MetaValue::Bool(a), MetaValue::Bool(b)) => Some(a.cmp(b)),
            (MetaValue::String(a), MetaValue::String(b)) => Some(a.cmp(b)),
            (MetaValue::Timestamp(a), MetaValue::Timestamp(b)) => Some(a.cmp(b)),
            (MetaValue::Array(a), MetaValue::Array(b)) => {
                if a.len() != b.len() {
                    return Some(a.len().cmp(&b.len()));
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        Some(Ordering::Equal) => continue,
                        other => return other,
                    }
                }
                Some(Ordering::Equal)
            }
            (MetaValue::Map(a), MetaValue::Map(b)) => {
                if a == b {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Converts a `serde_json::Value` into a `MetaValue`.
    ///
    /// JSON numbers become `I64` when they fit, `F64` otherwise. Timestamps
    /// are not inferred here; string coercion is the filter engine's job.
    pub fn from_json(value: &serde_json::Value) -> MetaValue {
        match value {
            serde_json::Value::Null => MetaValue::Null,
            serde_json::Value::Bool(b) => MetaValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    MetaValue::I64(i)
                } else {
                    MetaValue::F64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => MetaValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                MetaValue::Array(items.iter().map(MetaValue::from_json).collect())
            }
            serde_json::Value::Object(map) => MetaValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), MetaValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts this value into a `serde_json::Value`.
    ///
    /// Timestamps render as RFC 3339 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetaValue::Null => serde_json::Value::Null,
            MetaValue::Bool(b) => serde_json::Value::Bool(*b),
            MetaValue::I64(i) => serde_json::Value::from(*i),
            MetaValue::F64(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            MetaValue::String(s) => serde_json::Value::String(s.clone()),
            MetaValue::Timestamp(t) => {
                serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            MetaValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json()).collect())
            }
            MetaValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl PartialEq for MetaValue {
    fn eq(&self, other: &Self) -> bool {
        if self.is_numeric() && other.is_numeric() {
            if let (MetaValue::I64(a), MetaValue::I64(b)) = (self, other) {
                return a == b;
            }
            if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
                return num_eq_float(a, b);
            }
        }

        match (self, other) {
            (MetaValue::Null, MetaValue::Null) => true,
            (MetaValue::Bool(a), MetaValue::Bool(b)) => a == b,
            (MetaValue::String(a), MetaValue::String(b)) => a == b,
            (MetaValue::Timestamp(a), MetaValue::Timestamp(b)) => a == b,
            (MetaValue::Array(a), MetaValue::Array(b)) => a == b,
            (MetaValue::Map(a), MetaValue::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for MetaValue {}

impl Display for MetaValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

impl From<i32> for MetaValue {
    fn from(v: i32) -> Self {
        MetaValue::I64(v as i64)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::I64(v)
    }
}

impl From<u32> for MetaValue {
    fn from(v: u32) -> Self {
        MetaValue::I64(v as i64)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::F64(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::String(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::String(v)
    }
}

impl From<DateTime<Utc>> for MetaValue {
    fn from(v: DateTime<Utc>) -> Self {
        MetaValue::Timestamp(v)
    }
}

impl From<Vec<MetaValue>> for MetaValue {
    fn from(v: Vec<MetaValue>) -> Self {
        MetaValue::Array(v)
    }
}

impl From<BTreeMap<String, MetaValue>> for MetaValue {
    fn from(v: BTreeMap<String, MetaValue>) -> Self {
        MetaValue::Map(v)
    }
}
