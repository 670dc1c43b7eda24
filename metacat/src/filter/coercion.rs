use crate::common::MetaValue;
use crate::errors::{ErrorKind, MetaError, MetaResult};
use crate::filter::FilterClause;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Accepted date/time formats, in match order. The first matching format
/// wins.
pub static TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%a, %d %b %Y %H:%M:%S UTC",
    "%Y-%m-%d",
];

/// Keys with numeric-only semantics. In strict mode a clause on one of these
/// keys must coerce to a number.
pub static NUMERIC_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["bytes", "length", "events", "run_number", "lifetime"]
        .into_iter()
        .collect()
});

/// Keys holding timestamps. Clause values on these keys must coerce to a
/// timestamp regardless of strictness.
pub static TIMESTAMP_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["created_at", "updated_at", "expired_at"].into_iter().collect()
});

/// Parses a timestamp string against the fixed format table.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    for format in TIMESTAMP_FORMATS {
        if *format == "%Y-%m-%d" {
            if let Some(dt) = NaiveDate::parse_from_str(raw, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
            {
                return Some(dt.and_utc());
            }
        } else if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }
    None
}

/// Coerces a string value into its most specific representation.
///
/// - `"true"`/`"false"` (case-insensitive) become booleans,
/// - strings matching the integer or float grammar become numbers,
/// - strings matching a fixed date/time format become timestamps,
/// - everything else stays a string.
///
/// Non-string values pass through unchanged.
pub fn coerce_value(value: &MetaValue) -> MetaValue {
    let raw = match value.as_str() {
        Some(s) => s,
        None => return value.clone(),
    };

    if raw.eq_ignore_ascii_case("true") {
        return MetaValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return MetaValue::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return MetaValue::I64(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return MetaValue::F64(f);
        }
    }
    if let Some(ts) = parse_timestamp(raw) {
        return MetaValue::Timestamp(ts);
    }
    value.clone()
}

/// Coerces and validates a single clause in place.
///
/// Wildcard clauses keep their string pattern untouched. When `strict` is
/// false (the target plugin stores raw untyped values), numeric-key
/// validation is skipped but timestamp keys are still checked, since range
/// rewrites depend on them.
pub fn coerce_clause(clause: &mut FilterClause, group_index: usize, strict: bool) -> MetaResult<()> {
    if clause.is_wildcard() {
        return Ok(());
    }

    let coerced = coerce_value(clause.value());

    if TIMESTAMP_KEYS.contains(clause.key()) && !matches!(coerced, MetaValue::Timestamp(_)) {
        return Err(MetaError::new(
            &format!(
                "value {} for key '{}' in filter group {} is not a recognized timestamp",
                clause.value(),
                clause.key(),
                group_index
            ),
            ErrorKind::InvalidFilter,
        ));
    }

    if strict && NUMERIC_KEYS.contains(clause.key()) && !coerced.is_numeric() {
        return Err(MetaError::new(
            &format!(
                "value {} for numeric key '{}' in filter group {} does not coerce to a number",
                clause.value(),
                clause.key(),
                group_index
            ),
            ErrorKind::InvalidFilter,
        ));
    }

    clause.set_value(coerced);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOperator;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2021, 6, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2021-06-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-06-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("Tue, 01 Jun 2021 12:30:00 UTC"), Some(expected));

        let midnight = Utc.with_ymd_and_hms(2021, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2021-06-01"), Some(midnight));

        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("2021-13-45"), None);
    }

    #[test]
    fn test_parse_timestamp_fractional() {
        let parsed = parse_timestamp("2021-06-01T12:30:00.250").unwrap();
        assert_eq!(parsed.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_coerce_booleans() {
        assert_eq!(coerce_value(&MetaValue::from("true")), MetaValue::Bool(true));
        assert_eq!(coerce_value(&MetaValue::from("False")), MetaValue::Bool(false));
        assert_eq!(coerce_value(&MetaValue::from("TRUE")), MetaValue::Bool(true));
    }

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(coerce_value(&MetaValue::from("100")), MetaValue::I64(100));
        assert_eq!(coerce_value(&MetaValue::from("-7")), MetaValue::I64(-7));
        assert_eq!(coerce_value(&MetaValue::from("1.5")), MetaValue::F64(1.5));
    }

    #[test]
    fn test_coerce_timestamp() {
        let coerced = coerce_value(&MetaValue::from("2021-01-01 00:00:00"));
        assert!(matches!(coerced, MetaValue::Timestamp(_)));
    }

    #[test]
    fn test_coerce_leaves_plain_strings() {
        assert_eq!(coerce_value(&MetaValue::from("data17")), MetaValue::from("data17"));
    }

    #[test]
    fn test_coerce_passes_non_strings() {
        assert_eq!(coerce_value(&MetaValue::I64(5)), MetaValue::I64(5));
        assert_eq!(coerce_value(&MetaValue::Bool(true)), MetaValue::Bool(true));
    }

    #[test]
    fn test_coerce_clause_numeric_key_accepts_numeric_string() {
        let mut clause =
            FilterClause::new("length", FilterOperator::Gt, MetaValue::from("100"), false);
        coerce_clause(&mut clause, 0, true).unwrap();
        assert_eq!(clause.value(), &MetaValue::I64(100));
    }

    #[test]
    fn test_coerce_clause_numeric_key_rejects_text() {
        let mut clause =
            FilterClause::new("length", FilterOperator::Gt, MetaValue::from("big"), false);
        let err = coerce_clause(&mut clause, 2, true).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFilter);
        assert!(err.message().contains("group 2"));
        assert!(err.message().contains("length"));
    }

    #[test]
    fn test_coerce_clause_lenient_skips_numeric_check() {
        let mut clause =
            FilterClause::new("length", FilterOperator::Eq, MetaValue::from("big"), false);
        assert!(coerce_clause(&mut clause, 0, false).is_ok());
    }

    #[test]
    fn test_coerce_clause_timestamp_key_rejects_malformed() {
        let mut clause = FilterClause::new(
            "created_at",
            FilterOperator::Lt,
            MetaValue::from("yesterday"),
            false,
        );
        let err = coerce_clause(&mut clause, 0, false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidFilter);
        assert!(err.message().contains("timestamp"));
    }

    #[test]
    fn test_coerce_clause_wildcard_untouched() {
        let mut clause =
            FilterClause::new("name", FilterOperator::Eq, MetaValue::from("100*"), true);
        coerce_clause(&mut clause, 0, true).unwrap();
        assert_eq!(clause.value(), &MetaValue::from("100*"));
    }
}
