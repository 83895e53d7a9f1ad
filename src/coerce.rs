//! Coercion of loosely typed snapshot values.
//!
//! Upstream sources disagree on types: the same field may arrive as a
//! number or a string, and tag lists may be arrays or a single
//! comma-delimited string. [`LooseValue`] captures whatever arrived and its
//! accessors convert it into the canonical type, returning `None` when the
//! value cannot be coerced. Nothing past this module sees a `LooseValue`.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<LooseValue>),
    /// Booleans, objects, and anything else with no canonical reading.
    Other(serde_json::Value),
}

impl LooseValue {
    /// Non-blank text. Numbers are rendered in decimal; the original text
    /// is returned untrimmed.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) if !s.trim().is_empty() => Some(s.clone()),
            Self::Int(n) => Some(n.to_string()),
            Self::Float(f) if f.is_finite() => Some(f.to_string()),
            _ => None,
        }
    }

    /// Integer reading. Floats truncate toward zero; numeric strings are
    /// parsed after trimming.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Float(f) => float_to_int(*f),
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(float_to_int))
            }
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) if f.is_finite() => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// List of trimmed, non-empty labels. A string is split on commas; a
    /// list keeps every element that reads as text. An empty result is
    /// `None`.
    pub fn as_list(&self) -> Option<Vec<String>> {
        let items: Vec<String> = match self {
            Self::Text(s) => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            Self::List(values) => values
                .iter()
                .filter_map(LooseValue::as_text)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            _ => Vec::new(),
        };
        (!items.is_empty()).then_some(items)
    }

    /// Epoch timestamp in milliseconds. Integers below `1e11` are read as
    /// seconds and scaled; RFC 3339 text is converted.
    pub fn as_timestamp(&self) -> Option<i64> {
        self.as_int()
            .map(|n| {
                if n.abs() < SECONDS_CEILING {
                    n.saturating_mul(1000)
                } else {
                    n
                }
            })
            .or_else(|| match self {
                Self::Text(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
                    .ok()
                    .map(|dt| dt.timestamp_millis()),
                _ => None,
            })
    }
}

/// `1e11` seconds is year 5138; `1e11` milliseconds is early 1973.
const SECONDS_CEILING: i64 = 100_000_000_000;

fn float_to_int(f: f64) -> Option<i64> {
    if f.is_finite() && f.abs() < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => s[..byte_idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loose(v: serde_json::Value) -> LooseValue {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_untagged_variants() {
        assert_eq!(loose(json!(3)), LooseValue::Int(3));
        assert_eq!(loose(json!(1.5)), LooseValue::Float(1.5));
        assert_eq!(loose(json!("x")), LooseValue::Text("x".into()));
        assert!(matches!(loose(json!(true)), LooseValue::Other(_)));
        assert!(matches!(loose(json!({"a": 1})), LooseValue::Other(_)));
    }

    #[test]
    fn test_text_from_number_and_blank() {
        assert_eq!(loose(json!(42)).as_text().as_deref(), Some("42"));
        assert_eq!(loose(json!("   ")).as_text(), None);
        assert_eq!(loose(json!(false)).as_text(), None);
        assert_eq!(loose(json!(" MIT ")).as_text().as_deref(), Some(" MIT "));
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(loose(json!("1200")).as_int(), Some(1200));
        assert_eq!(loose(json!(" 7 ")).as_int(), Some(7));
        assert_eq!(loose(json!(9.9)).as_int(), Some(9));
        assert_eq!(loose(json!("12.0")).as_int(), Some(12));
        assert_eq!(loose(json!("many")).as_int(), None);
        assert_eq!(loose(json!([1])).as_int(), None);
    }

    #[test]
    fn test_list_from_comma_string() {
        assert_eq!(
            loose(json!("react, ui,, testing ")).as_list(),
            Some(vec!["react".into(), "ui".into(), "testing".into()])
        );
        assert_eq!(loose(json!(" , ")).as_list(), None);
    }

    #[test]
    fn test_list_from_array_stringifies_numbers() {
        assert_eq!(
            loose(json!([" a ", 2, "", null, {"x": 1}])).as_list(),
            Some(vec!["a".into(), "2".into()])
        );
        assert_eq!(loose(json!([])).as_list(), None);
        assert_eq!(loose(json!(5)).as_list(), None);
    }

    #[test]
    fn test_timestamp_from_rfc3339() {
        assert_eq!(loose(json!(1700000000000_i64)).as_timestamp(), Some(1700000000000));
        assert_eq!(loose(json!(1700000000)).as_timestamp(), Some(1700000000000));
        assert_eq!(loose(json!("1700000000")).as_timestamp(), Some(1700000000000));
        assert_eq!(
            loose(json!("1970-01-01T00:00:01Z")).as_timestamp(),
            Some(1000)
        );
        assert_eq!(loose(json!("yesterday")).as_timestamp(), None);
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars(&"x".repeat(5000), 2000).chars().count(), 2000);
    }
}
