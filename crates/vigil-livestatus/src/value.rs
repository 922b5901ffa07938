//! Typed column values.

use std::cmp::Ordering;

/// Declared type of a column. Drives how filter values are coerced and how
/// comparisons behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Str,
    List,
    /// Unix seconds; compared numerically, zero-time maps to 0.
    Time,
}

impl ColumnType {
    /// Wire name used by the `columns` meta-table.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
            Self::List => "list",
            Self::Time => "time",
        }
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl Value {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(_) | Self::List(_) => None,
        }
    }

    /// CSV cell rendering: lists join with `,`.
    pub fn csv_field(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Str(v) => v.clone(),
            Self::List(items) => items.join(","),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Value::from(*v),
            Self::Str(v) => serde_json::Value::from(v.clone()),
            Self::List(items) => serde_json::Value::from(items.clone()),
        }
    }

    /// Ordering used by `Sort:` specs. Numbers order numerically, strings
    /// lexically, lists by their joined form; mixed kinds order by kind.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Int(a), Self::Float(b)) => {
                (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Self::Float(a), Self::Int(b)) => {
                a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal)
            }
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => a.join(",").cmp(&b.join(",")),
            (a, b) => kind_rank(a).cmp(&kind_rank(b)),
        }
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Int(_) | Value::Float(_) => 0,
        Value::Str(_) => 1,
        Value::List(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_rendering() {
        assert_eq!(Value::Int(3).csv_field(), "3");
        assert_eq!(Value::Float(2.0).csv_field(), "2");
        assert_eq!(Value::Float(2.5).csv_field(), "2.5");
        assert_eq!(
            Value::List(vec!["a".into(), "b".into()]).csv_field(),
            "a,b"
        );
    }

    #[test]
    fn test_json_rendering() {
        assert_eq!(Value::Int(3).to_json().to_string(), "3");
        assert_eq!(
            Value::List(vec!["a".into()]).to_json().to_string(),
            "[\"a\"]"
        );
    }

    #[test]
    fn test_compare_numeric() {
        assert_eq!(Value::Int(1).compare(&Value::Int(2)), Ordering::Less);
        assert_eq!(Value::Int(2).compare(&Value::Float(1.5)), Ordering::Greater);
    }
}
