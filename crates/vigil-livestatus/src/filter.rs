//! Filter expressions: parsing, serialization, and evaluation.

use regex::{Regex, RegexBuilder};

use crate::error::LqlError;
use crate::row::Row;
use crate::state::LivestatusState;
use crate::tables::Table;
use crate::value::{ColumnType, Value};

/// Leaf comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    /// `!>=`: for lists, "does not contain".
    NotGe,
    /// `~` regex match
    Match,
    /// `!~`
    NoMatch,
    /// `=~` case-insensitive equality
    EqIc,
    /// `!=~`
    NeIc,
    /// `~~` case-insensitive substring
    ContainsIc,
    /// `!~~`
    NoContainsIc,
    /// Unrecognized operator token: the filter evaluates to false. Kept as
    /// a variant (with the raw token preserved on the leaf) so parsing
    /// never fails on operators this build does not know.
    Unknown,
}

impl FilterOp {
    pub fn parse(token: &str) -> Option<Self> {
        let op = match token {
            "=" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "<=" => Self::Le,
            ">=" => Self::Ge,
            "!>=" => Self::NotGe,
            "~" => Self::Match,
            "!~" => Self::NoMatch,
            "=~" => Self::EqIc,
            "!=~" => Self::NeIc,
            "~~" => Self::ContainsIc,
            "!~~" => Self::NoContainsIc,
            _ => return None,
        };
        Some(op)
    }

    pub const fn token(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::NotGe => "!>=",
            Self::Match => "~",
            Self::NoMatch => "!~",
            Self::EqIc => "=~",
            Self::NeIc => "!=~",
            Self::ContainsIc => "~~",
            Self::NoContainsIc => "!~~",
            Self::Unknown => "",
        }
    }
}

/// A single `Filter: <column> <op> <value>` line.
#[derive(Debug, Clone)]
pub struct LeafFilter {
    pub column: String,
    pub op: FilterOp,
    /// The operator as written, preserved for serialization even when the
    /// operator is unknown.
    op_token: String,
    pub value: String,
    /// Compiled at parse time for the regex operators; lives as long as
    /// the query.
    regex: Option<Regex>,
}

impl PartialEq for LeafFilter {
    fn eq(&self, other: &Self) -> bool {
        self.column == other.column && self.op_token == other.op_token && self.value == other.value
    }
}

impl LeafFilter {
    /// Parse the text after `Filter: `. The value may be empty (empty-list
    /// tests use `Filter: contacts =`).
    pub fn parse(text: &str) -> Result<Self, LqlError> {
        let text = text.trim();
        let mut parts = text.splitn(2, char::is_whitespace);
        let column = parts
            .next()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| LqlError::Parse(format!("empty filter: {text:?}")))?
            .to_string();
        let rest = parts.next().unwrap_or("").trim_start();
        if rest.is_empty() {
            return Err(LqlError::Parse(format!("filter missing operator: {text:?}")));
        }
        let (op_token, value) = match rest.split_once(char::is_whitespace) {
            Some((op, value)) => (op, value.trim()),
            None => (rest, ""),
        };
        // Unknown operators are tolerated; the filter just never matches.
        let op = FilterOp::parse(op_token).unwrap_or(FilterOp::Unknown);
        let value = value.to_string();

        let regex = match op {
            FilterOp::Match | FilterOp::NoMatch => Some(
                Regex::new(&value)
                    .map_err(|e| LqlError::Parse(format!("bad regex {value:?}: {e}")))?,
            ),
            FilterOp::ContainsIc | FilterOp::NoContainsIc => Some(
                RegexBuilder::new(&regex::escape(&value))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| LqlError::Parse(format!("bad pattern {value:?}: {e}")))?,
            ),
            _ => None,
        };
        Ok(Self {
            column,
            op,
            op_token: op_token.to_string(),
            value,
            regex,
        })
    }

    pub fn render(&self) -> String {
        if self.value.is_empty() {
            format!("{} {}", self.column, self.op_token)
        } else {
            format!("{} {} {}", self.column, self.op_token, self.value)
        }
    }

    /// Evaluate against an extracted value of the given declared type.
    fn matches_value(&self, ctype: ColumnType, value: &Value) -> bool {
        match value {
            Value::List(items) => self.matches_list(items),
            _ => match ctype {
                ColumnType::Int | ColumnType::Time => {
                    let Some(actual) = value.as_float() else {
                        return false;
                    };
                    let wanted: f64 = match self.value.parse() {
                        Ok(v) => v,
                        // zero-time and unparsable both coerce to 0
                        Err(_) if ctype == ColumnType::Time => 0.0,
                        Err(_) => return self.matches_str(&value.csv_field()),
                    };
                    self.compare_num(actual, wanted)
                }
                ColumnType::Float => {
                    let Some(actual) = value.as_float() else {
                        return false;
                    };
                    match self.value.parse::<f64>() {
                        Ok(wanted) => self.compare_num(actual, wanted),
                        Err(_) => false,
                    }
                }
                ColumnType::Str | ColumnType::List => self.matches_str(&value.csv_field()),
            },
        }
    }

    fn compare_num(&self, actual: f64, wanted: f64) -> bool {
        match self.op {
            FilterOp::Eq | FilterOp::EqIc => (actual - wanted).abs() < f64::EPSILON,
            FilterOp::Ne | FilterOp::NeIc => (actual - wanted).abs() >= f64::EPSILON,
            FilterOp::Lt => actual < wanted,
            FilterOp::Gt => actual > wanted,
            FilterOp::Le => actual <= wanted,
            FilterOp::Ge => actual >= wanted,
            FilterOp::NotGe => actual < wanted,
            // Regex operators fall back to the string rendering.
            FilterOp::Match | FilterOp::NoMatch | FilterOp::ContainsIc | FilterOp::NoContainsIc => {
                self.matches_str(&actual.to_string())
            }
            FilterOp::Unknown => false,
        }
    }

    fn matches_str(&self, actual: &str) -> bool {
        match self.op {
            FilterOp::Eq => actual == self.value,
            FilterOp::Ne => actual != self.value,
            FilterOp::Lt => actual < self.value.as_str(),
            FilterOp::Gt => actual > self.value.as_str(),
            FilterOp::Le => actual <= self.value.as_str(),
            FilterOp::Ge => actual >= self.value.as_str(),
            FilterOp::NotGe => actual < self.value.as_str(),
            FilterOp::Match => self.regex.as_ref().is_some_and(|r| r.is_match(actual)),
            FilterOp::NoMatch => !self.regex.as_ref().is_some_and(|r| r.is_match(actual)),
            FilterOp::EqIc => actual.eq_ignore_ascii_case(&self.value),
            FilterOp::NeIc => !actual.eq_ignore_ascii_case(&self.value),
            FilterOp::ContainsIc => self.regex.as_ref().is_some_and(|r| r.is_match(actual)),
            FilterOp::NoContainsIc => !self.regex.as_ref().is_some_and(|r| r.is_match(actual)),
            FilterOp::Unknown => false,
        }
    }

    /// List semantics: `>=` membership, `!>=` absence, `~` member regex,
    /// `=`/`!=` with an empty value test emptiness. Anything else is false.
    fn matches_list(&self, items: &[String]) -> bool {
        match self.op {
            FilterOp::Ge => items.iter().any(|i| i == &self.value),
            FilterOp::NotGe => !items.iter().any(|i| i == &self.value),
            FilterOp::Match => self
                .regex
                .as_ref()
                .is_some_and(|r| items.iter().any(|i| r.is_match(i))),
            FilterOp::NoMatch => !self
                .regex
                .as_ref()
                .is_some_and(|r| items.iter().any(|i| r.is_match(i))),
            FilterOp::Eq if self.value.is_empty() => items.is_empty(),
            FilterOp::Ne if self.value.is_empty() => !items.is_empty(),
            _ => false,
        }
    }
}

/// A filter tree: leaves connected by And/Or/Negate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Leaf(LeafFilter),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Negate(Box<Filter>),
}

impl Filter {
    /// Evaluate against a row. Unknown columns make a leaf false, never an
    /// error: downstream UIs probe optional columns and expect empty
    /// results.
    pub fn matches(&self, row: &Row, table: &Table, state: &LivestatusState) -> bool {
        match self {
            Self::Leaf(leaf) => match table.column(&leaf.column) {
                Some(column) => leaf.matches_value(column.ctype, &column.value(row, state)),
                None => false,
            },
            Self::And(parts) => parts.iter().all(|f| f.matches(row, table, state)),
            Self::Or(parts) => parts.iter().any(|f| f.matches(row, table, state)),
            Self::Negate(inner) => !inner.matches(row, table, state),
        }
    }

    /// Re-emit the LQL lines producing this tree (post-order, as the
    /// parser consumes them).
    pub fn render(&self, prefix: &str, out: &mut Vec<String>) {
        match self {
            Self::Leaf(leaf) => out.push(format!("{prefix}: {}", leaf.render())),
            Self::And(parts) => {
                for p in parts {
                    p.render(prefix, out);
                }
                out.push(format!("{prefix}And: {}", parts.len()));
            }
            Self::Or(parts) => {
                for p in parts {
                    p.render(prefix, out);
                }
                out.push(format!("{prefix}Or: {}", parts.len()));
            }
            Self::Negate(inner) => {
                inner.render(prefix, out);
                out.push(format!("{prefix}Negate:"));
            }
        }
    }
}

/// Pop `n` filters off the stack and combine them. Used by `And: N` and
/// `Or: N` headers.
pub fn combine(stack: &mut Vec<Filter>, n: usize, conjunction: bool) -> Result<(), LqlError> {
    if n == 0 || stack.len() < n {
        return Err(LqlError::Parse(format!(
            "cannot combine {n} filters, only {} on the stack",
            stack.len()
        )));
    }
    let parts = stack.split_off(stack.len() - n);
    stack.push(if conjunction {
        Filter::And(parts)
    } else {
        Filter::Or(parts)
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leaf() {
        let f = LeafFilter::parse("state = 2").unwrap();
        assert_eq!(f.column, "state");
        assert_eq!(f.op, FilterOp::Eq);
        assert_eq!(f.value, "2");
    }

    #[test]
    fn test_parse_empty_value() {
        let f = LeafFilter::parse("contacts =").unwrap();
        assert_eq!(f.value, "");
    }

    #[test]
    fn test_parse_value_with_spaces() {
        let f = LeafFilter::parse("plugin_output ~ connection refused$").unwrap();
        assert_eq!(f.value, "connection refused$");
    }

    #[test]
    fn test_bad_regex_is_parse_error() {
        assert!(LeafFilter::parse("name ~ [unclosed").is_err());
    }

    #[test]
    fn test_unknown_operator_never_matches() {
        let f = LeafFilter::parse("state <> 2").unwrap();
        assert_eq!(f.op, FilterOp::Unknown);
        assert!(!f.matches_value(ColumnType::Int, &Value::Int(2)));
        assert_eq!(f.render(), "state <> 2");
    }

    #[test]
    fn test_numeric_compare() {
        let f = LeafFilter::parse("state >= 1").unwrap();
        assert!(f.matches_value(ColumnType::Int, &Value::Int(2)));
        assert!(!f.matches_value(ColumnType::Int, &Value::Int(0)));
    }

    #[test]
    fn test_time_zero_coercion() {
        let f = LeafFilter::parse("last_check = ").unwrap();
        assert!(f.matches_value(ColumnType::Time, &Value::Int(0)));
        assert!(!f.matches_value(ColumnType::Time, &Value::Int(100)));
    }

    #[test]
    fn test_case_insensitive_ops() {
        let eq = LeafFilter::parse("name =~ WEB1").unwrap();
        assert!(eq.matches_value(ColumnType::Str, &Value::Str("web1".into())));
        let contains = LeafFilter::parse("plugin_output ~~ refused").unwrap();
        assert!(contains.matches_value(
            ColumnType::Str,
            &Value::Str("Connection REFUSED by host".into())
        ));
    }

    #[test]
    fn test_list_semantics() {
        let contains = LeafFilter::parse("groups >= web-servers").unwrap();
        let list = Value::List(vec!["web-servers".into(), "prod".into()]);
        assert!(contains.matches_value(ColumnType::List, &list));

        let not_contains = LeafFilter::parse("groups !>= db-servers").unwrap();
        assert!(not_contains.matches_value(ColumnType::List, &list));

        let empty = LeafFilter::parse("groups =").unwrap();
        assert!(!empty.matches_value(ColumnType::List, &list));
        assert!(empty.matches_value(ColumnType::List, &Value::List(vec![])));

        let non_empty = LeafFilter::parse("groups !=").unwrap();
        assert!(non_empty.matches_value(ColumnType::List, &list));
    }

    #[test]
    fn test_combine_pops_in_order() {
        let mut stack = vec![
            Filter::Leaf(LeafFilter::parse("state = 0").unwrap()),
            Filter::Leaf(LeafFilter::parse("state = 1").unwrap()),
            Filter::Leaf(LeafFilter::parse("state = 2").unwrap()),
        ];
        combine(&mut stack, 2, false).unwrap();
        assert_eq!(stack.len(), 2);
        match &stack[1] {
            Filter::Or(parts) => assert_eq!(parts.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_combine_underflow_is_error() {
        let mut stack = vec![Filter::Leaf(LeafFilter::parse("state = 0").unwrap())];
        assert!(combine(&mut stack, 2, true).is_err());
    }
}
