//! Stats expressions: filter-counts and column aggregations.

use crate::error::LqlError;
use crate::filter::{Filter, LeafFilter};
use crate::row::Row;
use crate::state::LivestatusState;
use crate::tables::Table;
use crate::value::Value;

/// Aggregation functions accepted by `Stats: <func> <column>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsFunc {
    Sum,
    Avg,
    Min,
    Max,
    Std,
}

impl StatsFunc {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "std" => Some(Self::Std),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Std => "std",
        }
    }
}

/// One stats expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Stat {
    /// `Stats: <column> <op> <value>`: the count of matching rows.
    /// `StatsAnd`/`StatsOr` fold several of these into one compound count.
    Count(Filter),
    /// `Stats: <func> <column>`: a numeric aggregate.
    Aggregate { func: StatsFunc, column: String },
}

impl Stat {
    /// Parse the text after `Stats: `.
    pub fn parse(text: &str) -> Result<Self, LqlError> {
        let mut parts = text.trim().split_whitespace();
        let first = parts
            .next()
            .ok_or_else(|| LqlError::Parse("empty Stats:".to_string()))?;
        if let Some(func) = StatsFunc::parse(first) {
            let column = parts
                .next()
                .ok_or_else(|| LqlError::Parse(format!("Stats: {first} missing column")))?;
            return Ok(Self::Aggregate {
                func,
                column: column.to_string(),
            });
        }
        Ok(Self::Count(Filter::Leaf(LeafFilter::parse(text)?)))
    }

    pub fn render(&self, out: &mut Vec<String>) {
        match self {
            Self::Count(filter) => filter.render("Stats", out),
            Self::Aggregate { func, column } => {
                out.push(format!("Stats: {} {column}", func.name()));
            }
        }
    }

    /// Whether this stat is a plain (possibly compound) filter-count.
    pub fn is_count(&self) -> bool {
        matches!(self, Self::Count(_))
    }

    /// Evaluate over a set of rows.
    pub fn evaluate(&self, rows: &[Row], table: &Table, state: &LivestatusState) -> Value {
        match self {
            Self::Count(filter) => {
                let n = rows
                    .iter()
                    .filter(|row| filter.matches(row, table, state))
                    .count();
                Value::Int(n as i64)
            }
            Self::Aggregate { func, column } => {
                let Some(col) = table.column(column) else {
                    return Value::Int(0);
                };
                let values: Vec<f64> = rows
                    .iter()
                    .filter_map(|row| col.value(row, state).as_float())
                    .collect();
                aggregate(*func, &values)
            }
        }
    }

    /// Count one row into a running tally; used by the single-pass fast
    /// path.
    pub fn count_row(&self, row: &Row, table: &Table, state: &LivestatusState) -> u64 {
        match self {
            Self::Count(filter) => u64::from(filter.matches(row, table, state)),
            Self::Aggregate { .. } => 0,
        }
    }
}

fn aggregate(func: StatsFunc, values: &[f64]) -> Value {
    if values.is_empty() {
        return Value::Float(0.0);
    }
    let sum: f64 = values.iter().sum();
    let n = values.len() as f64;
    let result = match func {
        StatsFunc::Sum => sum,
        StatsFunc::Avg => sum / n,
        StatsFunc::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        StatsFunc::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        StatsFunc::Std => {
            let mean = sum / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            var.sqrt()
        }
    };
    Value::Float(result)
}

/// Fold the last `n` stats (which must all be counts) into one compound
/// count; `StatsAnd: N` / `StatsOr: N`.
pub fn combine_stats(stats: &mut Vec<Stat>, n: usize, conjunction: bool) -> Result<(), LqlError> {
    if n == 0 || stats.len() < n {
        return Err(LqlError::Parse(format!(
            "cannot combine {n} stats, only {} present",
            stats.len()
        )));
    }
    let tail = stats.split_off(stats.len() - n);
    let mut filters = Vec::with_capacity(n);
    for stat in tail {
        match stat {
            Stat::Count(f) => filters.push(f),
            Stat::Aggregate { .. } => {
                return Err(LqlError::Parse(
                    "StatsAnd/StatsOr can only combine filter stats".to_string(),
                ));
            }
        }
    }
    stats.push(Stat::Count(if conjunction {
        Filter::And(filters)
    } else {
        Filter::Or(filters)
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_stat() {
        let s = Stat::parse("state = 0").unwrap();
        assert!(s.is_count());
    }

    #[test]
    fn test_parse_aggregate_stat() {
        let s = Stat::parse("avg latency").unwrap();
        assert_eq!(
            s,
            Stat::Aggregate {
                func:   StatsFunc::Avg,
                column: "latency".to_string(),
            }
        );
    }

    #[test]
    fn test_aggregate_math() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(aggregate(StatsFunc::Sum, &values), Value::Float(10.0));
        assert_eq!(aggregate(StatsFunc::Avg, &values), Value::Float(2.5));
        assert_eq!(aggregate(StatsFunc::Min, &values), Value::Float(1.0));
        assert_eq!(aggregate(StatsFunc::Max, &values), Value::Float(4.0));
        match aggregate(StatsFunc::Std, &values) {
            Value::Float(v) => assert!((v - 1.118).abs() < 0.001),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_combine_requires_counts() {
        let mut stats = vec![
            Stat::parse("state = 0").unwrap(),
            Stat::parse("sum latency").unwrap(),
        ];
        assert!(combine_stats(&mut stats, 2, true).is_err());
    }

    #[test]
    fn test_combine_builds_compound() {
        let mut stats = vec![
            Stat::parse("state = 2").unwrap(),
            Stat::parse("acknowledged = 0").unwrap(),
        ];
        combine_stats(&mut stats, 2, true).unwrap();
        assert_eq!(stats.len(), 1);
        match &stats[0] {
            Stat::Count(Filter::And(parts)) => assert_eq!(parts.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
