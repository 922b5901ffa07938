//! Query execution: filter, aggregate, group, sort, paginate, project.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::columns::Column;
use crate::error::LqlError;
use crate::query::Query;
use crate::row::Row;
use crate::state::LivestatusState;
use crate::tables::{Table, TableRegistry};
use crate::value::Value;

/// Separator joining group-key parts; cannot appear in column values that
/// arrive from line-based config and check output.
const GROUP_KEY_SEP: char = '\0';

/// Projected, formatted-ready result rows.
#[derive(Debug, Clone)]
pub struct ResultSet {
    /// Names of the projected columns (empty for stats-only results).
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Row count before offset/limit, for wrapped_json.
    pub total_count: usize,
}

/// Execute a parsed query against the registry and state.
pub fn execute(
    query: &Query,
    registry: &TableRegistry,
    state: &LivestatusState,
) -> Result<ResultSet, LqlError> {
    let table = registry
        .get(&query.table)
        .ok_or_else(|| LqlError::UnknownTable(query.table.clone()))?;

    let rows = table.rows(state);

    if !query.stats.is_empty() {
        return Ok(execute_stats(query, table, state, &rows));
    }

    let mut filtered: Vec<&Row> = rows
        .iter()
        .filter(|row| query.filters.iter().all(|f| f.matches(row, table, state)))
        .collect();

    sort_rows(&mut filtered, query, table, state);

    let total_count = filtered.len();
    let page = paginate(&filtered, query);

    let projected: Vec<&Column> = projection(query, table);
    let out_rows: Vec<Vec<Value>> = page
        .iter()
        .map(|row| projected.iter().map(|c| c.value(row, state)).collect())
        .collect();

    Ok(ResultSet {
        columns: projected.iter().map(|c| c.name.to_string()).collect(),
        rows: out_rows,
        total_count,
    })
}

fn execute_stats(
    query: &Query,
    table: &Table,
    state: &LivestatusState,
    rows: &[Row],
) -> ResultSet {
    // Fast path: pure filter-counts with no grouping evaluate in a single
    // pass without materializing the filtered slice.
    if query.columns.is_empty() && query.stats.iter().all(super::stats::Stat::is_count) {
        let mut counts = vec![0u64; query.stats.len()];
        for row in rows {
            if !query.filters.iter().all(|f| f.matches(row, table, state)) {
                continue;
            }
            for (i, stat) in query.stats.iter().enumerate() {
                counts[i] += stat.count_row(row, table, state);
            }
        }
        return ResultSet {
            columns: Vec::new(),
            rows: vec![counts.into_iter().map(|c| Value::Int(c as i64)).collect()],
            total_count: 1,
        };
    }

    let filtered: Vec<Row> = rows
        .iter()
        .filter(|row| query.filters.iter().all(|f| f.matches(row, table, state)))
        .cloned()
        .collect();

    if query.columns.is_empty() {
        // One aggregate row over the whole filtered set.
        let row: Vec<Value> = query
            .stats
            .iter()
            .map(|s| s.evaluate(&filtered, table, state))
            .collect();
        return ResultSet {
            columns: Vec::new(),
            rows: vec![row],
            total_count: 1,
        };
    }

    // Grouped stats: group key is the tuple of the selected columns'
    // values; groups keep first-encountered order.
    let group_columns: Vec<&Column> = query
        .columns
        .iter()
        .filter_map(|name| table.column(name))
        .collect();
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (Vec<Value>, Vec<Row>)> = HashMap::new();
    for row in filtered {
        let values: Vec<Value> = group_columns
            .iter()
            .map(|c| c.value(&row, state))
            .collect();
        let key = values
            .iter()
            .map(Value::csv_field)
            .collect::<Vec<_>>()
            .join(&GROUP_KEY_SEP.to_string());
        let entry = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (values, Vec::new())
        });
        entry.1.push(row);
    }

    let mut out_rows = Vec::with_capacity(order.len());
    for key in &order {
        if let Some((values, members)) = groups.get(key) {
            let mut row = values.clone();
            for stat in &query.stats {
                row.push(stat.evaluate(members, table, state));
            }
            out_rows.push(row);
        }
    }
    let total_count = out_rows.len();
    ResultSet {
        columns: Vec::new(),
        rows: out_rows,
        total_count,
    }
}

fn sort_rows(rows: &mut [&Row], query: &Query, table: &Table, state: &LivestatusState) {
    if query.sorts.is_empty() {
        return;
    }
    let specs: Vec<(&Column, bool)> = query
        .sorts
        .iter()
        .filter_map(|s| table.column(&s.column).map(|c| (c, s.descending)))
        .collect();
    if specs.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for (column, descending) in &specs {
            let ord = column.value(a, state).compare(&column.value(b, state));
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn paginate<'a>(rows: &'a [&'a Row], query: &Query) -> &'a [&'a Row] {
    let start = query.offset.min(rows.len());
    let end = if query.limit < 0 {
        rows.len()
    } else {
        (start + query.limit as usize).min(rows.len())
    };
    &rows[start..end]
}

/// Columns to project: the requested ones that exist, or all of them.
/// Requested-but-unknown columns are dropped silently, matching the
/// filter behavior for unknown columns.
fn projection<'a>(query: &Query, table: &'a Table) -> Vec<&'a Column> {
    if query.columns.is_empty() {
        table.columns().iter().collect()
    } else {
        query
            .columns
            .iter()
            .filter_map(|name| table.column(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use vigil_core::config::test_support::small_config;
    use vigil_core::notifier::test_support::RecordingNotifier;
    use vigil_core::{
        CommentManager, DowntimeManager, MonitorLog, ObjectStore, ProgramState, RawCommand,
        ServiceState,
    };

    use crate::state::CommandSink;

    struct NullSink;
    impl CommandSink for NullSink {
        fn submit(&self, _command: RawCommand) {}
        fn submit_batch(&self, _commands: Vec<RawCommand>) {}
    }

    fn state() -> LivestatusState {
        let cfg = small_config();
        let store = Arc::new(ObjectStore::from_config(&cfg).unwrap());
        let comments = Arc::new(CommentManager::new());
        let downtimes = Arc::new(DowntimeManager::new(
            Arc::clone(&store),
            Arc::clone(&comments),
            Arc::new(MonitorLog::sink()),
            RecordingNotifier::new(),
        ));
        let globals = Arc::new(ProgramState::new(&cfg.daemon, 0));
        LivestatusState::new(
            store,
            comments,
            downtimes,
            globals,
            Arc::new(NullSink),
            std::path::Path::new("/nonexistent/vigil.log"),
        )
    }

    fn parse(text: &str) -> Query {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        Query::parse(&lines).unwrap()
    }

    #[test]
    fn test_unknown_table_is_404() {
        let st = state();
        let registry = TableRegistry::new();
        let err = execute(&parse("GET widgets"), &registry, &st).unwrap_err();
        assert!(matches!(err, LqlError::UnknownTable(_)));
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_projection_and_filter() {
        let st = state();
        let registry = TableRegistry::new();
        let result = execute(
            &parse("GET services\nColumns: host_name description\nFilter: host_name = web1"),
            &registry,
            &st,
        )
        .unwrap();
        assert_eq!(result.columns, vec!["host_name", "description"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0][0], Value::Str("web1".into()));
    }

    #[test]
    fn test_unknown_filter_column_yields_empty() {
        let st = state();
        let registry = TableRegistry::new();
        let result = execute(
            &parse("GET hosts\nFilter: no_such_column = 1"),
            &registry,
            &st,
        )
        .unwrap();
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_stats_fast_path_counts() {
        let st = state();
        // 3 OK services; make one CRITICAL, one WARNING.
        st.store
            .service("web1", "http")
            .unwrap()
            .write()
            .state = ServiceState::Critical;
        st.store
            .service("web1", "ssh")
            .unwrap()
            .write()
            .state = ServiceState::Warning;
        let registry = TableRegistry::new();
        let result = execute(
            &parse("GET services\nStats: state = 0\nStats: state = 2"),
            &registry,
            &st,
        )
        .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(1), Value::Int(1)]]);
    }

    #[test]
    fn test_stats_aggregate() {
        let st = state();
        for (svc, latency) in [("http", 1.0), ("ssh", 3.0)] {
            st.store.service("web1", svc).unwrap().write().latency = latency;
        }
        let registry = TableRegistry::new();
        let result = execute(
            &parse("GET services\nFilter: host_name = web1\nStats: avg latency"),
            &registry,
            &st,
        )
        .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Float(2.0)]]);
    }

    #[test]
    fn test_grouped_stats_preserve_order() {
        let st = state();
        let registry = TableRegistry::new();
        let result = execute(
            &parse("GET services\nColumns: host_name\nStats: state = 0"),
            &registry,
            &st,
        )
        .unwrap();
        // web1 first (two services), then db1.
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Str("web1".into()), Value::Int(2)],
                vec![Value::Str("db1".into()), Value::Int(1)],
            ]
        );
    }

    #[test]
    fn test_sort_limit_offset() {
        let st = state();
        let registry = TableRegistry::new();
        let result = execute(
            &parse("GET services\nColumns: description\nSort: description desc\nLimit: 2"),
            &registry,
            &st,
        )
        .unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0][0], Value::Str("ssh".into()));
        assert_eq!(result.total_count, 3);

        let offset = execute(
            &parse("GET services\nColumns: description\nSort: description desc\nOffset: 2"),
            &registry,
            &st,
        )
        .unwrap();
        assert_eq!(offset.rows.len(), 1);
    }

    #[test]
    fn test_compound_filter() {
        let st = state();
        st.store
            .service("web1", "http")
            .unwrap()
            .write()
            .state = ServiceState::Critical;
        let registry = TableRegistry::new();
        let result = execute(
            &parse(
                "GET services\nColumns: description\nFilter: state = 2\nFilter: state = 1\nOr: 2",
            ),
            &registry,
            &st,
        )
        .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], Value::Str("http".into()));
    }

    #[test]
    fn test_columns_meta_table() {
        let st = state();
        let registry = TableRegistry::new();
        let result = execute(
            &parse("GET columns\nColumns: name type\nFilter: table = hosts\nFilter: name = state\nAnd: 2"),
            &registry,
            &st,
        )
        .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::Str("state".into()), Value::Str("int".into())]]
        );
    }

    #[test]
    fn test_status_table_single_row() {
        let st = state();
        let registry = TableRegistry::new();
        let result = execute(
            &parse("GET status\nColumns: num_hosts num_services"),
            &registry,
            &st,
        )
        .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(2), Value::Int(3)]]);
    }
}
