//! The single-row `status` table.

use std::sync::atomic::Ordering;

use vigil_core::ProgramState;

use crate::columns::Column;
use crate::row::Row;
use crate::state::LivestatusState;
use crate::tables::Table;
use crate::value::{ColumnType, Value};

fn col(
    name: &'static str,
    ctype: ColumnType,
    description: &'static str,
    f: impl Fn(&ProgramState, &LivestatusState) -> Value + Send + Sync + 'static,
) -> Column {
    Column::new(name, ctype, description, move |row, state| match row {
        Row::Status => f(&state.globals, state),
        _ => Column::empty(ctype),
    })
}

pub fn table() -> Table {
    let columns = vec![
        col("program_start", ColumnType::Time, "When the daemon started", |g, _| {
            Value::Int(g.program_start)
        }),
        col("nagios_pid", ColumnType::Int, "Daemon process id", |g, _| {
            Value::Int(i64::from(g.pid))
        }),
        col("program_version", ColumnType::Str, "Daemon version", |_, _| {
            Value::Str(vigil_core::VERSION.to_string())
        }),
        col("enable_notifications", ColumnType::Int, "Global notifications toggle", |g, _| {
            Value::Int(i64::from(g.enable_notifications.load(Ordering::Relaxed)))
        }),
        col("execute_service_checks", ColumnType::Int, "Global active service check toggle", |g, _| {
            Value::Int(i64::from(g.execute_service_checks.load(Ordering::Relaxed)))
        }),
        col("execute_host_checks", ColumnType::Int, "Global active host check toggle", |g, _| {
            Value::Int(i64::from(g.execute_host_checks.load(Ordering::Relaxed)))
        }),
        col(
            "accept_passive_service_checks",
            ColumnType::Int,
            "Global passive service check toggle",
            |g, _| {
                Value::Int(i64::from(
                    g.accept_passive_service_checks.load(Ordering::Relaxed),
                ))
            },
        ),
        col(
            "accept_passive_host_checks",
            ColumnType::Int,
            "Global passive host check toggle",
            |g, _| {
                Value::Int(i64::from(g.accept_passive_host_checks.load(Ordering::Relaxed)))
            },
        ),
        col("enable_event_handlers", ColumnType::Int, "Global event handler toggle", |g, _| {
            Value::Int(i64::from(g.enable_event_handlers.load(Ordering::Relaxed)))
        }),
        col("enable_flap_detection", ColumnType::Int, "Global flap detection toggle", |g, _| {
            Value::Int(i64::from(g.enable_flap_detection.load(Ordering::Relaxed)))
        }),
        col("num_hosts", ColumnType::Int, "Number of configured hosts", |_, s| {
            Value::Int(s.store.host_count() as i64)
        }),
        col("num_services", ColumnType::Int, "Number of configured services", |_, s| {
            Value::Int(s.store.service_count() as i64)
        }),
        col("connections", ColumnType::Int, "Queries served so far", |g, _| {
            Value::Int(g.queries_served.load(Ordering::Relaxed) as i64)
        }),
        col(
            "external_commands",
            ColumnType::Int,
            "External commands processed so far",
            |g, _| Value::Int(g.external_commands_processed.load(Ordering::Relaxed) as i64),
        ),
        col("checks_run", ColumnType::Int, "Check results applied so far", |g, _| {
            Value::Int(g.checks_run.load(Ordering::Relaxed) as i64)
        }),
        col(
            "running_service_checks",
            ColumnType::Int,
            "Service checks currently in flight",
            |g, _| Value::Int(i64::from(g.running_service_checks.load(Ordering::Relaxed))),
        ),
    ];

    Table::new("status", columns, |_state| vec![Row::Status])
}
