//! The `log` table: a parsed view over the monitoring log file.

use vigil_core::LogEntry;

use crate::columns::Column;
use crate::row::Row;
use crate::tables::Table;
use crate::value::{ColumnType, Value};

fn col(
    name: &'static str,
    ctype: ColumnType,
    description: &'static str,
    f: impl Fn(&LogEntry) -> Value + Send + Sync + 'static,
) -> Column {
    Column::new(name, ctype, description, move |row, _state| match row {
        Row::Log(e) => f(e),
        _ => Column::empty(ctype),
    })
}

pub fn table() -> Table {
    let columns = vec![
        col("time", ColumnType::Time, "Entry timestamp", |e| Value::Int(e.time)),
        col("class", ColumnType::Int, "Entry class (1 alert, 3 notification, ...)", |e| {
            Value::Int(e.class)
        }),
        col("type", ColumnType::Str, "Entry type (SERVICE ALERT, ...)", |e| {
            Value::Str(e.log_type.clone())
        }),
        col("message", ColumnType::Str, "Raw message after the timestamp", |e| {
            Value::Str(e.message.clone())
        }),
        col("host_name", ColumnType::Str, "Host named by the entry", |e| {
            Value::Str(e.host_name.clone())
        }),
        col("service_description", ColumnType::Str, "Service named by the entry", |e| {
            Value::Str(e.service_description.clone())
        }),
        col("state", ColumnType::Int, "State carried by the entry", |e| {
            Value::Int(e.state)
        }),
        col("state_type", ColumnType::Str, "SOFT or HARD", |e| {
            Value::Str(e.state_type.clone())
        }),
        col("attempt", ColumnType::Int, "Attempt number", |e| Value::Int(e.attempt)),
        col("plugin_output", ColumnType::Str, "Plugin output carried by the entry", |e| {
            Value::Str(e.plugin_output.clone())
        }),
        col("contact_name", ColumnType::Str, "Contact (notification entries)", |e| {
            Value::Str(e.contact_name.clone())
        }),
        col("command_name", ColumnType::Str, "Command (notification/external entries)", |e| {
            Value::Str(e.command_name.clone())
        }),
    ];

    Table::new("log", columns, |state| {
        state.log_entries().into_iter().map(Row::Log).collect()
    })
}
