//! The `downtimes` table.

use std::sync::Arc;

use vigil_core::Downtime;

use crate::columns::Column;
use crate::row::Row;
use crate::tables::Table;
use crate::value::{ColumnType, Value};

fn col(
    name: &'static str,
    ctype: ColumnType,
    description: &'static str,
    f: impl Fn(&Downtime) -> Value + Send + Sync + 'static,
) -> Column {
    Column::new(name, ctype, description, move |row, _state| match row {
        Row::Downtime(d) => f(d),
        _ => Column::empty(ctype),
    })
}

pub fn table() -> Table {
    let columns = vec![
        col("id", ColumnType::Int, "Downtime id", |d| Value::Int(d.id as i64)),
        col("host_name", ColumnType::Str, "Host the downtime is on", |d| {
            Value::Str(d.host_name.clone())
        }),
        col(
            "service_description",
            ColumnType::Str,
            "Service the downtime is on (empty for host downtimes)",
            |d| Value::Str(d.service_description.clone().unwrap_or_default()),
        ),
        col("is_service", ColumnType::Int, "1 for service downtimes", |d| {
            Value::Int(i64::from(d.service_description.is_some()))
        }),
        col("author", ColumnType::Str, "Who scheduled it", |d| {
            Value::Str(d.author.clone())
        }),
        col("comment", ColumnType::Str, "Why it was scheduled", |d| {
            Value::Str(d.comment.clone())
        }),
        col("entry_time", ColumnType::Time, "When it was scheduled", |d| {
            Value::Int(d.entry_time)
        }),
        col("start_time", ColumnType::Time, "Window start", |d| {
            Value::Int(d.start_time)
        }),
        col("end_time", ColumnType::Time, "Window end", |d| {
            Value::Int(d.end_time)
        }),
        col("fixed", ColumnType::Int, "1 fixed, 0 flexible", |d| {
            Value::Int(i64::from(d.fixed))
        }),
        col("duration", ColumnType::Int, "Duration in seconds (flexible only)", |d| {
            Value::Int(d.duration)
        }),
        col("triggered_by", ColumnType::Int, "Id of the triggering downtime, 0 if none", |d| {
            Value::Int(d.triggered_by as i64)
        }),
        col("in_effect", ColumnType::Int, "Whether the downtime is currently in effect", |d| {
            Value::Int(i64::from(d.in_effect))
        }),
    ];

    Table::new("downtimes", columns, |state| {
        state
            .downtimes
            .all()
            .into_iter()
            .map(|d| Row::Downtime(Arc::new(d)))
            .collect()
    })
}
