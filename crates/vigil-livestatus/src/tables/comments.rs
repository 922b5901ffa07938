//! The `comments` table.

use vigil_core::{Comment, CommentSource};

use crate::columns::Column;
use crate::row::Row;
use crate::tables::Table;
use crate::value::{ColumnType, Value};

fn col(
    name: &'static str,
    ctype: ColumnType,
    description: &'static str,
    f: impl Fn(&Comment) -> Value + Send + Sync + 'static,
) -> Column {
    Column::new(name, ctype, description, move |row, _state| match row {
        Row::Comment(c) => f(c),
        _ => Column::empty(ctype),
    })
}

pub fn table() -> Table {
    let columns = vec![
        col("id", ColumnType::Int, "Comment id", |c| Value::Int(c.id as i64)),
        col("host_name", ColumnType::Str, "Host the comment is on", |c| {
            Value::Str(c.host_name.clone())
        }),
        col(
            "service_description",
            ColumnType::Str,
            "Service the comment is on (empty for host comments)",
            |c| Value::Str(c.service_description.clone().unwrap_or_default()),
        ),
        col("is_service", ColumnType::Int, "1 for service comments", |c| {
            Value::Int(i64::from(c.service_description.is_some()))
        }),
        col("author", ColumnType::Str, "Comment author", |c| {
            Value::Str(c.author.clone())
        }),
        col("comment", ColumnType::Str, "Comment text", |c| {
            Value::Str(c.text.clone())
        }),
        col("entry_type", ColumnType::Int, "1 user, 2 downtime, 3 flapping, 4 acknowledgement", |c| {
            Value::Int(c.entry_type.as_int())
        }),
        col("entry_time", ColumnType::Time, "When the comment was made", |c| {
            Value::Int(c.entry_time)
        }),
        col("persistent", ColumnType::Int, "Whether the comment survives restarts", |c| {
            Value::Int(i64::from(c.persistent))
        }),
        col("source", ColumnType::Int, "0 internal, 1 external", |c| {
            Value::Int(i64::from(c.source == CommentSource::External))
        }),
        col("expires", ColumnType::Int, "Whether an expiry time is set", |c| {
            Value::Int(i64::from(c.expire_time.is_some()))
        }),
        col("expire_time", ColumnType::Time, "Expiry time, 0 if none", |c| {
            Value::Int(c.expire_time.unwrap_or(0))
        }),
    ];

    Table::new("comments", columns, |state| {
        state.comments.all().into_iter().map(Row::Comment).collect()
    })
}
