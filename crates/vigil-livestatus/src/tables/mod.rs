//! The table registry: every queryable table, its columns, and its row
//! source.

mod comments;
mod downtimes;
mod hosts;
mod log;
mod misc;
mod services;
mod status;

use std::collections::HashMap;
use std::sync::Arc;

use crate::columns::Column;
use crate::row::{ColumnMetaRow, Row};
use crate::state::LivestatusState;
use crate::value::{ColumnType, Value};

type RowSource = Box<dyn Fn(&LivestatusState) -> Vec<Row> + Send + Sync>;

/// One queryable table.
pub struct Table {
    pub name: &'static str,
    columns: Vec<Column>,
    get_rows: RowSource,
}

impl Table {
    pub fn new(
        name: &'static str,
        columns: Vec<Column>,
        get_rows: impl Fn(&LivestatusState) -> Vec<Row> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            columns,
            get_rows: Box::new(get_rows),
        }
    }

    /// Snapshot this table's rows. The store lock is held only inside the
    /// row source while handles are cloned.
    pub fn rows(&self, state: &LivestatusState) -> Vec<Row> {
        (self.get_rows)(state)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// All tables by name.
pub struct TableRegistry {
    tables: HashMap<&'static str, Table>,
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRegistry {
    pub fn new() -> Self {
        let mut tables = HashMap::new();
        for table in [
            hosts::table(),
            services::table(),
            misc::hostgroups(),
            misc::servicegroups(),
            misc::contacts(),
            misc::contactgroups(),
            misc::commands(),
            misc::timeperiods(),
            status::table(),
            comments::table(),
            downtimes::table(),
            log::table(),
        ] {
            tables.insert(table.name, table);
        }

        // The columns meta-table enumerates everything registered above.
        let mut meta: Vec<Arc<ColumnMetaRow>> = Vec::new();
        let mut names: Vec<&&'static str> = tables.keys().collect();
        names.sort();
        for name in names {
            let table = &tables[*name];
            for column in table.columns() {
                meta.push(Arc::new(ColumnMetaRow {
                    table: table.name,
                    name: column.name,
                    ctype: column.ctype,
                    description: column.description,
                }));
            }
        }
        let columns_table = Table::new(
            "columns",
            vec![
                meta_col("table", ColumnType::Str, "Table the column belongs to", |m| {
                    Value::Str(m.table.to_string())
                }),
                meta_col("name", ColumnType::Str, "Column name", |m| {
                    Value::Str(m.name.to_string())
                }),
                meta_col("type", ColumnType::Str, "Column data type", |m| {
                    Value::Str(m.ctype.name().to_string())
                }),
                meta_col("description", ColumnType::Str, "Column description", |m| {
                    Value::Str(m.description.to_string())
                }),
            ],
            move |_state| meta.iter().cloned().map(Row::ColumnMeta).collect(),
        );
        tables.insert(columns_table.name, columns_table);

        Self { tables }
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.tables.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

fn meta_col(
    name: &'static str,
    ctype: ColumnType,
    description: &'static str,
    f: impl Fn(&ColumnMetaRow) -> Value + Send + Sync + 'static,
) -> Column {
    Column::new(name, ctype, description, move |row, _state| match row {
        Row::ColumnMeta(m) => f(m),
        _ => Column::empty(ctype),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_all_required_tables() {
        let registry = TableRegistry::new();
        for name in [
            "hosts",
            "services",
            "hostgroups",
            "servicegroups",
            "contacts",
            "contactgroups",
            "commands",
            "timeperiods",
            "status",
            "columns",
            "comments",
            "downtimes",
            "log",
        ] {
            assert!(registry.get(name).is_some(), "missing table {name}");
        }
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_hosts_table_columns() {
        let registry = TableRegistry::new();
        let hosts = registry.get("hosts").unwrap();
        for col in ["name", "state", "plugin_output", "scheduled_downtime_depth"] {
            assert!(hosts.column(col).is_some(), "missing column {col}");
        }
        assert!(hosts.column("bogus").is_none());
    }
}
