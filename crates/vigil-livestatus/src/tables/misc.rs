//! The small configuration-derived tables: groups, contacts, commands,
//! timeperiods.

use vigil_core::unix_now;

use crate::columns::Column;
use crate::row::Row;
use crate::tables::Table;
use crate::value::{ColumnType, Value};

pub fn hostgroups() -> Table {
    let columns = vec![
        Column::new("name", ColumnType::Str, "Host group name", |row, _| match row {
            Row::HostGroup(g) => Value::Str(g.name.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new("alias", ColumnType::Str, "Host group alias", |row, _| match row {
            Row::HostGroup(g) => Value::Str(g.alias.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new("members", ColumnType::List, "Member hosts", |row, _| match row {
            Row::HostGroup(g) => Value::List(g.members.clone()),
            _ => Column::empty(ColumnType::List),
        }),
        Column::new("num_members", ColumnType::Int, "Number of members", |row, _| match row {
            Row::HostGroup(g) => Value::Int(g.members.len() as i64),
            _ => Column::empty(ColumnType::Int),
        }),
    ];
    Table::new("hostgroups", columns, |state| {
        state
            .store
            .hostgroups()
            .into_iter()
            .map(Row::HostGroup)
            .collect()
    })
}

pub fn servicegroups() -> Table {
    let columns = vec![
        Column::new("name", ColumnType::Str, "Service group name", |row, _| match row {
            Row::ServiceGroup(g) => Value::Str(g.name.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new("alias", ColumnType::Str, "Service group alias", |row, _| match row {
            Row::ServiceGroup(g) => Value::Str(g.alias.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new(
            "members",
            ColumnType::List,
            "Member services as host|description",
            |row, _| match row {
                Row::ServiceGroup(g) => Value::List(
                    g.members
                        .iter()
                        .map(|(h, s)| format!("{h}|{s}"))
                        .collect(),
                ),
                _ => Column::empty(ColumnType::List),
            },
        ),
        Column::new("num_members", ColumnType::Int, "Number of members", |row, _| match row {
            Row::ServiceGroup(g) => Value::Int(g.members.len() as i64),
            _ => Column::empty(ColumnType::Int),
        }),
    ];
    Table::new("servicegroups", columns, |state| {
        state
            .store
            .servicegroups()
            .into_iter()
            .map(Row::ServiceGroup)
            .collect()
    })
}

pub fn contacts() -> Table {
    let columns = vec![
        Column::new("name", ColumnType::Str, "Contact name", |row, _| match row {
            Row::Contact(c) => Value::Str(c.name.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new("alias", ColumnType::Str, "Contact alias", |row, _| match row {
            Row::Contact(c) => Value::Str(c.alias.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new("email", ColumnType::Str, "Email address", |row, _| match row {
            Row::Contact(c) => Value::Str(c.email.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new("pager", ColumnType::Str, "Pager address", |row, _| match row {
            Row::Contact(c) => Value::Str(c.pager.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new(
            "host_notifications_enabled",
            ColumnType::Int,
            "Whether host notifications reach this contact",
            |row, _| match row {
                Row::Contact(c) => Value::Int(i64::from(c.host_notifications_enabled)),
                _ => Column::empty(ColumnType::Int),
            },
        ),
        Column::new(
            "service_notifications_enabled",
            ColumnType::Int,
            "Whether service notifications reach this contact",
            |row, _| match row {
                Row::Contact(c) => Value::Int(i64::from(c.service_notifications_enabled)),
                _ => Column::empty(ColumnType::Int),
            },
        ),
    ];
    Table::new("contacts", columns, |state| {
        state.store.contacts().into_iter().map(Row::Contact).collect()
    })
}

pub fn contactgroups() -> Table {
    let columns = vec![
        Column::new("name", ColumnType::Str, "Contact group name", |row, _| match row {
            Row::ContactGroup(g) => Value::Str(g.name.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new("alias", ColumnType::Str, "Contact group alias", |row, _| match row {
            Row::ContactGroup(g) => Value::Str(g.alias.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new("members", ColumnType::List, "Member contacts", |row, _| match row {
            Row::ContactGroup(g) => Value::List(g.members.clone()),
            _ => Column::empty(ColumnType::List),
        }),
    ];
    Table::new("contactgroups", columns, |state| {
        state
            .store
            .contactgroups()
            .into_iter()
            .map(Row::ContactGroup)
            .collect()
    })
}

pub fn commands() -> Table {
    let columns = vec![
        Column::new("name", ColumnType::Str, "Command name", |row, _| match row {
            Row::Command(c) => Value::Str(c.name.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new("line", ColumnType::Str, "Command line template", |row, _| match row {
            Row::Command(c) => Value::Str(c.command_line.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
    ];
    Table::new("commands", columns, |state| {
        state.store.commands().into_iter().map(Row::Command).collect()
    })
}

pub fn timeperiods() -> Table {
    let columns = vec![
        Column::new("name", ColumnType::Str, "Timeperiod name", |row, _| match row {
            Row::TimePeriod(t) => Value::Str(t.name.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new("alias", ColumnType::Str, "Timeperiod alias", |row, _| match row {
            Row::TimePeriod(t) => Value::Str(t.alias.clone()),
            _ => Column::empty(ColumnType::Str),
        }),
        Column::new(
            "in",
            ColumnType::Int,
            "Whether the current time lies inside the period",
            |row, _| match row {
                Row::TimePeriod(t) => Value::Int(i64::from(t.is_valid_time(unix_now()))),
                _ => Column::empty(ColumnType::Int),
            },
        ),
    ];
    Table::new("timeperiods", columns, |state| {
        state
            .store
            .timeperiods()
            .into_iter()
            .map(Row::TimePeriod)
            .collect()
    })
}
