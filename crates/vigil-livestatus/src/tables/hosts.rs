//! The `hosts` table.

use vigil_core::Host;

use crate::columns::Column;
use crate::row::Row;
use crate::state::LivestatusState;
use crate::tables::Table;
use crate::value::{ColumnType, Value};

/// A column reading host fields through the row lock.
fn col(
    name: &'static str,
    ctype: ColumnType,
    description: &'static str,
    f: impl Fn(&Host, &LivestatusState) -> Value + Send + Sync + 'static,
) -> Column {
    Column::new(name, ctype, description, move |row, state| match row {
        Row::Host(h) => f(&h.read(), state),
        _ => Column::empty(ctype),
    })
}

#[allow(clippy::too_many_lines)]
pub fn table() -> Table {
    let columns = vec![
        col("name", ColumnType::Str, "Host name", |h, _| {
            Value::Str(h.name.clone())
        }),
        col("alias", ColumnType::Str, "Host alias", |h, _| {
            Value::Str(h.alias.clone())
        }),
        col("address", ColumnType::Str, "IP address", |h, _| {
            Value::Str(h.address.clone())
        }),
        col("state", ColumnType::Int, "Current state (0 UP, 1 DOWN, 2 UNREACHABLE)", |h, _| {
            Value::Int(h.state.as_int())
        }),
        col("state_type", ColumnType::Int, "State type (0 soft, 1 hard)", |h, _| {
            Value::Int(h.state_type.as_int())
        }),
        col("current_attempt", ColumnType::Int, "Current check attempt", |h, _| {
            Value::Int(i64::from(h.current_attempt))
        }),
        col("max_check_attempts", ColumnType::Int, "Attempts before a hard state", |h, _| {
            Value::Int(i64::from(h.max_attempts))
        }),
        col("has_been_checked", ColumnType::Int, "Whether a result has arrived", |h, _| {
            Value::Int(i64::from(h.has_been_checked))
        }),
        col("last_check", ColumnType::Time, "Time of last check", |h, _| {
            Value::Int(h.last_check)
        }),
        col("next_check", ColumnType::Time, "Time of next scheduled check", |h, _| {
            Value::Int(h.next_check)
        }),
        col("last_state_change", ColumnType::Time, "Time of last state change", |h, _| {
            Value::Int(h.last_state_change)
        }),
        col("last_hard_state_change", ColumnType::Time, "Time of last hard state change", |h, _| {
            Value::Int(h.last_hard_state_change)
        }),
        col("last_time_up", ColumnType::Time, "Last time the host was UP", |h, _| {
            Value::Int(h.last_time_up)
        }),
        col("last_time_down", ColumnType::Time, "Last time the host was DOWN", |h, _| {
            Value::Int(h.last_time_down)
        }),
        col("last_time_unreachable", ColumnType::Time, "Last time the host was UNREACHABLE", |h, _| {
            Value::Int(h.last_time_unreachable)
        }),
        col("plugin_output", ColumnType::Str, "Output of the last check", |h, _| {
            Value::Str(h.plugin_output.clone())
        }),
        col("perf_data", ColumnType::Str, "Performance data of the last check", |h, _| {
            Value::Str(h.perf_data.clone())
        }),
        col("latency", ColumnType::Float, "Check latency in seconds", |h, _| {
            Value::Float(h.latency)
        }),
        col("execution_time", ColumnType::Float, "Check runtime in seconds", |h, _| {
            Value::Float(h.execution_time)
        }),
        col("acknowledged", ColumnType::Int, "Whether the problem is acknowledged", |h, _| {
            Value::Int(i64::from(h.acknowledgement.is_acknowledged()))
        }),
        col("acknowledgement_type", ColumnType::Int, "0 none, 1 normal, 2 sticky", |h, _| {
            Value::Int(h.acknowledgement.as_int())
        }),
        col("notifications_enabled", ColumnType::Int, "Whether notifications are enabled", |h, _| {
            Value::Int(i64::from(h.notifications_enabled))
        }),
        col("active_checks_enabled", ColumnType::Int, "Whether active checks are enabled", |h, _| {
            Value::Int(i64::from(h.active_checks_enabled))
        }),
        col("accept_passive_checks", ColumnType::Int, "Whether passive checks are accepted", |h, _| {
            Value::Int(i64::from(h.passive_checks_enabled))
        }),
        col("event_handler_enabled", ColumnType::Int, "Whether the event handler is enabled", |h, _| {
            Value::Int(i64::from(h.event_handler_enabled))
        }),
        col("flap_detection_enabled", ColumnType::Int, "Whether flap detection is enabled", |h, _| {
            Value::Int(i64::from(h.flap_detection_enabled))
        }),
        col("is_flapping", ColumnType::Int, "Whether the host is flapping", |h, _| {
            Value::Int(i64::from(h.is_flapping))
        }),
        col("percent_state_change", ColumnType::Float, "Flap-detection state change percent", |h, _| {
            Value::Float(h.percent_state_change)
        }),
        col("scheduled_downtime_depth", ColumnType::Int, "Number of active downtimes", |h, _| {
            Value::Int(i64::from(h.scheduled_downtime_depth))
        }),
        col("pending_flex_downtime", ColumnType::Int, "Waiting flexible downtimes", |h, _| {
            Value::Int(i64::from(h.pending_flex_downtime))
        }),
        col("current_notification_number", ColumnType::Int, "Notification number of the current problem", |h, _| {
            Value::Int(i64::from(h.notification_number))
        }),
        col("last_notification", ColumnType::Time, "Time of last notification", |h, _| {
            Value::Int(h.last_notification)
        }),
        col("next_notification", ColumnType::Time, "Earliest time of the next re-notification", |h, _| {
            Value::Int(h.next_notification)
        }),
        col("check_command", ColumnType::Str, "Configured check command", |h, _| {
            Value::Str(h.check_command.clone())
        }),
        col("check_interval", ColumnType::Float, "Check interval in interval units", |h, _| {
            Value::Float(h.check_interval)
        }),
        col("retry_interval", ColumnType::Float, "Retry interval in interval units", |h, _| {
            Value::Float(h.retry_interval)
        }),
        col("check_period", ColumnType::Str, "Timeperiod admitting checks", |h, _| {
            Value::Str(h.check_period.clone())
        }),
        col("notification_period", ColumnType::Str, "Timeperiod admitting notifications", |h, _| {
            Value::Str(h.notification_period.clone())
        }),
        col("notification_interval", ColumnType::Float, "Re-notification interval", |h, _| {
            Value::Float(h.notification_interval)
        }),
        col("notes", ColumnType::Str, "Free-form notes", |h, _| {
            Value::Str(h.notes.clone())
        }),
        col("parents", ColumnType::List, "Direct parent hosts", |h, _| {
            Value::List(h.parents.clone())
        }),
        col("childs", ColumnType::List, "Direct child hosts", |h, _| {
            Value::List(h.children.clone())
        }),
        col("groups", ColumnType::List, "Host groups this host belongs to", |h, _| {
            Value::List(h.groups.clone())
        }),
        col("contacts", ColumnType::List, "Contacts for this host", |h, _| {
            Value::List(h.contacts.clone())
        }),
        col("contact_groups", ColumnType::List, "Contact groups for this host", |h, _| {
            Value::List(h.contact_groups.clone())
        }),
        col("services", ColumnType::List, "Services bound to this host", |h, _| {
            Value::List(h.services.clone())
        }),
        col("num_services", ColumnType::Int, "Number of services", |h, _| {
            Value::Int(h.services.len() as i64)
        }),
        col("comments", ColumnType::List, "Ids of comments on this host", |h, state| {
            Value::List(state.host_comment_ids(&h.name))
        }),
        col("downtimes", ColumnType::List, "Ids of downtimes on this host", |h, state| {
            Value::List(state.host_downtime_ids(&h.name))
        }),
        col("modified_attributes", ColumnType::Int, "Mask of operator-overridden options", |h, _| {
            Value::Int(h.modified_attributes as i64)
        }),
    ];

    Table::new("hosts", columns, |state| {
        state.store.hosts().into_iter().map(Row::Host).collect()
    })
}
