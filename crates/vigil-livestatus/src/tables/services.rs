//! The `services` table.

use vigil_core::Service;

use crate::columns::Column;
use crate::row::Row;
use crate::state::LivestatusState;
use crate::tables::Table;
use crate::value::{ColumnType, Value};

fn col(
    name: &'static str,
    ctype: ColumnType,
    description: &'static str,
    f: impl Fn(&Service, &LivestatusState) -> Value + Send + Sync + 'static,
) -> Column {
    Column::new(name, ctype, description, move |row, state| match row {
        Row::Service(s) => f(&s.read(), state),
        _ => Column::empty(ctype),
    })
}

#[allow(clippy::too_many_lines)]
pub fn table() -> Table {
    let columns = vec![
        col("host_name", ColumnType::Str, "Owning host", |s, _| {
            Value::Str(s.host_name.clone())
        }),
        col("description", ColumnType::Str, "Service description", |s, _| {
            Value::Str(s.description.clone())
        }),
        col("display_name", ColumnType::Str, "Display name", |s, _| {
            Value::Str(s.description.clone())
        }),
        col("state", ColumnType::Int, "Current state (0 OK, 1 WARNING, 2 CRITICAL, 3 UNKNOWN)", |s, _| {
            Value::Int(s.state.as_int())
        }),
        col("state_type", ColumnType::Int, "State type (0 soft, 1 hard)", |s, _| {
            Value::Int(s.state_type.as_int())
        }),
        col("current_attempt", ColumnType::Int, "Current check attempt", |s, _| {
            Value::Int(i64::from(s.current_attempt))
        }),
        col("max_check_attempts", ColumnType::Int, "Attempts before a hard state", |s, _| {
            Value::Int(i64::from(s.max_attempts))
        }),
        col("has_been_checked", ColumnType::Int, "Whether a result has arrived", |s, _| {
            Value::Int(i64::from(s.has_been_checked))
        }),
        col("last_check", ColumnType::Time, "Time of last check", |s, _| {
            Value::Int(s.last_check)
        }),
        col("next_check", ColumnType::Time, "Time of next scheduled check", |s, _| {
            Value::Int(s.next_check)
        }),
        col("last_state_change", ColumnType::Time, "Time of last state change", |s, _| {
            Value::Int(s.last_state_change)
        }),
        col("last_hard_state_change", ColumnType::Time, "Time of last hard state change", |s, _| {
            Value::Int(s.last_hard_state_change)
        }),
        col("last_time_ok", ColumnType::Time, "Last time the service was OK", |s, _| {
            Value::Int(s.last_time_ok)
        }),
        col("last_time_warning", ColumnType::Time, "Last time the service was WARNING", |s, _| {
            Value::Int(s.last_time_warning)
        }),
        col("last_time_critical", ColumnType::Time, "Last time the service was CRITICAL", |s, _| {
            Value::Int(s.last_time_critical)
        }),
        col("last_time_unknown", ColumnType::Time, "Last time the service was UNKNOWN", |s, _| {
            Value::Int(s.last_time_unknown)
        }),
        col("plugin_output", ColumnType::Str, "Output of the last check", |s, _| {
            Value::Str(s.plugin_output.clone())
        }),
        col("perf_data", ColumnType::Str, "Performance data of the last check", |s, _| {
            Value::Str(s.perf_data.clone())
        }),
        col("latency", ColumnType::Float, "Check latency in seconds", |s, _| {
            Value::Float(s.latency)
        }),
        col("execution_time", ColumnType::Float, "Check runtime in seconds", |s, _| {
            Value::Float(s.execution_time)
        }),
        col("acknowledged", ColumnType::Int, "Whether the problem is acknowledged", |s, _| {
            Value::Int(i64::from(s.acknowledgement.is_acknowledged()))
        }),
        col("acknowledgement_type", ColumnType::Int, "0 none, 1 normal, 2 sticky", |s, _| {
            Value::Int(s.acknowledgement.as_int())
        }),
        col("notifications_enabled", ColumnType::Int, "Whether notifications are enabled", |s, _| {
            Value::Int(i64::from(s.notifications_enabled))
        }),
        col("active_checks_enabled", ColumnType::Int, "Whether active checks are enabled", |s, _| {
            Value::Int(i64::from(s.active_checks_enabled))
        }),
        col("accept_passive_checks", ColumnType::Int, "Whether passive checks are accepted", |s, _| {
            Value::Int(i64::from(s.passive_checks_enabled))
        }),
        col("event_handler_enabled", ColumnType::Int, "Whether the event handler is enabled", |s, _| {
            Value::Int(i64::from(s.event_handler_enabled))
        }),
        col("flap_detection_enabled", ColumnType::Int, "Whether flap detection is enabled", |s, _| {
            Value::Int(i64::from(s.flap_detection_enabled))
        }),
        col("is_flapping", ColumnType::Int, "Whether the service is flapping", |s, _| {
            Value::Int(i64::from(s.is_flapping))
        }),
        col("percent_state_change", ColumnType::Float, "Flap-detection state change percent", |s, _| {
            Value::Float(s.percent_state_change)
        }),
        col("scheduled_downtime_depth", ColumnType::Int, "Number of active downtimes", |s, _| {
            Value::Int(i64::from(s.scheduled_downtime_depth))
        }),
        col("pending_flex_downtime", ColumnType::Int, "Waiting flexible downtimes", |s, _| {
            Value::Int(i64::from(s.pending_flex_downtime))
        }),
        col("current_notification_number", ColumnType::Int, "Notification number of the current problem", |s, _| {
            Value::Int(i64::from(s.notification_number))
        }),
        col("last_notification", ColumnType::Time, "Time of last notification", |s, _| {
            Value::Int(s.last_notification)
        }),
        col("next_notification", ColumnType::Time, "Earliest time of the next re-notification", |s, _| {
            Value::Int(s.next_notification)
        }),
        col("check_command", ColumnType::Str, "Configured check command", |s, _| {
            Value::Str(s.check_command.clone())
        }),
        col("check_interval", ColumnType::Float, "Check interval in interval units", |s, _| {
            Value::Float(s.check_interval)
        }),
        col("retry_interval", ColumnType::Float, "Retry interval in interval units", |s, _| {
            Value::Float(s.retry_interval)
        }),
        col("check_period", ColumnType::Str, "Timeperiod admitting checks", |s, _| {
            Value::Str(s.check_period.clone())
        }),
        col("notification_period", ColumnType::Str, "Timeperiod admitting notifications", |s, _| {
            Value::Str(s.notification_period.clone())
        }),
        col("notification_interval", ColumnType::Float, "Re-notification interval", |s, _| {
            Value::Float(s.notification_interval)
        }),
        col("notes", ColumnType::Str, "Free-form notes", |s, _| {
            Value::Str(s.notes.clone())
        }),
        col("groups", ColumnType::List, "Service groups this service belongs to", |s, _| {
            Value::List(s.groups.clone())
        }),
        col("contacts", ColumnType::List, "Contacts for this service", |s, _| {
            Value::List(s.contacts.clone())
        }),
        col("contact_groups", ColumnType::List, "Contact groups for this service", |s, _| {
            Value::List(s.contact_groups.clone())
        }),
        col("comments", ColumnType::List, "Ids of comments on this service", |s, state| {
            Value::List(state.service_comment_ids(&s.host_name, &s.description))
        }),
        col("downtimes", ColumnType::List, "Ids of downtimes on this service", |s, state| {
            Value::List(state.service_downtime_ids(&s.host_name, &s.description))
        }),
        col("modified_attributes", ColumnType::Int, "Mask of operator-overridden options", |s, _| {
            Value::Int(s.modified_attributes as i64)
        }),
        // Cross-entity host columns, resolved through the provider.
        col("host_state", ColumnType::Int, "Current state of the owning host", |s, state| {
            state
                .store
                .host(&s.host_name)
                .map_or(Value::Int(0), |h| Value::Int(h.read().state.as_int()))
        }),
        col("host_address", ColumnType::Str, "Address of the owning host", |s, state| {
            state
                .store
                .host(&s.host_name)
                .map_or_else(|| Value::Str(String::new()), |h| Value::Str(h.read().address.clone()))
        }),
        col("host_alias", ColumnType::Str, "Alias of the owning host", |s, state| {
            state
                .store
                .host(&s.host_name)
                .map_or_else(|| Value::Str(String::new()), |h| Value::Str(h.read().alias.clone()))
        }),
    ];

    Table::new("services", columns, |state| {
        state.store.services().into_iter().map(Row::Service).collect()
    })
}
