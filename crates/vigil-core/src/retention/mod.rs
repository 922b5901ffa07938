//! Status and retention persistence.
//!
//! Both files share the block text format and are written atomically from
//! the scheduler loop. The status file is a write-only snapshot for
//! external consumers; the retention file is read back at startup, where it
//! supersedes configured defaults for *state* fields and re-applies
//! operator-toggled options only when the saved `modified_attributes`
//! marks them as overridden.

mod block;

pub use block::{atomic_write, parse_blocks, render_blocks, Block};

use std::path::Path;
use std::sync::atomic::Ordering;

use tracing::warn;

use crate::comments::{Comment, CommentEntryType, CommentManager, CommentSource};
use crate::downtimes::{Downtime, DowntimeManager};
use crate::error::PersistError;
use crate::objects::{
    modattr, Acknowledgement, Host, HostState, ObjectStore, ProgramState, Service, ServiceState,
    StateType,
};
use crate::unix_now;
use crate::VERSION;

// -- saving ------------------------------------------------------------------

/// Write the status snapshot.
pub fn save_status(
    path: &Path,
    store: &ObjectStore,
    comments: &CommentManager,
    downtimes: &DowntimeManager,
    globals: &ProgramState,
) -> Result<(), PersistError> {
    let mut blocks = Vec::new();

    let mut info = Block::new("info");
    info.set("created", unix_now());
    info.set("version", VERSION);
    blocks.push(info);

    blocks.push(program_block("programstatus", globals));

    for row in store.hosts() {
        blocks.push(host_block("hoststatus", &row.read()));
    }
    for row in store.services() {
        blocks.push(service_block("servicestatus", &row.read()));
    }
    for c in comments.all() {
        let name = if c.service_description.is_some() {
            "servicecomment"
        } else {
            "hostcomment"
        };
        blocks.push(comment_block(name, &c));
    }
    for d in downtimes.all() {
        let name = if d.service_description.is_some() {
            "servicedowntime"
        } else {
            "hostdowntime"
        };
        blocks.push(downtime_block(name, &d));
    }

    atomic_write(path, &render_blocks(&blocks))
}

/// Write the retention snapshot.
pub fn save_retention(
    path: &Path,
    store: &ObjectStore,
    comments: &CommentManager,
    downtimes: &DowntimeManager,
    globals: &ProgramState,
) -> Result<(), PersistError> {
    let mut blocks = Vec::new();

    let mut info = Block::new("info");
    info.set("created", unix_now());
    info.set("version", VERSION);
    blocks.push(info);

    blocks.push(program_block("program", globals));
    for row in store.hosts() {
        blocks.push(host_block("host", &row.read()));
    }
    for row in store.services() {
        blocks.push(service_block("service", &row.read()));
    }
    for c in comments.all() {
        blocks.push(comment_block("comment", &c));
    }
    for d in downtimes.all() {
        blocks.push(downtime_block("downtime", &d));
    }

    atomic_write(path, &render_blocks(&blocks))
}

fn program_block(name: &str, globals: &ProgramState) -> Block {
    let mut b = Block::new(name);
    b.set("program_start", globals.program_start);
    b.set("pid", globals.pid);
    b.set(
        "modified_attributes",
        globals.modified_attributes.load(Ordering::Relaxed),
    );
    b.set(
        "enable_notifications",
        i32::from(globals.enable_notifications.load(Ordering::Relaxed)),
    );
    b.set(
        "execute_service_checks",
        i32::from(globals.execute_service_checks.load(Ordering::Relaxed)),
    );
    b.set(
        "execute_host_checks",
        i32::from(globals.execute_host_checks.load(Ordering::Relaxed)),
    );
    b.set(
        "accept_passive_service_checks",
        i32::from(globals.accept_passive_service_checks.load(Ordering::Relaxed)),
    );
    b.set(
        "accept_passive_host_checks",
        i32::from(globals.accept_passive_host_checks.load(Ordering::Relaxed)),
    );
    b.set(
        "enable_event_handlers",
        i32::from(globals.enable_event_handlers.load(Ordering::Relaxed)),
    );
    b.set(
        "enable_flap_detection",
        i32::from(globals.enable_flap_detection.load(Ordering::Relaxed)),
    );
    b.set(
        "next_notification_id",
        globals.next_notification_id.load(Ordering::Relaxed),
    );
    b
}

fn host_block(name: &str, h: &Host) -> Block {
    let mut b = Block::new(name);
    b.set("host_name", &h.name);
    b.set("state", h.state.as_int());
    b.set("state_type", h.state_type.as_int());
    b.set("current_attempt", h.current_attempt);
    b.set("max_attempts", h.max_attempts);
    b.set("has_been_checked", i32::from(h.has_been_checked));
    b.set("last_check", h.last_check);
    b.set("next_check", h.next_check);
    b.set("last_state_change", h.last_state_change);
    b.set("last_hard_state_change", h.last_hard_state_change);
    b.set("last_time_up", h.last_time_up);
    b.set("last_time_down", h.last_time_down);
    b.set("last_time_unreachable", h.last_time_unreachable);
    b.set("plugin_output", &h.plugin_output);
    b.set("performance_data", &h.perf_data);
    b.set("latency", h.latency);
    b.set("execution_time", h.execution_time);
    b.set("problem_has_been_acknowledged", h.acknowledgement.as_int());
    b.set("notifications_enabled", i32::from(h.notifications_enabled));
    b.set("active_checks_enabled", i32::from(h.active_checks_enabled));
    b.set("passive_checks_enabled", i32::from(h.passive_checks_enabled));
    b.set("event_handler_enabled", i32::from(h.event_handler_enabled));
    b.set("flap_detection_enabled", i32::from(h.flap_detection_enabled));
    b.set("is_flapping", i32::from(h.is_flapping));
    b.set("percent_state_change", h.percent_state_change);
    b.set("scheduled_downtime_depth", h.scheduled_downtime_depth);
    b.set("pending_flex_downtime", h.pending_flex_downtime);
    b.set("notified_on", h.notified_on);
    b.set("current_notification_number", h.notification_number);
    b.set("last_notification", h.last_notification);
    b.set("next_notification", h.next_notification);
    b.set("modified_attributes", h.modified_attributes);
    b
}

fn service_block(name: &str, s: &Service) -> Block {
    let mut b = Block::new(name);
    b.set("host_name", &s.host_name);
    b.set("service_description", &s.description);
    b.set("state", s.state.as_int());
    b.set("state_type", s.state_type.as_int());
    b.set("current_attempt", s.current_attempt);
    b.set("max_attempts", s.max_attempts);
    b.set("has_been_checked", i32::from(s.has_been_checked));
    b.set("last_check", s.last_check);
    b.set("next_check", s.next_check);
    b.set("last_state_change", s.last_state_change);
    b.set("last_hard_state_change", s.last_hard_state_change);
    b.set("last_time_ok", s.last_time_ok);
    b.set("last_time_warning", s.last_time_warning);
    b.set("last_time_critical", s.last_time_critical);
    b.set("last_time_unknown", s.last_time_unknown);
    b.set("plugin_output", &s.plugin_output);
    b.set("performance_data", &s.perf_data);
    b.set("latency", s.latency);
    b.set("execution_time", s.execution_time);
    b.set("problem_has_been_acknowledged", s.acknowledgement.as_int());
    b.set("notifications_enabled", i32::from(s.notifications_enabled));
    b.set("active_checks_enabled", i32::from(s.active_checks_enabled));
    b.set("passive_checks_enabled", i32::from(s.passive_checks_enabled));
    b.set("event_handler_enabled", i32::from(s.event_handler_enabled));
    b.set("flap_detection_enabled", i32::from(s.flap_detection_enabled));
    b.set("is_flapping", i32::from(s.is_flapping));
    b.set("percent_state_change", s.percent_state_change);
    b.set("scheduled_downtime_depth", s.scheduled_downtime_depth);
    b.set("pending_flex_downtime", s.pending_flex_downtime);
    b.set("notified_on", s.notified_on);
    b.set("current_notification_number", s.notification_number);
    b.set("last_notification", s.last_notification);
    b.set("next_notification", s.next_notification);
    b.set("modified_attributes", s.modified_attributes);
    b
}

fn comment_block(name: &str, c: &Comment) -> Block {
    let mut b = Block::new(name);
    b.set("comment_id", c.id);
    b.set("host_name", &c.host_name);
    if let Some(desc) = &c.service_description {
        b.set("service_description", desc);
    }
    b.set("entry_type", c.entry_type.as_int());
    b.set("author", &c.author);
    b.set("comment_data", &c.text);
    b.set(
        "source",
        match c.source {
            CommentSource::Internal => 0,
            CommentSource::External => 1,
        },
    );
    b.set("persistent", i32::from(c.persistent));
    b.set("entry_time", c.entry_time);
    if let Some(t) = c.expire_time {
        b.set("expire_time", t);
    }
    b
}

fn downtime_block(name: &str, d: &Downtime) -> Block {
    let mut b = Block::new(name);
    b.set("downtime_id", d.id);
    b.set("host_name", &d.host_name);
    if let Some(desc) = &d.service_description {
        b.set("service_description", desc);
    }
    b.set("entry_time", d.entry_time);
    b.set("start_time", d.start_time);
    b.set("end_time", d.end_time);
    b.set("fixed", i32::from(d.fixed));
    b.set("duration", d.duration);
    b.set("triggered_by", d.triggered_by);
    b.set("in_effect", i32::from(d.in_effect));
    b.set("start_sent", i32::from(d.start_sent));
    b.set("incremented_pending", i32::from(d.incremented_pending));
    if let Some(t) = d.flex_started_at {
        b.set("flex_started_at", t);
    }
    b.set("author", &d.author);
    b.set("comment", &d.comment);
    b.set("comment_id", d.comment_id);
    b
}

// -- loading -----------------------------------------------------------------

/// Reload retained state at startup. A missing file is not an error; a
/// malformed one is (the operator should know their state went missing).
pub fn load_retention(
    path: &Path,
    store: &ObjectStore,
    comments: &CommentManager,
    downtimes: &DowntimeManager,
    globals: &ProgramState,
) -> Result<(), PersistError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(PersistError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let blocks = parse_blocks(&text, path)?;

    for block in &blocks {
        match block.name.as_str() {
            "program" => apply_program(block, globals),
            "host" => apply_host(block, store),
            "service" => apply_service(block, store),
            "comment" => {
                if let Some(c) = comment_from_block(block) {
                    comments.add_with_id(c);
                }
            }
            "downtime" => {
                if let Some(d) = downtime_from_block(block) {
                    downtimes.schedule_with_id(d);
                }
            }
            "info" => {}
            other => warn!(block = other, "unknown retention block skipped"),
        }
    }
    Ok(())
}

fn apply_program(block: &Block, globals: &ProgramState) {
    let modified = block.get_u64("modified_attributes").unwrap_or(0);
    globals
        .modified_attributes
        .store(modified, Ordering::Relaxed);
    if modified != 0 {
        let toggles: [(&str, &std::sync::atomic::AtomicBool); 7] = [
            ("enable_notifications", &globals.enable_notifications),
            ("execute_service_checks", &globals.execute_service_checks),
            ("execute_host_checks", &globals.execute_host_checks),
            (
                "accept_passive_service_checks",
                &globals.accept_passive_service_checks,
            ),
            (
                "accept_passive_host_checks",
                &globals.accept_passive_host_checks,
            ),
            ("enable_event_handlers", &globals.enable_event_handlers),
            ("enable_flap_detection", &globals.enable_flap_detection),
        ];
        for (key, field) in toggles {
            if let Some(v) = block.get_bool(key) {
                field.store(v, Ordering::Relaxed);
            }
        }
    }
    if let Some(next) = block.get_u64("next_notification_id") {
        let current = globals.next_notification_id.load(Ordering::Relaxed);
        globals
            .next_notification_id
            .store(current.max(next), Ordering::Relaxed);
    }
}

fn apply_host(block: &Block, store: &ObjectStore) {
    let Some(name) = block.get("host_name") else {
        return;
    };
    let Some(row) = store.host(name) else {
        // The object was removed from configuration; its state is gone too.
        return;
    };
    let mut guard = row.write();
    let h = &mut *guard;
    if let Some(v) = block.get_i64("state") {
        h.state = HostState::from_int(v);
    }
    if let Some(v) = block.get_i64("state_type") {
        h.state_type = if v == 0 { StateType::Soft } else { StateType::Hard };
    }
    apply_common_state(
        block,
        CommonState {
            current_attempt: &mut h.current_attempt,
            has_been_checked: &mut h.has_been_checked,
            last_check: &mut h.last_check,
            next_check: &mut h.next_check,
            last_state_change: &mut h.last_state_change,
            last_hard_state_change: &mut h.last_hard_state_change,
            plugin_output: &mut h.plugin_output,
            perf_data: &mut h.perf_data,
            acknowledgement: &mut h.acknowledgement,
            is_flapping: &mut h.is_flapping,
            percent_state_change: &mut h.percent_state_change,
            notified_on: &mut h.notified_on,
            notification_number: &mut h.notification_number,
            last_notification: &mut h.last_notification,
            next_notification: &mut h.next_notification,
            modified_attributes: &mut h.modified_attributes,
        },
    );
    if let Some(v) = block.get_i64("last_time_up") {
        h.last_time_up = v;
    }
    if let Some(v) = block.get_i64("last_time_down") {
        h.last_time_down = v;
    }
    if let Some(v) = block.get_i64("last_time_unreachable") {
        h.last_time_unreachable = v;
    }
    let modified = h.modified_attributes;
    apply_toggles(
        block,
        modified,
        [
            (
                modattr::NOTIFICATIONS_ENABLED,
                "notifications_enabled",
                &mut h.notifications_enabled,
            ),
            (
                modattr::ACTIVE_CHECKS_ENABLED,
                "active_checks_enabled",
                &mut h.active_checks_enabled,
            ),
            (
                modattr::PASSIVE_CHECKS_ENABLED,
                "passive_checks_enabled",
                &mut h.passive_checks_enabled,
            ),
            (
                modattr::EVENT_HANDLER_ENABLED,
                "event_handler_enabled",
                &mut h.event_handler_enabled,
            ),
            (
                modattr::FLAP_DETECTION_ENABLED,
                "flap_detection_enabled",
                &mut h.flap_detection_enabled,
            ),
        ],
    );
}

fn apply_service(block: &Block, store: &ObjectStore) {
    let (Some(host), Some(desc)) = (block.get("host_name"), block.get("service_description"))
    else {
        return;
    };
    let Some(row) = store.service(host, desc) else {
        return;
    };
    let mut guard = row.write();
    let s = &mut *guard;
    if let Some(v) = block.get_i64("state") {
        s.state = ServiceState::from_int(v);
    }
    if let Some(v) = block.get_i64("state_type") {
        s.state_type = if v == 0 { StateType::Soft } else { StateType::Hard };
    }
    apply_common_state(
        block,
        CommonState {
            current_attempt: &mut s.current_attempt,
            has_been_checked: &mut s.has_been_checked,
            last_check: &mut s.last_check,
            next_check: &mut s.next_check,
            last_state_change: &mut s.last_state_change,
            last_hard_state_change: &mut s.last_hard_state_change,
            plugin_output: &mut s.plugin_output,
            perf_data: &mut s.perf_data,
            acknowledgement: &mut s.acknowledgement,
            is_flapping: &mut s.is_flapping,
            percent_state_change: &mut s.percent_state_change,
            notified_on: &mut s.notified_on,
            notification_number: &mut s.notification_number,
            last_notification: &mut s.last_notification,
            next_notification: &mut s.next_notification,
            modified_attributes: &mut s.modified_attributes,
        },
    );
    if let Some(v) = block.get_i64("last_time_ok") {
        s.last_time_ok = v;
    }
    if let Some(v) = block.get_i64("last_time_warning") {
        s.last_time_warning = v;
    }
    if let Some(v) = block.get_i64("last_time_critical") {
        s.last_time_critical = v;
    }
    if let Some(v) = block.get_i64("last_time_unknown") {
        s.last_time_unknown = v;
    }
    let modified = s.modified_attributes;
    apply_toggles(
        block,
        modified,
        [
            (
                modattr::NOTIFICATIONS_ENABLED,
                "notifications_enabled",
                &mut s.notifications_enabled,
            ),
            (
                modattr::ACTIVE_CHECKS_ENABLED,
                "active_checks_enabled",
                &mut s.active_checks_enabled,
            ),
            (
                modattr::PASSIVE_CHECKS_ENABLED,
                "passive_checks_enabled",
                &mut s.passive_checks_enabled,
            ),
            (
                modattr::EVENT_HANDLER_ENABLED,
                "event_handler_enabled",
                &mut s.event_handler_enabled,
            ),
            (
                modattr::FLAP_DETECTION_ENABLED,
                "flap_detection_enabled",
                &mut s.flap_detection_enabled,
            ),
        ],
    );
}

/// State fields shared by hosts and services.
struct CommonState<'a> {
    current_attempt: &'a mut u32,
    has_been_checked: &'a mut bool,
    last_check: &'a mut i64,
    next_check: &'a mut i64,
    last_state_change: &'a mut i64,
    last_hard_state_change: &'a mut i64,
    plugin_output: &'a mut String,
    perf_data: &'a mut String,
    acknowledgement: &'a mut Acknowledgement,
    is_flapping: &'a mut bool,
    percent_state_change: &'a mut f64,
    notified_on: &'a mut u32,
    notification_number: &'a mut u32,
    last_notification: &'a mut i64,
    next_notification: &'a mut i64,
    modified_attributes: &'a mut u64,
}

fn apply_common_state(block: &Block, state: CommonState<'_>) {
    if let Some(v) = block.get_u32("current_attempt") {
        *state.current_attempt = v;
    }
    if let Some(v) = block.get_bool("has_been_checked") {
        *state.has_been_checked = v;
    }
    if let Some(v) = block.get_i64("last_check") {
        *state.last_check = v;
    }
    if let Some(v) = block.get_i64("next_check") {
        *state.next_check = v;
    }
    if let Some(v) = block.get_i64("last_state_change") {
        *state.last_state_change = v;
    }
    if let Some(v) = block.get_i64("last_hard_state_change") {
        *state.last_hard_state_change = v;
    }
    if let Some(v) = block.get("plugin_output") {
        *state.plugin_output = v.to_string();
    }
    if let Some(v) = block.get("performance_data") {
        *state.perf_data = v.to_string();
    }
    if let Some(v) = block.get_i64("problem_has_been_acknowledged") {
        *state.acknowledgement = match v {
            1 => Acknowledgement::Normal,
            2 => Acknowledgement::Sticky,
            _ => Acknowledgement::None,
        };
    }
    if let Some(v) = block.get_bool("is_flapping") {
        *state.is_flapping = v;
    }
    if let Some(v) = block.get_f64("percent_state_change") {
        *state.percent_state_change = v;
    }
    if let Some(v) = block.get_u32("notified_on") {
        *state.notified_on = v;
    }
    if let Some(v) = block.get_u32("current_notification_number") {
        *state.notification_number = v;
    }
    if let Some(v) = block.get_i64("last_notification") {
        *state.last_notification = v;
    }
    if let Some(v) = block.get_i64("next_notification") {
        *state.next_notification = v;
    }
    if let Some(v) = block.get_u64("modified_attributes") {
        *state.modified_attributes = v;
    }
}

/// Re-apply a runtime-toggleable option only when the operator had
/// overridden it (its modified-attributes bit is set).
fn apply_toggles(block: &Block, modified: u64, toggles: [(u64, &str, &mut bool); 5]) {
    for (bit, key, field) in toggles {
        if modified & bit != 0 {
            if let Some(v) = block.get_bool(key) {
                *field = v;
            }
        }
    }
}

fn comment_from_block(block: &Block) -> Option<Comment> {
    Some(Comment {
        id: block.get_u64("comment_id")?,
        host_name: block.get("host_name")?.to_string(),
        service_description: block.get("service_description").map(str::to_string),
        entry_type: CommentEntryType::from_int(block.get_i64("entry_type").unwrap_or(1)),
        author: block.get("author").unwrap_or("").to_string(),
        text: block.get("comment_data").unwrap_or("").to_string(),
        source: if block.get_i64("source") == Some(0) {
            CommentSource::Internal
        } else {
            CommentSource::External
        },
        persistent: block.get_bool("persistent").unwrap_or(false),
        entry_time: block.get_i64("entry_time").unwrap_or(0),
        expire_time: block.get_i64("expire_time"),
    })
}

fn downtime_from_block(block: &Block) -> Option<Downtime> {
    Some(Downtime {
        id: block.get_u64("downtime_id")?,
        host_name: block.get("host_name")?.to_string(),
        service_description: block.get("service_description").map(str::to_string),
        entry_time: block.get_i64("entry_time").unwrap_or(0),
        start_time: block.get_i64("start_time")?,
        end_time: block.get_i64("end_time")?,
        fixed: block.get_bool("fixed").unwrap_or(true),
        duration: block.get_i64("duration").unwrap_or(0),
        triggered_by: block.get_u64("triggered_by").unwrap_or(0),
        in_effect: block.get_bool("in_effect").unwrap_or(false),
        start_sent: block.get_bool("start_sent").unwrap_or(false),
        incremented_pending: block.get_bool("incremented_pending").unwrap_or(false),
        flex_started_at: block.get_i64("flex_started_at"),
        author: block.get("author").unwrap_or("").to_string(),
        comment: block.get("comment").unwrap_or("").to_string(),
        comment_id: block.get_u64("comment_id").unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::test_support::small_config;
    use crate::logfile::MonitorLog;
    use crate::notifier::test_support::RecordingNotifier;

    struct World {
        store: Arc<ObjectStore>,
        comments: Arc<CommentManager>,
        downtimes: Arc<DowntimeManager>,
        globals: Arc<ProgramState>,
    }

    fn world() -> World {
        let cfg = small_config();
        let store = Arc::new(ObjectStore::from_config(&cfg).unwrap());
        let comments = Arc::new(CommentManager::new());
        let downtimes = Arc::new(DowntimeManager::new(
            Arc::clone(&store),
            Arc::clone(&comments),
            Arc::new(MonitorLog::sink()),
            RecordingNotifier::new(),
        ));
        let globals = Arc::new(ProgramState::new(&cfg.daemon, 500));
        World {
            store,
            comments,
            downtimes,
            globals,
        }
    }

    #[test]
    fn test_retention_round_trip_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retention.dat");

        let w = world();
        {
            let row = w.store.service("web1", "http").unwrap();
            let mut s = row.write();
            s.state = ServiceState::Critical;
            s.state_type = StateType::Hard;
            s.current_attempt = 3;
            s.has_been_checked = true;
            s.last_check = 12_345;
            s.plugin_output = "Connection refused".into();
            s.acknowledgement = Acknowledgement::Sticky;
            s.notified_on = 4;
            s.notification_number = 2;
        }
        w.comments.add(Comment {
            id: 0,
            host_name: "web1".into(),
            service_description: Some("http".into()),
            entry_type: CommentEntryType::Acknowledgement,
            author: "ops".into(),
            text: "known".into(),
            source: CommentSource::External,
            persistent: true,
            entry_time: 11,
            expire_time: None,
        });
        w.downtimes.schedule(Downtime::new(
            "db1", None, 100, 100_000_000_000, true, 0, 0, "ops", "window",
        ));

        save_retention(&path, &w.store, &w.comments, &w.downtimes, &w.globals).unwrap();

        // Fresh world, as after a restart.
        let w2 = world();
        load_retention(&path, &w2.store, &w2.comments, &w2.downtimes, &w2.globals).unwrap();

        let s = w2.store.service("web1", "http").unwrap().read().clone();
        assert_eq!(s.state, ServiceState::Critical);
        assert_eq!(s.state_type, StateType::Hard);
        assert_eq!(s.current_attempt, 3);
        assert_eq!(s.last_check, 12_345);
        assert_eq!(s.plugin_output, "Connection refused");
        assert_eq!(s.acknowledgement, Acknowledgement::Sticky);
        assert_eq!(s.notified_on, 4);

        assert_eq!(w2.comments.len(), 2, "user comment + downtime comment");
        assert_eq!(w2.downtimes.len(), 1);
        // Seeds moved past the loaded ids.
        assert!(w2.comments.next_id() > 2);
    }

    #[test]
    fn test_toggles_only_restore_when_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retention.dat");

        let w = world();
        {
            // Operator disabled checks on one service (modattr set), and the
            // other service's flag changed without the bit (simulating a
            // config default change across restart).
            let row = w.store.service("web1", "http").unwrap();
            let mut s = row.write();
            s.active_checks_enabled = false;
            s.modified_attributes |= modattr::ACTIVE_CHECKS_ENABLED;
        }
        {
            let row = w.store.service("web1", "ssh").unwrap();
            row.write().active_checks_enabled = false;
        }
        save_retention(&path, &w.store, &w.comments, &w.downtimes, &w.globals).unwrap();

        let w2 = world();
        load_retention(&path, &w2.store, &w2.comments, &w2.downtimes, &w2.globals).unwrap();
        assert!(
            !w2.store.service("web1", "http").unwrap().read().active_checks_enabled,
            "operator override restored"
        );
        assert!(
            w2.store.service("web1", "ssh").unwrap().read().active_checks_enabled,
            "unmodified toggle keeps the configured default"
        );
    }

    #[test]
    fn test_missing_file_is_fine() {
        let w = world();
        load_retention(
            Path::new("/nonexistent/retention.dat"),
            &w.store,
            &w.comments,
            &w.downtimes,
            &w.globals,
        )
        .unwrap();
    }

    #[test]
    fn test_retained_downtime_in_effect_restores_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retention.dat");

        let w = world();
        let id = w.downtimes.schedule(Downtime::new(
            "web1", None, 100, 100_000_000_000, true, 0, 0, "ops", "window",
        ));
        w.downtimes.handle_start(id);
        save_retention(&path, &w.store, &w.comments, &w.downtimes, &w.globals).unwrap();

        let w2 = world();
        load_retention(&path, &w2.store, &w2.comments, &w2.downtimes, &w2.globals).unwrap();
        // Depth is rebuilt from the restored downtime's in_effect flag, not
        // copied from the host block, so it cannot double-count.
        let depth = w2
            .store
            .host("web1")
            .unwrap()
            .read()
            .scheduled_downtime_depth;
        assert_eq!(depth, 1);
    }
}
