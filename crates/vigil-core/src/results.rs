//! The result-to-state machine.
//!
//! Converts a raw [`CheckResult`] into state, attempt, flap and
//! notification updates on its target, entirely on the scheduler loop. Row
//! write locks are held only while fields change; log lines and
//! notifications collected during the transition are emitted after the
//! lock drops.

use std::sync::Arc;

use tracing::debug;

use crate::comments::{CommentEntryType, CommentManager};
use crate::downtimes::DowntimeManager;
use crate::logfile::MonitorLog;
use crate::notifier::{NotificationType, Notifier};
use crate::objects::{
    Acknowledgement, HostState, ObjectStore, ProgramState, ServiceState, StateType,
};
use crate::scheduler::{Event, EventKind};
use crate::unix_now;

/// Active results come from the scheduler's runner; passive ones arrive via
/// the external-command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckType {
    Active,
    Passive,
}

impl CheckType {
    pub const fn as_int(self) -> i64 {
        match self {
            Self::Active => 0,
            Self::Passive => 1,
        }
    }
}

/// A completed check, as delivered by a [`crate::runner::CheckRunner`] or a
/// passive-result command.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub host_name: String,
    /// `None` for host checks.
    pub service_description: Option<String>,
    pub return_code: i32,
    pub output: String,
    pub check_type: CheckType,
    /// False when the check process died abnormally; the result is then
    /// synthesized rather than trusted.
    pub exited_ok: bool,
    pub start_time: i64,
    pub finish_time: i64,
    pub latency: f64,
}

/// Tunables the handler needs from the daemon configuration.
#[derive(Debug, Clone)]
pub struct ResultPolicy {
    pub interval_length: u32,
    pub use_aggressive_host_checking: bool,
}

/// Applies check results to the object graph.
pub struct ResultHandler {
    store: Arc<ObjectStore>,
    comments: Arc<CommentManager>,
    downtimes: Arc<DowntimeManager>,
    globals: Arc<ProgramState>,
    log: Arc<MonitorLog>,
    notifier: Arc<dyn Notifier>,
    policy: ResultPolicy,
}

/// Side effects collected while a row lock is held, emitted afterwards.
#[derive(Default)]
struct Effects {
    log_lines: Vec<String>,
    notifications: Vec<NotificationType>,
    clear_ack_comments: bool,
    flap_comment: Option<FlapComment>,
}

enum FlapComment {
    Add(String),
    Remove,
}

impl ResultHandler {
    pub fn new(
        store: Arc<ObjectStore>,
        comments: Arc<CommentManager>,
        downtimes: Arc<DowntimeManager>,
        globals: Arc<ProgramState>,
        log: Arc<MonitorLog>,
        notifier: Arc<dyn Notifier>,
        policy: ResultPolicy,
    ) -> Self {
        Self {
            store,
            comments,
            downtimes,
            globals,
            log,
            notifier,
            policy,
        }
    }

    /// Apply one result. Returns the reschedule event for the target's next
    /// active check, or `None` when the result was dropped (stale duplicate,
    /// refused passive result, unknown target).
    pub fn handle(&self, result: &CheckResult) -> Option<Event> {
        match &result.service_description {
            Some(desc) => self.handle_service(result, desc),
            None => self.handle_host(result),
        }
    }

    // -- services ------------------------------------------------------------

    fn handle_service(&self, result: &CheckResult, desc: &str) -> Option<Event> {
        use std::sync::atomic::Ordering;

        if result.check_type == CheckType::Active {
            // Release the concurrency gate slot taken at dispatch.
            let _ = self.globals.running_service_checks.fetch_update(
                Ordering::Relaxed,
                Ordering::Relaxed,
                |v| v.checked_sub(1),
            );
        }

        let row = match self.store.service(&result.host_name, desc) {
            Some(row) => row,
            None => {
                debug!(host = %result.host_name, service = %desc, "result for unknown service dropped");
                return None;
            }
        };

        if result.check_type == CheckType::Passive {
            if !self
                .globals
                .accept_passive_service_checks
                .load(Ordering::Relaxed)
                || !row.read().passive_checks_enabled
            {
                debug!(host = %result.host_name, service = %desc, "passive result refused");
                return None;
            }
            self.log.log(&format!(
                "PASSIVE SERVICE CHECK: {};{desc};{};{}",
                result.host_name, result.return_code, result.output
            ));
        }

        let now = unix_now();
        let period_ok = {
            let period = row.read().notification_period.clone();
            self.store.time_is_valid(&period, now)
        };

        let mut effects = Effects::default();
        let (reschedule, new_state) = {
            let mut s = row.write();

            // Stale-result guard: a result that started before the recorded
            // last check is a duplicate or an overlap; applying it again
            // must be a no-op.
            if s.has_been_checked && result.start_time <= s.last_check {
                debug!(host = %s.host_name, service = %s.description, "stale result skipped");
                return None;
            }

            let new_state = if result.exited_ok {
                ServiceState::from_return_code(result.return_code)
            } else {
                s.plugin_output = format!(
                    "(Check did not exit cleanly: {})",
                    first_line(&result.output)
                );
                ServiceState::Unknown
            };

            self.apply_service_result(&mut s, result, new_state, now, period_ok, &mut effects);

            let interval = if s.state_type == StateType::Hard {
                s.check_interval
            } else {
                s.retry_interval
            };
            s.next_check = now + (interval * f64::from(self.policy.interval_length)) as i64;
            (
                Event::at(
                    s.next_check,
                    EventKind::ServiceCheck {
                        host_name:   s.host_name.clone(),
                        description: s.description.clone(),
                        options:     0,
                    },
                ),
                new_state,
            )
        };

        self.emit_service_effects(&row, &effects);
        self.downtimes
            .check_pending_flex_service(&result.host_name, desc, new_state);
        self.globals
            .checks_run
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Some(reschedule)
    }

    #[allow(clippy::too_many_lines)]
    fn apply_service_result(
        &self,
        s: &mut crate::objects::Service,
        result: &CheckResult,
        new_state: ServiceState,
        now: i64,
        period_ok: bool,
        effects: &mut Effects,
    ) {
        let old_state = s.state;
        let old_type = s.state_type;

        s.latency = result.latency;
        s.execution_time = (result.finish_time - result.start_time).max(0) as f64;
        s.last_check = result.finish_time;
        s.has_been_checked = true;
        if result.exited_ok {
            let (output, perf) = split_output(&result.output);
            s.plugin_output = output;
            s.perf_data = perf;
        }

        if new_state == ServiceState::Ok {
            if old_state != ServiceState::Ok {
                s.state = ServiceState::Ok;
                s.last_state_change = now;
                s.current_attempt = 1;
                effects.log_lines.push(service_alert(s));
                if old_type == StateType::Hard {
                    s.state_type = StateType::Hard;
                    s.last_hard_state_change = now;
                    if self.service_notification_viable(s, NotificationType::Recovery, now, period_ok)
                    {
                        effects.notifications.push(NotificationType::Recovery);
                    }
                    s.reset_notifications();
                } else {
                    // Soft recovery: the problem never confirmed.
                    s.state_type = StateType::Hard;
                }
                if s.acknowledgement.is_acknowledged() {
                    s.acknowledgement = Acknowledgement::None;
                    effects.clear_ack_comments = true;
                }
            } else {
                s.current_attempt = 1;
                s.state_type = StateType::Hard;
            }
        } else if old_state == ServiceState::Ok {
            // First failure after OK.
            s.state = new_state;
            s.last_state_change = now;
            s.current_attempt = 1;
            if s.max_attempts == 1 {
                s.state_type = StateType::Hard;
                s.last_hard_state_change = now;
                effects.log_lines.push(service_alert(s));
                if self.service_notification_viable(s, NotificationType::Problem, now, period_ok) {
                    effects.notifications.push(NotificationType::Problem);
                    self.mark_service_notified(s, now);
                }
            } else {
                s.state_type = StateType::Soft;
                effects.log_lines.push(service_alert(s));
            }
        } else if new_state == old_state {
            if old_type == StateType::Soft {
                s.current_attempt += 1;
                if s.current_attempt >= s.max_attempts {
                    s.state_type = StateType::Hard;
                    s.last_hard_state_change = now;
                    effects.log_lines.push(service_alert(s));
                    if self.service_notification_viable(s, NotificationType::Problem, now, period_ok)
                    {
                        effects.notifications.push(NotificationType::Problem);
                        self.mark_service_notified(s, now);
                    }
                } else {
                    effects.log_lines.push(service_alert(s));
                }
            } else {
                // Hard state persisting: attempts do not re-increment; only
                // the escalation timer can produce another notification.
                if self.service_notification_viable(s, NotificationType::Problem, now, period_ok) {
                    effects.notifications.push(NotificationType::Problem);
                    self.mark_service_notified(s, now);
                }
            }
        } else {
            // Different non-OK state.
            s.state = new_state;
            s.last_state_change = now;
            if old_type == StateType::Soft {
                s.current_attempt = 1;
                effects.log_lines.push(service_alert(s));
            } else {
                s.current_attempt = 1;
                s.last_hard_state_change = now;
                effects.log_lines.push(service_alert(s));
                if self.service_notification_viable(s, NotificationType::Problem, now, period_ok) {
                    effects.notifications.push(NotificationType::Problem);
                    self.mark_service_notified(s, now);
                }
            }
            if s.acknowledgement == Acknowledgement::Normal {
                s.acknowledgement = Acknowledgement::None;
                effects.clear_ack_comments = true;
            }
        }

        s.touch_state_time(now);
        self.update_service_flap(s, effects);
    }

    fn update_service_flap(&self, s: &mut crate::objects::Service, effects: &mut Effects) {
        s.flap_history.push(s.state.as_int());
        s.percent_state_change = s.flap_history.percent_state_change();

        let detection_on = self.globals.flap_detection_enabled() && s.flap_detection_enabled;
        if !detection_on {
            if s.is_flapping {
                s.is_flapping = false;
                effects.flap_comment = Some(FlapComment::Remove);
            }
            return;
        }

        if !s.is_flapping && s.percent_state_change >= s.high_flap_threshold {
            s.is_flapping = true;
            effects.log_lines.push(format!(
                "SERVICE FLAPPING ALERT: {};{};STARTED; Service appears to have started flapping ({:.1}% change >= {:.1}% threshold)",
                s.host_name, s.description, s.percent_state_change, s.high_flap_threshold
            ));
            effects.flap_comment = Some(FlapComment::Add(format!(
                "Notifications for this service are being suppressed because it was detected as being flapping ({:.1}% change).",
                s.percent_state_change
            )));
            effects.notifications.push(NotificationType::FlapStart);
        } else if s.is_flapping && s.percent_state_change < s.low_flap_threshold {
            s.is_flapping = false;
            effects.log_lines.push(format!(
                "SERVICE FLAPPING ALERT: {};{};STOPPED; Service appears to have stopped flapping ({:.1}% change < {:.1}% threshold)",
                s.host_name, s.description, s.percent_state_change, s.low_flap_threshold
            ));
            effects.flap_comment = Some(FlapComment::Remove);
            effects.notifications.push(NotificationType::FlapStop);
        }
    }

    fn service_notification_viable(
        &self,
        s: &crate::objects::Service,
        kind: NotificationType,
        now: i64,
        period_ok: bool,
    ) -> bool {
        if !self.globals.notifications_enabled() || !s.notifications_enabled {
            return false;
        }
        if !period_ok {
            return false;
        }
        if s.scheduled_downtime_depth > 0 && !kind.is_meta() {
            return false;
        }
        // An acknowledgement only mutes further problem notifications; the
        // recovery that ends the problem is still announced.
        if s.acknowledgement.is_acknowledged() && kind == NotificationType::Problem {
            return false;
        }
        match kind {
            NotificationType::Problem => {
                if s.state_type != StateType::Hard {
                    return false;
                }
                if s.notified_on & s.state.notify_bit() == 0 {
                    true
                } else {
                    // Already notified on this state: escalate only after the
                    // re-notification interval.
                    s.notification_interval > 0.0 && now >= s.next_notification
                }
            }
            NotificationType::Recovery => s.state_type == StateType::Hard,
            _ => true,
        }
    }

    fn mark_service_notified(&self, s: &mut crate::objects::Service, now: i64) {
        s.notified_on |= s.state.notify_bit();
        s.notification_number += 1;
        s.current_notification_id = self.globals.take_notification_id();
        s.last_notification = now;
        s.next_notification =
            now + (s.notification_interval * f64::from(self.policy.interval_length)) as i64;
    }

    fn emit_service_effects(&self, row: &crate::objects::ServiceRef, effects: &Effects) {
        for line in &effects.log_lines {
            self.log.log(line);
        }
        let snapshot = row.read().clone();
        if effects.clear_ack_comments {
            self.comments
                .delete_service_ack_comments(&snapshot.host_name, &snapshot.description);
        }
        match &effects.flap_comment {
            Some(FlapComment::Add(text)) => {
                self.comments.add(crate::comments::Comment {
                    id: 0,
                    host_name: snapshot.host_name.clone(),
                    service_description: Some(snapshot.description.clone()),
                    entry_type: CommentEntryType::Flapping,
                    author: "(vigil process)".into(),
                    text: text.clone(),
                    source: crate::comments::CommentSource::Internal,
                    persistent: false,
                    entry_time: 0,
                    expire_time: None,
                });
            }
            Some(FlapComment::Remove) => {
                for c in self
                    .comments
                    .for_service(&snapshot.host_name, &snapshot.description)
                {
                    if c.entry_type == CommentEntryType::Flapping {
                        self.comments.delete(c.id);
                    }
                }
            }
            None => {}
        }
        for kind in &effects.notifications {
            self.notifier
                .notify_service(&snapshot, *kind, &snapshot.plugin_output);
        }
    }

    // -- hosts ---------------------------------------------------------------

    fn handle_host(&self, result: &CheckResult) -> Option<Event> {
        use std::sync::atomic::Ordering;

        let row = match self.store.host(&result.host_name) {
            Some(row) => row,
            None => {
                debug!(host = %result.host_name, "result for unknown host dropped");
                return None;
            }
        };

        if result.check_type == CheckType::Passive {
            if !self
                .globals
                .accept_passive_host_checks
                .load(Ordering::Relaxed)
                || !row.read().passive_checks_enabled
            {
                debug!(host = %result.host_name, "passive result refused");
                return None;
            }
            self.log.log(&format!(
                "PASSIVE HOST CHECK: {};{};{}",
                result.host_name, result.return_code, result.output
            ));
        }

        let new_state = self.host_state_for(&result.host_name, result);
        let now = unix_now();
        let period_ok = {
            let period = row.read().notification_period.clone();
            self.store.time_is_valid(&period, now)
        };

        let mut effects = Effects::default();
        let reschedule = {
            let mut h = row.write();

            if h.has_been_checked && result.start_time <= h.last_check {
                debug!(host = %h.name, "stale result skipped");
                return None;
            }

            self.apply_host_result(&mut h, result, new_state, now, period_ok, &mut effects);

            let interval = if h.state_type == StateType::Hard {
                h.check_interval
            } else {
                h.retry_interval
            };
            h.next_check = now + (interval * f64::from(self.policy.interval_length)) as i64;
            Event::at(
                h.next_check,
                EventKind::HostCheck {
                    host_name: h.name.clone(),
                    options:   0,
                },
            )
        };

        self.emit_host_effects(&row, &effects);
        self.downtimes
            .check_pending_flex_host(&result.host_name, new_state);
        self.globals.checks_run.fetch_add(1, Ordering::Relaxed);
        Some(reschedule)
    }

    /// Map a host result to a state, deriving UNREACHABLE from parent
    /// reachability unless aggressive host checking is on.
    fn host_state_for(&self, host_name: &str, result: &CheckResult) -> HostState {
        if !result.exited_ok {
            return HostState::Down;
        }
        if result.return_code == 0 {
            return HostState::Up;
        }
        if self.policy.use_aggressive_host_checking {
            return HostState::Down;
        }
        let parents = self
            .store
            .host(host_name)
            .map(|row| row.read().parents.clone())
            .unwrap_or_default();
        let any_parent_down = parents.iter().any(|p| {
            self.store
                .host(p)
                .is_some_and(|row| row.read().state != HostState::Up)
        });
        if any_parent_down {
            HostState::Unreachable
        } else {
            HostState::Down
        }
    }

    #[allow(clippy::too_many_lines)]
    fn apply_host_result(
        &self,
        h: &mut crate::objects::Host,
        result: &CheckResult,
        new_state: HostState,
        now: i64,
        period_ok: bool,
        effects: &mut Effects,
    ) {
        let old_state = h.state;
        let old_type = h.state_type;

        h.latency = result.latency;
        h.execution_time = (result.finish_time - result.start_time).max(0) as f64;
        h.last_check = result.finish_time;
        h.has_been_checked = true;
        if result.exited_ok {
            let (output, perf) = split_output(&result.output);
            h.plugin_output = output;
            h.perf_data = perf;
        } else {
            h.plugin_output = format!(
                "(Check did not exit cleanly: {})",
                first_line(&result.output)
            );
        }

        if new_state == HostState::Up {
            if old_state != HostState::Up {
                h.state = HostState::Up;
                h.last_state_change = now;
                h.current_attempt = 1;
                effects.log_lines.push(host_alert(h));
                if old_type == StateType::Hard {
                    h.state_type = StateType::Hard;
                    h.last_hard_state_change = now;
                    if self.host_notification_viable(h, NotificationType::Recovery, now, period_ok) {
                        effects.notifications.push(NotificationType::Recovery);
                    }
                    h.reset_notifications();
                } else {
                    h.state_type = StateType::Hard;
                }
                if h.acknowledgement.is_acknowledged() {
                    h.acknowledgement = Acknowledgement::None;
                    effects.clear_ack_comments = true;
                }
            } else {
                h.current_attempt = 1;
                h.state_type = StateType::Hard;
            }
        } else if old_state == HostState::Up {
            h.state = new_state;
            h.last_state_change = now;
            h.current_attempt = 1;
            if h.max_attempts == 1 {
                h.state_type = StateType::Hard;
                h.last_hard_state_change = now;
                effects.log_lines.push(host_alert(h));
                if self.host_notification_viable(h, NotificationType::Problem, now, period_ok) {
                    effects.notifications.push(NotificationType::Problem);
                    self.mark_host_notified(h, now);
                }
            } else {
                h.state_type = StateType::Soft;
                effects.log_lines.push(host_alert(h));
            }
        } else if new_state == old_state {
            if old_type == StateType::Soft {
                h.current_attempt += 1;
                if h.current_attempt >= h.max_attempts {
                    h.state_type = StateType::Hard;
                    h.last_hard_state_change = now;
                    effects.log_lines.push(host_alert(h));
                    if self.host_notification_viable(h, NotificationType::Problem, now, period_ok) {
                        effects.notifications.push(NotificationType::Problem);
                        self.mark_host_notified(h, now);
                    }
                } else {
                    effects.log_lines.push(host_alert(h));
                }
            } else if self.host_notification_viable(h, NotificationType::Problem, now, period_ok) {
                effects.notifications.push(NotificationType::Problem);
                self.mark_host_notified(h, now);
            }
        } else {
            // DOWN <-> UNREACHABLE transition.
            h.state = new_state;
            h.last_state_change = now;
            h.current_attempt = 1;
            if old_type == StateType::Soft {
                effects.log_lines.push(host_alert(h));
            } else {
                h.last_hard_state_change = now;
                effects.log_lines.push(host_alert(h));
                if self.host_notification_viable(h, NotificationType::Problem, now, period_ok) {
                    effects.notifications.push(NotificationType::Problem);
                    self.mark_host_notified(h, now);
                }
            }
            if h.acknowledgement == Acknowledgement::Normal {
                h.acknowledgement = Acknowledgement::None;
                effects.clear_ack_comments = true;
            }
        }

        h.touch_state_time(now);
        self.update_host_flap(h, effects);
    }

    fn update_host_flap(&self, h: &mut crate::objects::Host, effects: &mut Effects) {
        h.flap_history.push(h.state.as_int());
        h.percent_state_change = h.flap_history.percent_state_change();

        let detection_on = self.globals.flap_detection_enabled() && h.flap_detection_enabled;
        if !detection_on {
            if h.is_flapping {
                h.is_flapping = false;
                effects.flap_comment = Some(FlapComment::Remove);
            }
            return;
        }

        if !h.is_flapping && h.percent_state_change >= h.high_flap_threshold {
            h.is_flapping = true;
            effects.log_lines.push(format!(
                "HOST FLAPPING ALERT: {};STARTED; Host appears to have started flapping ({:.1}% change >= {:.1}% threshold)",
                h.name, h.percent_state_change, h.high_flap_threshold
            ));
            effects.flap_comment = Some(FlapComment::Add(format!(
                "Notifications for this host are being suppressed because it was detected as being flapping ({:.1}% change).",
                h.percent_state_change
            )));
            effects.notifications.push(NotificationType::FlapStart);
        } else if h.is_flapping && h.percent_state_change < h.low_flap_threshold {
            h.is_flapping = false;
            effects.log_lines.push(format!(
                "HOST FLAPPING ALERT: {};STOPPED; Host appears to have stopped flapping ({:.1}% change < {:.1}% threshold)",
                h.name, h.percent_state_change, h.low_flap_threshold
            ));
            effects.flap_comment = Some(FlapComment::Remove);
            effects.notifications.push(NotificationType::FlapStop);
        }
    }

    fn host_notification_viable(
        &self,
        h: &crate::objects::Host,
        kind: NotificationType,
        now: i64,
        period_ok: bool,
    ) -> bool {
        if !self.globals.notifications_enabled() || !h.notifications_enabled {
            return false;
        }
        if !period_ok {
            return false;
        }
        if h.scheduled_downtime_depth > 0 && !kind.is_meta() {
            return false;
        }
        if h.acknowledgement.is_acknowledged() && kind == NotificationType::Problem {
            return false;
        }
        match kind {
            NotificationType::Problem => {
                if h.state_type != StateType::Hard {
                    return false;
                }
                if h.notified_on & h.state.notify_bit() == 0 {
                    true
                } else {
                    h.notification_interval > 0.0 && now >= h.next_notification
                }
            }
            NotificationType::Recovery => h.state_type == StateType::Hard,
            _ => true,
        }
    }

    fn mark_host_notified(&self, h: &mut crate::objects::Host, now: i64) {
        h.notified_on |= h.state.notify_bit();
        h.notification_number += 1;
        h.current_notification_id = self.globals.take_notification_id();
        h.last_notification = now;
        h.next_notification =
            now + (h.notification_interval * f64::from(self.policy.interval_length)) as i64;
    }

    fn emit_host_effects(&self, row: &crate::objects::HostRef, effects: &Effects) {
        for line in &effects.log_lines {
            self.log.log(line);
        }
        let snapshot = row.read().clone();
        if effects.clear_ack_comments {
            self.comments.delete_host_ack_comments(&snapshot.name);
        }
        match &effects.flap_comment {
            Some(FlapComment::Add(text)) => {
                self.comments.add(crate::comments::Comment {
                    id: 0,
                    host_name: snapshot.name.clone(),
                    service_description: None,
                    entry_type: CommentEntryType::Flapping,
                    author: "(vigil process)".into(),
                    text: text.clone(),
                    source: crate::comments::CommentSource::Internal,
                    persistent: false,
                    entry_time: 0,
                    expire_time: None,
                });
            }
            Some(FlapComment::Remove) => {
                for c in self.comments.for_host(&snapshot.name) {
                    if c.entry_type == CommentEntryType::Flapping {
                        self.comments.delete(c.id);
                    }
                }
            }
            None => {}
        }
        for kind in &effects.notifications {
            self.notifier
                .notify_host(&snapshot, *kind, &snapshot.plugin_output);
        }
    }
}

fn service_alert(s: &crate::objects::Service) -> String {
    format!(
        "SERVICE ALERT: {};{};{};{};{};{}",
        s.host_name,
        s.description,
        s.state.name(),
        s.state_type.name(),
        s.current_attempt,
        s.plugin_output
    )
}

fn host_alert(h: &crate::objects::Host) -> String {
    format!(
        "HOST ALERT: {};{};{};{};{}",
        h.name,
        h.state.name(),
        h.state_type.name(),
        h.current_attempt,
        h.plugin_output
    )
}

/// Split plugin output into (first line of output, perf data).
fn split_output(raw: &str) -> (String, String) {
    let first = first_line(raw);
    match first.split_once('|') {
        Some((out, perf)) => (out.trim().to_string(), perf.trim().to_string()),
        None => (first.trim().to_string(), String::new()),
    }
}

fn first_line(raw: &str) -> &str {
    raw.lines().next().unwrap_or("")
}
