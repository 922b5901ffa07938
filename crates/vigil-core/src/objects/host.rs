//! The host row: identity, relations, and runtime state.

use super::flap::FlapHistory;
use super::state::{Acknowledgement, HostState, StateType};
use crate::config::HostDef;

/// A monitored host.
///
/// Identity and relation fields are fixed at configuration load; everything
/// under "runtime state" mutates as check results arrive.
#[derive(Debug, Clone)]
pub struct Host {
    // -- identity & configuration ------------------------------------------
    pub name: String,
    pub alias: String,
    pub address: String,
    pub check_command: String,
    /// Check interval in interval_length units.
    pub check_interval: f64,
    /// Retry interval in interval_length units, used while SOFT.
    pub retry_interval: f64,
    pub max_attempts: u32,
    pub check_period: String,
    pub notification_period: String,
    /// Re-notification interval in interval_length units. 0 disables
    /// re-notification.
    pub notification_interval: f64,
    pub check_freshness: bool,
    /// Seconds; 0 derives a threshold from the check interval.
    pub freshness_threshold: u32,
    pub low_flap_threshold: f64,
    pub high_flap_threshold: f64,
    pub notes: String,

    // -- relations (resolved at load, never mutated) -----------------------
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub groups: Vec<String>,
    pub contacts: Vec<String>,
    pub contact_groups: Vec<String>,
    /// Descriptions of services bound to this host.
    pub services: Vec<String>,

    // -- runtime state ------------------------------------------------------
    pub state: HostState,
    pub state_type: StateType,
    pub current_attempt: u32,
    pub has_been_checked: bool,
    pub last_check: i64,
    pub next_check: i64,
    pub last_state_change: i64,
    pub last_hard_state_change: i64,
    pub last_time_up: i64,
    pub last_time_down: i64,
    pub last_time_unreachable: i64,
    pub plugin_output: String,
    pub perf_data: String,
    pub latency: f64,
    pub execution_time: f64,

    pub acknowledgement: Acknowledgement,
    pub notifications_enabled: bool,
    pub active_checks_enabled: bool,
    pub passive_checks_enabled: bool,
    pub event_handler_enabled: bool,
    pub flap_detection_enabled: bool,

    pub is_flapping: bool,
    pub percent_state_change: f64,
    pub flap_history: FlapHistory,

    pub scheduled_downtime_depth: u32,
    pub pending_flex_downtime: u32,

    /// Bitmask of states already notified on during the current problem.
    pub notified_on: u32,
    pub notification_number: u32,
    pub current_notification_id: u64,
    pub last_notification: i64,
    pub next_notification: i64,

    /// Which options an operator has overridden at runtime (see
    /// [`super::state::modattr`]).
    pub modified_attributes: u64,
}

impl Host {
    /// Build a host row from its configuration definition. Relations are
    /// linked afterwards by the store's `link` pass.
    pub fn from_def(def: &HostDef) -> Self {
        Self {
            name: def.name.clone(),
            alias: if def.alias.is_empty() {
                def.name.clone()
            } else {
                def.alias.clone()
            },
            address: def.address.clone(),
            check_command: def.check_command.clone(),
            check_interval: def.check_interval,
            retry_interval: def.retry_interval,
            max_attempts: def.max_attempts.max(1),
            check_period: def.check_period.clone(),
            notification_period: def.notification_period.clone(),
            notification_interval: def.notification_interval,
            check_freshness: def.check_freshness,
            freshness_threshold: def.freshness_threshold,
            low_flap_threshold: def.low_flap_threshold,
            high_flap_threshold: def.high_flap_threshold,
            notes: def.notes.clone(),

            parents: def.parents.clone(),
            children: Vec::new(),
            groups: Vec::new(),
            contacts: def.contacts.clone(),
            contact_groups: def.contact_groups.clone(),
            services: Vec::new(),

            state: HostState::Up,
            state_type: StateType::Hard,
            current_attempt: 1,
            has_been_checked: false,
            last_check: 0,
            next_check: 0,
            last_state_change: 0,
            last_hard_state_change: 0,
            last_time_up: 0,
            last_time_down: 0,
            last_time_unreachable: 0,
            plugin_output: String::new(),
            perf_data: String::new(),
            latency: 0.0,
            execution_time: 0.0,

            acknowledgement: Acknowledgement::None,
            notifications_enabled: def.notifications_enabled,
            active_checks_enabled: def.active_checks_enabled,
            passive_checks_enabled: def.passive_checks_enabled,
            event_handler_enabled: def.event_handler_enabled,
            flap_detection_enabled: def.flap_detection_enabled,

            is_flapping: false,
            percent_state_change: 0.0,
            flap_history: FlapHistory::new(),

            scheduled_downtime_depth: 0,
            pending_flex_downtime: 0,

            notified_on: 0,
            notification_number: 0,
            current_notification_id: 0,
            last_notification: 0,
            next_notification: 0,

            modified_attributes: 0,
        }
    }

    /// True while the host is in any non-UP state.
    pub fn is_problem(&self) -> bool {
        self.state != HostState::Up
    }

    /// Record the wall-clock time the host was last seen in its current
    /// state.
    pub fn touch_state_time(&mut self, now: i64) {
        match self.state {
            HostState::Up => self.last_time_up = now,
            HostState::Down => self.last_time_down = now,
            HostState::Unreachable => self.last_time_unreachable = now,
        }
    }

    /// Reset notification bookkeeping after a hard recovery.
    pub fn reset_notifications(&mut self) {
        self.notified_on = 0;
        self.notification_number = 0;
        self.next_notification = 0;
    }
}
