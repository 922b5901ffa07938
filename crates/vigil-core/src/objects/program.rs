//! Process-wide program state: global toggles mirroring the per-object
//! flags, id counters, and observability counters.
//!
//! All fields are atomics so the query engine and the command handlers can
//! read and write them without a lock. Writes happen only through the
//! command handler table.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::config::DaemonConfig;

/// Global daemon state. One instance lives for the process, shared by
/// `Arc`.
#[derive(Debug)]
pub struct ProgramState {
    pub program_start: i64,
    pub pid: u32,

    pub enable_notifications: AtomicBool,
    pub execute_service_checks: AtomicBool,
    pub execute_host_checks: AtomicBool,
    pub accept_passive_service_checks: AtomicBool,
    pub accept_passive_host_checks: AtomicBool,
    pub enable_event_handlers: AtomicBool,
    pub enable_flap_detection: AtomicBool,

    /// Modified-attributes mask for the global toggles.
    pub modified_attributes: AtomicU64,

    /// Seed for notification ids.
    pub next_notification_id: AtomicU64,

    // -- observability counters ---------------------------------------------
    pub queries_served: AtomicU64,
    pub external_commands_processed: AtomicU64,
    pub checks_run: AtomicU64,
    /// Number of service checks currently in flight (the concurrency gate).
    pub running_service_checks: AtomicU32,
}

impl ProgramState {
    pub fn new(cfg: &DaemonConfig, program_start: i64) -> Self {
        Self {
            program_start,
            pid: std::process::id(),
            enable_notifications: AtomicBool::new(cfg.enable_notifications),
            execute_service_checks: AtomicBool::new(cfg.execute_service_checks),
            execute_host_checks: AtomicBool::new(cfg.execute_host_checks),
            accept_passive_service_checks: AtomicBool::new(cfg.accept_passive_service_checks),
            accept_passive_host_checks: AtomicBool::new(cfg.accept_passive_host_checks),
            enable_event_handlers: AtomicBool::new(cfg.enable_event_handlers),
            enable_flap_detection: AtomicBool::new(cfg.enable_flap_detection),
            modified_attributes: AtomicU64::new(0),
            next_notification_id: AtomicU64::new(1),
            queries_served: AtomicU64::new(0),
            external_commands_processed: AtomicU64::new(0),
            checks_run: AtomicU64::new(0),
            running_service_checks: AtomicU32::new(0),
        }
    }

    /// Claim the next notification id.
    pub fn take_notification_id(&self) -> u64 {
        self.next_notification_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn notifications_enabled(&self) -> bool {
        self.enable_notifications.load(Ordering::Relaxed)
    }

    pub fn flap_detection_enabled(&self) -> bool {
        self.enable_flap_detection.load(Ordering::Relaxed)
    }
}
