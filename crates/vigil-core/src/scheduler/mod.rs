//! The check scheduler: a single-threaded event loop over a monotonic
//! min-heap.
//!
//! Everything that mutates monitoring state funnels through this loop:
//! check results from the runner workers, external commands from the pipe
//! and the query socket, and the periodic maintenance events. The loop
//! suspends only on its channels and on the timer to the next due event.

mod events;

pub use events::{Event, EventKind, CHECK_OPTION_FORCE_EXECUTION};

use std::collections::BinaryHeap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::comments::CommentManager;
use crate::commands::{CommandRegistry, RawCommand};
use crate::config::DaemonConfig;
use crate::downtimes::DowntimeManager;
use crate::logfile::MonitorLog;
use crate::objects::{HostRef, ObjectStore, ProgramState, ServiceRef};
use crate::results::{CheckResult, ResultHandler};
use crate::retention;
use crate::runner::{expand_command, CheckRequest, CheckRunner};
use crate::unix_now;

/// Seconds between reaper sweeps of the result channel.
const REAPER_INTERVAL: i64 = 5;
/// Seconds between downtime/comment expiry sweeps.
const EXPIRY_SWEEP_INTERVAL: i64 = 60;
/// Slack added to derived freshness thresholds.
const FRESHNESS_SLACK: i64 = 15;
/// Longest the loop sleeps when the queue is quiet.
const MAX_IDLE_SLEEP: i64 = 60;

/// Scheduler tunables lifted from the daemon configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval_length: u32,
    pub max_parallel_service_checks: u32,
    pub service_check_timeout: u64,
    pub host_check_timeout: u64,
    pub status_update_interval: u64,
    pub retention_update_interval: u64,
    pub log_rotation_interval: u64,
    pub freshness_check_interval: u64,
    pub max_service_check_spread: u32,
    pub max_host_check_spread: u32,
    pub status_file: PathBuf,
    pub retention_file: PathBuf,
}

impl SchedulerConfig {
    pub fn from_daemon(cfg: &DaemonConfig) -> Self {
        Self {
            interval_length: cfg.interval_length,
            max_parallel_service_checks: cfg.max_parallel_service_checks,
            service_check_timeout: cfg.service_check_timeout,
            host_check_timeout: cfg.host_check_timeout,
            status_update_interval: cfg.status_update_interval,
            retention_update_interval: cfg.retention_update_interval,
            log_rotation_interval: cfg.log_rotation_interval,
            freshness_check_interval: cfg.freshness_check_interval,
            max_service_check_spread: cfg.max_service_check_spread,
            max_host_check_spread: cfg.max_host_check_spread,
            status_file: cfg.status_file.clone(),
            retention_file: cfg.retention_file.clone(),
        }
    }
}

/// Channels for talking to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    /// Inject an event (forced checks, reschedules).
    pub event_tx: mpsc::UnboundedSender<Event>,
    /// Submit an external command for dispatch on the loop.
    pub command_tx: mpsc::UnboundedSender<RawCommand>,
    /// Deliver a check result (used by passive-result handlers).
    pub result_tx: mpsc::Sender<CheckResult>,
    /// Ask the loop to stop.
    pub shutdown_tx: broadcast::Sender<()>,
}

/// A projected check from `--test-scheduling`.
#[derive(Debug, Clone)]
pub struct ProjectedCheck {
    pub run_time: i64,
    pub host_name: String,
    pub service_description: Option<String>,
}

/// The event loop. Built once, seeded with [`Scheduler::init_schedule`],
/// then consumed by [`Scheduler::run`].
pub struct Scheduler {
    queue: BinaryHeap<Event>,
    next_event_id: u64,

    store: Arc<ObjectStore>,
    globals: Arc<ProgramState>,
    comments: Arc<CommentManager>,
    downtimes: Arc<DowntimeManager>,
    registry: Arc<CommandRegistry>,
    handler: ResultHandler,
    runner: Arc<dyn CheckRunner>,
    log: Arc<MonitorLog>,
    cfg: SchedulerConfig,

    result_tx: mpsc::Sender<CheckResult>,
    result_rx: mpsc::Receiver<CheckResult>,
    event_rx: mpsc::UnboundedReceiver<Event>,
    command_rx: mpsc::UnboundedReceiver<RawCommand>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<ObjectStore>,
        globals: Arc<ProgramState>,
        comments: Arc<CommentManager>,
        downtimes: Arc<DowntimeManager>,
        registry: Arc<CommandRegistry>,
        handler: ResultHandler,
        runner: Arc<dyn CheckRunner>,
        log: Arc<MonitorLog>,
        cfg: SchedulerConfig,
    ) -> (Self, SchedulerHandle) {
        let (result_tx, result_rx) = mpsc::channel(1024);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = SchedulerHandle {
            event_tx,
            command_tx,
            result_tx: result_tx.clone(),
            shutdown_tx,
        };
        let scheduler = Self {
            queue: BinaryHeap::new(),
            next_event_id: 1,
            store,
            globals,
            comments,
            downtimes,
            registry,
            handler,
            runner,
            log,
            cfg,
            result_tx,
            result_rx,
            event_rx,
            command_rx,
            shutdown_rx,
        };
        (scheduler, handle)
    }

    fn push(&mut self, mut event: Event) {
        if event.id == 0 {
            event.id = self.next_event_id;
            self.next_event_id += 1;
        }
        self.queue.push(event);
    }

    // -- initial scheduling --------------------------------------------------

    /// Spread all first checks across the configured windows and seed the
    /// periodic maintenance events.
    pub fn init_schedule(&mut self, now: i64) {
        self.schedule_host_checks(now);
        self.schedule_service_checks(now);

        if self.cfg.status_update_interval > 0 {
            self.push(Event::at(
                now + self.cfg.status_update_interval as i64,
                EventKind::StatusSave,
            ));
        }
        if self.cfg.retention_update_interval > 0 {
            self.push(Event::at(
                now + self.cfg.retention_update_interval as i64,
                EventKind::RetentionSave,
            ));
        }
        if self.cfg.log_rotation_interval > 0 {
            self.push(Event::at(
                now + self.cfg.log_rotation_interval as i64,
                EventKind::LogRotation,
            ));
        }
        if self.cfg.freshness_check_interval > 0 {
            self.push(Event::at(
                now + self.cfg.freshness_check_interval as i64,
                EventKind::CheckFreshness,
            ));
        }
        self.push(Event::at(now + EXPIRY_SWEEP_INTERVAL, EventKind::ExpireDowntimes));
        self.push(Event::at(now + REAPER_INTERVAL, EventKind::Reaper));
    }

    fn schedule_host_checks(&mut self, now: i64) {
        let hosts = self.store.hosts();
        if hosts.is_empty() {
            return;
        }
        let icd = inter_check_delay(
            hosts.iter().map(|h| h.read().check_interval),
            self.cfg.interval_length,
            self.cfg.max_host_check_spread,
        );
        let mut rng = rand::thread_rng();
        for (slot, row) in hosts.iter().enumerate() {
            let jitter = rng.gen_range(0..(icd as i64).max(1));
            let t = now + (slot as f64 * icd) as i64 + jitter;
            let name = {
                let mut h = row.write();
                h.next_check = t;
                h.name.clone()
            };
            self.push(Event::at(
                t,
                EventKind::HostCheck {
                    host_name: name,
                    options:   0,
                },
            ));
        }
    }

    fn schedule_service_checks(&mut self, now: i64) {
        let services = self.store.services();
        if services.is_empty() {
            return;
        }
        let icd = inter_check_delay(
            services.iter().map(|s| s.read().check_interval),
            self.cfg.interval_length,
            self.cfg.max_service_check_spread,
        );
        // Stride through the (host-grouped) service list so consecutive
        // slots land on different hosts.
        let interleave = (services.len() / self.store.host_count().max(1)).max(1);
        let mut rng = rand::thread_rng();
        let mut slot = 0usize;
        for offset in 0..interleave {
            let mut i = offset;
            while i < services.len() {
                let jitter = rng.gen_range(0..(icd as i64).max(1));
                let t = now + (slot as f64 * icd) as i64 + jitter;
                let (host_name, description) = {
                    let mut s = services[i].write();
                    s.next_check = t;
                    (s.host_name.clone(), s.description.clone())
                };
                self.push(Event::at(
                    t,
                    EventKind::ServiceCheck {
                        host_name,
                        description,
                        options: 0,
                    },
                ));
                slot += 1;
                i += interleave;
            }
        }
    }

    /// The projected check schedule, sorted by run time. Used by
    /// `--test-scheduling`.
    pub fn projected_schedule(&self) -> Vec<ProjectedCheck> {
        let mut out: Vec<ProjectedCheck> = self
            .queue
            .iter()
            .filter_map(|ev| match &ev.kind {
                EventKind::HostCheck { host_name, .. } => Some(ProjectedCheck {
                    run_time: ev.run_time,
                    host_name: host_name.clone(),
                    service_description: None,
                }),
                EventKind::ServiceCheck {
                    host_name,
                    description,
                    ..
                } => Some(ProjectedCheck {
                    run_time: ev.run_time,
                    host_name: host_name.clone(),
                    service_description: Some(description.clone()),
                }),
                _ => None,
            })
            .collect();
        out.sort_by_key(|c| c.run_time);
        out
    }

    // -- the loop ------------------------------------------------------------

    /// Run until shutdown. Consumes the scheduler.
    pub async fn run(mut self) {
        info!("scheduler loop started");
        loop {
            // Fold in events injected since the last pass.
            while let Ok(ev) = self.event_rx.try_recv() {
                self.push(ev);
            }

            let now = unix_now();
            while self.queue.peek().is_some_and(|e| e.run_time <= now) {
                if let Some(ev) = self.queue.pop() {
                    self.handle_event(ev, now);
                }
            }

            let sleep_secs = self
                .queue
                .peek()
                .map_or(MAX_IDLE_SLEEP, |e| (e.run_time - now).clamp(1, MAX_IDLE_SLEEP));

            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(sleep_secs as u64)) => {}
                Some(result) = self.result_rx.recv() => {
                    self.apply_result(result);
                }
                Some(ev) = self.event_rx.recv() => {
                    self.push(ev);
                }
                Some(cmd) = self.command_rx.recv() => {
                    self.apply_command(&cmd);
                }
                _ = self.shutdown_rx.recv() => {
                    info!("scheduler stopping");
                    self.save_all("shutdown");
                    break;
                }
            }
        }
    }

    fn handle_event(&mut self, event: Event, now: i64) {
        match event.kind {
            EventKind::ServiceCheck {
                host_name,
                description,
                options,
            } => self.dispatch_service_check(&host_name, &description, options, event.run_time, now),
            EventKind::HostCheck { host_name, options } => {
                self.dispatch_host_check(&host_name, options, event.run_time, now);
            }
            EventKind::StatusSave => {
                if let Err(e) = retention::save_status(
                    &self.cfg.status_file,
                    &self.store,
                    &self.comments,
                    &self.downtimes,
                    &self.globals,
                ) {
                    warn!(error = %e, "status save failed, will retry");
                }
                self.push(Event::at(
                    now + self.cfg.status_update_interval as i64,
                    EventKind::StatusSave,
                ));
            }
            EventKind::RetentionSave => {
                if let Err(e) = retention::save_retention(
                    &self.cfg.retention_file,
                    &self.store,
                    &self.comments,
                    &self.downtimes,
                    &self.globals,
                ) {
                    warn!(error = %e, "retention save failed, will retry");
                }
                self.push(Event::at(
                    now + self.cfg.retention_update_interval as i64,
                    EventKind::RetentionSave,
                ));
            }
            EventKind::LogRotation => {
                if let Err(e) = self.log.rotate() {
                    warn!(error = %e, "log rotation failed, will retry");
                }
                self.push(Event::at(
                    now + self.cfg.log_rotation_interval as i64,
                    EventKind::LogRotation,
                ));
            }
            EventKind::ExpireDowntimes => {
                self.downtimes.check_starts(now);
                self.downtimes.check_expired(now);
                self.comments.expire_comments(now);
                self.push(Event::at(now + EXPIRY_SWEEP_INTERVAL, EventKind::ExpireDowntimes));
            }
            EventKind::CheckFreshness => {
                self.check_freshness(now);
                self.push(Event::at(
                    now + self.cfg.freshness_check_interval as i64,
                    EventKind::CheckFreshness,
                ));
            }
            EventKind::Reaper => {
                let mut drained = 0;
                while let Ok(result) = self.result_rx.try_recv() {
                    self.apply_result(result);
                    drained += 1;
                    if drained >= 256 {
                        break;
                    }
                }
                self.push(Event::at(now + REAPER_INTERVAL, EventKind::Reaper));
            }
        }
    }

    fn apply_result(&mut self, result: CheckResult) {
        if let Some(reschedule) = self.handler.handle(&result) {
            self.push(reschedule);
        }
    }

    fn apply_command(&mut self, cmd: &RawCommand) {
        self.log.log(&format!("EXTERNAL COMMAND: {}", cmd.wire_form()));
        self.globals
            .external_commands_processed
            .fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.registry.dispatch(cmd) {
            debug!(command = %cmd.name, error = %e, "external command dropped");
        }
    }

    // -- check dispatch ------------------------------------------------------

    fn dispatch_service_check(
        &mut self,
        host_name: &str,
        description: &str,
        options: u32,
        scheduled_at: i64,
        now: i64,
    ) {
        let Some(row) = self.store.service(host_name, description) else {
            return;
        };
        let force = options & CHECK_OPTION_FORCE_EXECUTION != 0;

        if !force {
            let (active_enabled, period, retry_interval) = {
                let s = row.read();
                (s.active_checks_enabled, s.check_period.clone(), s.retry_interval)
            };
            let gate = self.cfg.max_parallel_service_checks;
            let blocked = !active_enabled
                || !self.globals.execute_service_checks.load(Ordering::Relaxed)
                || !self.store.time_is_valid(&period, now)
                || (gate != 0 && self.globals.running_service_checks.load(Ordering::Relaxed) >= gate);
            if blocked {
                let t = now + ((retry_interval * f64::from(self.cfg.interval_length)) as i64).max(1);
                row.write().next_check = t;
                self.push(Event::at(
                    t,
                    EventKind::ServiceCheck {
                        host_name:   host_name.to_string(),
                        description: description.to_string(),
                        options,
                    },
                ));
                return;
            }
        }

        self.globals
            .running_service_checks
            .fetch_add(1, Ordering::Relaxed);
        let request = self.build_service_request(&row, scheduled_at);
        self.runner.spawn_check(request, self.result_tx.clone());
    }

    fn dispatch_host_check(&mut self, host_name: &str, options: u32, scheduled_at: i64, now: i64) {
        let Some(row) = self.store.host(host_name) else {
            return;
        };
        let force = options & CHECK_OPTION_FORCE_EXECUTION != 0;

        if !force {
            let (active_enabled, period, retry_interval) = {
                let h = row.read();
                (h.active_checks_enabled, h.check_period.clone(), h.retry_interval)
            };
            let blocked = !active_enabled
                || !self.globals.execute_host_checks.load(Ordering::Relaxed)
                || !self.store.time_is_valid(&period, now);
            if blocked {
                let t = now + ((retry_interval * f64::from(self.cfg.interval_length)) as i64).max(1);
                row.write().next_check = t;
                self.push(Event::at(
                    t,
                    EventKind::HostCheck {
                        host_name: host_name.to_string(),
                        options,
                    },
                ));
                return;
            }
        }

        let request = self.build_host_request(&row, scheduled_at);
        self.runner.spawn_check(request, self.result_tx.clone());
    }

    fn build_service_request(&self, row: &ServiceRef, scheduled_at: i64) -> CheckRequest {
        let svc = row.read().clone();
        let host = self
            .store
            .host(&svc.host_name)
            .map(|h| h.read().clone());
        let template = self.command_template(&svc.check_command);
        let command_line = match &host {
            Some(h) => expand_command(&svc.check_command, &template, h, Some(&svc)),
            None => template,
        };
        CheckRequest {
            host_name: svc.host_name.clone(),
            service_description: Some(svc.description.clone()),
            command_line,
            timeout: Duration::from_secs(self.cfg.service_check_timeout),
            scheduled_at,
        }
    }

    fn build_host_request(&self, row: &HostRef, scheduled_at: i64) -> CheckRequest {
        let host = row.read().clone();
        let template = self.command_template(&host.check_command);
        let command_line = expand_command(&host.check_command, &template, &host, None);
        CheckRequest {
            host_name: host.name.clone(),
            service_description: None,
            command_line,
            timeout: Duration::from_secs(self.cfg.host_check_timeout),
            scheduled_at,
        }
    }

    fn command_template(&self, reference: &str) -> String {
        let base = reference.split('!').next().unwrap_or(reference);
        self.store
            .command(base)
            .map_or_else(|| reference.to_string(), |c| c.command_line.clone())
    }

    // -- freshness -----------------------------------------------------------

    /// Inject forced checks for objects whose results have gone stale.
    fn check_freshness(&mut self, now: i64) {
        let mut stale: Vec<Event> = Vec::new();
        for row in self.store.services() {
            let s = row.read();
            if !s.check_freshness || !s.has_been_checked {
                continue;
            }
            let threshold = if s.freshness_threshold > 0 {
                i64::from(s.freshness_threshold)
            } else {
                (s.check_interval * f64::from(self.cfg.interval_length)) as i64 + FRESHNESS_SLACK
            };
            if now - s.last_check > threshold {
                warn!(
                    host = %s.host_name,
                    service = %s.description,
                    age = now - s.last_check,
                    "service result is stale, forcing check"
                );
                stale.push(Event::at(
                    now,
                    EventKind::ServiceCheck {
                        host_name:   s.host_name.clone(),
                        description: s.description.clone(),
                        options:     CHECK_OPTION_FORCE_EXECUTION,
                    },
                ));
            }
        }
        for row in self.store.hosts() {
            let h = row.read();
            if !h.check_freshness || !h.has_been_checked {
                continue;
            }
            let threshold = if h.freshness_threshold > 0 {
                i64::from(h.freshness_threshold)
            } else {
                (h.check_interval * f64::from(self.cfg.interval_length)) as i64 + FRESHNESS_SLACK
            };
            if now - h.last_check > threshold {
                warn!(host = %h.name, age = now - h.last_check, "host result is stale, forcing check");
                stale.push(Event::at(
                    now,
                    EventKind::HostCheck {
                        host_name: h.name.clone(),
                        options:   CHECK_OPTION_FORCE_EXECUTION,
                    },
                ));
            }
        }
        for ev in stale {
            self.push(ev);
        }
    }

    fn save_all(&self, reason: &str) {
        if let Err(e) = retention::save_status(
            &self.cfg.status_file,
            &self.store,
            &self.comments,
            &self.downtimes,
            &self.globals,
        ) {
            error!(error = %e, reason, "final status save failed");
        }
        if let Err(e) = retention::save_retention(
            &self.cfg.retention_file,
            &self.store,
            &self.comments,
            &self.downtimes,
            &self.globals,
        ) {
            error!(error = %e, reason, "final retention save failed");
        }
    }
}

/// Inter-check delay: mean interval spread over the object count, capped so
/// the whole population fits inside the spread window.
fn inter_check_delay(
    intervals: impl Iterator<Item = f64>,
    interval_length: u32,
    spread_minutes: u32,
) -> f64 {
    let (sum, count) = intervals.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        return 1.0;
    }
    let mean = sum / count as f64;
    let icd = (mean * f64::from(interval_length)) / count as f64;
    let cap = f64::from(spread_minutes) * 60.0 / count as f64;
    icd.min(cap).max(1.0)
}
