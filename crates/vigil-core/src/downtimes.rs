//! Scheduled downtime lifecycle.
//!
//! Depth bookkeeping invariants:
//! - every `scheduled_downtime_depth` increment is paired with exactly one
//!   decrement (idempotency guarded by the `in_effect` flag);
//! - `pending_flex_downtime` is incremented at most once per downtime
//!   (guarded by `incremented_pending`) and decremented exactly once, when
//!   the downtime starts or is removed;
//! - `triggered_by` cascades start and end synchronously with their
//!   trigger.
//!
//! The internal map lock is never held across calls into the comment
//! manager, the object store, the log, or the notifier.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use crate::comments::{Comment, CommentEntryType, CommentManager, CommentSource};
use crate::logfile::MonitorLog;
use crate::notifier::{NotificationType, Notifier};
use crate::objects::{HostState, ObjectStore, ServiceState};
use crate::unix_now;

/// A scheduled downtime window on a host or service.
#[derive(Debug, Clone)]
pub struct Downtime {
    pub id: u64,
    pub host_name: String,
    /// `None` for host downtimes.
    pub service_description: Option<String>,
    pub entry_time: i64,
    pub start_time: i64,
    pub end_time: i64,
    /// Fixed starts exactly at `start_time`; flexible starts on the first
    /// problem inside the window and runs for `duration` seconds.
    pub fixed: bool,
    pub duration: i64,
    /// 0, or the id of the downtime that triggers this one.
    pub triggered_by: u64,
    pub in_effect: bool,
    pub start_sent: bool,
    /// Whether this downtime holds a `pending_flex_downtime` increment on
    /// its target.
    pub incremented_pending: bool,
    /// When a flexible downtime actually started.
    pub flex_started_at: Option<i64>,
    pub author: String,
    pub comment: String,
    /// Comment created when the downtime was scheduled.
    pub comment_id: u64,
}

impl Downtime {
    /// Construct a not-yet-scheduled downtime with the common fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        host_name: &str,
        service_description: Option<&str>,
        start_time: i64,
        end_time: i64,
        fixed: bool,
        duration: i64,
        triggered_by: u64,
        author: &str,
        comment: &str,
    ) -> Self {
        Self {
            id: 0,
            host_name: host_name.to_string(),
            service_description: service_description.map(str::to_string),
            entry_time: 0,
            start_time,
            end_time,
            fixed,
            duration,
            triggered_by,
            in_effect: false,
            start_sent: false,
            incremented_pending: false,
            flex_started_at: None,
            author: author.to_string(),
            comment: comment.to_string(),
            comment_id: 0,
        }
    }

    /// The wall-clock second at which this downtime stops suppressing, given
    /// how it started.
    fn effective_end(&self) -> i64 {
        match (self.fixed, self.flex_started_at) {
            (false, Some(started)) => started + self.duration,
            _ => self.end_time,
        }
    }
}

struct Inner {
    downtimes: BTreeMap<u64, Downtime>,
    next_id:   u64,
}

/// Thread-safe owner of all downtimes.
pub struct DowntimeManager {
    inner:    Mutex<Inner>,
    store:    Arc<ObjectStore>,
    comments: Arc<CommentManager>,
    log:      Arc<MonitorLog>,
    notifier: Arc<dyn Notifier>,
}

impl DowntimeManager {
    pub fn new(
        store: Arc<ObjectStore>,
        comments: Arc<CommentManager>,
        log: Arc<MonitorLog>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                downtimes: BTreeMap::new(),
                next_id:   1,
            }),
            store,
            comments,
            log,
            notifier,
        }
    }

    // -- scheduling ----------------------------------------------------------

    /// Schedule a downtime: assign the next id, synthesize its comment, and
    /// register the pending-flex increment when applicable. Returns the id.
    pub fn schedule(&self, mut d: Downtime) -> u64 {
        if d.entry_time == 0 {
            d.entry_time = unix_now();
        }
        d.in_effect = false;
        d.start_sent = false;

        d.comment_id = self.comments.add(self.downtime_comment(&d));

        let wants_pending = !d.fixed && d.triggered_by == 0;
        let id = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            d.id = id;
            d.incremented_pending = wants_pending;
            inner.downtimes.insert(id, d.clone());
            id
        };
        if wants_pending {
            self.bump_pending(&d.host_name, d.service_description.as_deref(), 1);
        }
        id
    }

    /// Insert a downtime keeping its id; used by retention restore. Restores
    /// the depth/pending counters the loaded flags imply.
    pub fn schedule_with_id(&self, d: Downtime) {
        {
            let mut inner = self.inner.lock();
            inner.next_id = inner.next_id.max(d.id + 1);
            inner.downtimes.insert(d.id, d.clone());
        }
        if d.in_effect {
            self.bump_depth(&d.host_name, d.service_description.as_deref(), 1);
        } else if d.incremented_pending {
            self.bump_pending(&d.host_name, d.service_description.as_deref(), 1);
        }
    }

    // -- start / end / cancel ------------------------------------------------

    /// Put a downtime into effect. Idempotent. Starts every downtime
    /// triggered by this one.
    pub fn handle_start(&self, id: u64) {
        let (d, triggered) = {
            let mut inner = self.inner.lock();
            let Some(entry) = inner.downtimes.get_mut(&id) else {
                return;
            };
            if entry.in_effect {
                return;
            }
            entry.in_effect = true;
            entry.start_sent = true;
            let was_pending = entry.incremented_pending;
            entry.incremented_pending = false;
            let mut d = entry.clone();
            d.incremented_pending = was_pending;
            let triggered = triggered_ids(&inner.downtimes, id);
            (d, triggered)
        };

        if d.incremented_pending {
            self.bump_pending(&d.host_name, d.service_description.as_deref(), -1);
        }
        let depth_was_zero = self.bump_depth(&d.host_name, d.service_description.as_deref(), 1) == Some(1);
        if depth_was_zero {
            self.alert(&d, "STARTED", "has entered a period of scheduled downtime");
            self.notify(&d, NotificationType::DowntimeStart);
        }

        for t in triggered {
            self.handle_start(t);
        }
    }

    /// Take a downtime out of effect and remove it, cascading to everything
    /// it triggered. Idempotent on the stop step.
    pub fn handle_end(&self, id: u64) {
        self.remove(id, "STOPPED", NotificationType::DowntimeEnd);
    }

    /// Operator cancellation: same teardown as an end, different wording.
    pub fn unschedule(&self, id: u64) {
        self.remove(id, "CANCELLED", NotificationType::DowntimeCancelled);
    }

    fn remove(&self, id: u64, verb: &str, kind: NotificationType) {
        let (d, triggered) = {
            let mut inner = self.inner.lock();
            let Some(d) = inner.downtimes.remove(&id) else {
                return;
            };
            let triggered = triggered_ids(&inner.downtimes, id);
            (d, triggered)
        };

        if d.incremented_pending {
            self.bump_pending(&d.host_name, d.service_description.as_deref(), -1);
        }
        if d.in_effect {
            let depth_now_zero =
                self.bump_depth(&d.host_name, d.service_description.as_deref(), -1) == Some(0);
            if depth_now_zero {
                let text = if verb == "CANCELLED" {
                    "scheduled downtime has been cancelled"
                } else {
                    "has exited from a period of scheduled downtime"
                };
                self.alert(&d, verb, text);
                self.notify(&d, kind);
            }
        }
        self.comments.delete(d.comment_id);

        for t in triggered {
            self.remove(t, verb, kind);
        }
    }

    // -- sweeps --------------------------------------------------------------

    /// Remove downtimes whose window has passed. Downtimes in effect end
    /// through the normal path; ones that never started are dropped with an
    /// end notification and their comment deleted.
    pub fn check_expired(&self, now: i64) {
        let expired: Vec<(u64, bool)> = {
            let inner = self.inner.lock();
            inner
                .downtimes
                .values()
                .filter(|d| now >= d.effective_end())
                .map(|d| (d.id, d.in_effect))
                .collect()
        };
        for (id, in_effect) in expired {
            if in_effect {
                self.handle_end(id);
            } else {
                let d = {
                    let mut inner = self.inner.lock();
                    inner.downtimes.remove(&id)
                };
                let Some(d) = d else { continue };
                if d.incremented_pending {
                    self.bump_pending(&d.host_name, d.service_description.as_deref(), -1);
                }
                self.notify(&d, NotificationType::DowntimeEnd);
                self.comments.delete(d.comment_id);
            }
        }
    }

    /// Put fixed downtimes whose start time has arrived into effect. Runs
    /// from the scheduler's minute sweep and right after scheduling.
    pub fn check_starts(&self, now: i64) {
        let due: Vec<u64> = {
            let inner = self.inner.lock();
            inner
                .downtimes
                .values()
                .filter(|d| d.fixed && !d.in_effect && d.start_time <= now && now < d.end_time)
                .map(|d| d.id)
                .collect()
        };
        for id in due {
            self.handle_start(id);
        }
    }

    /// Start waiting flexible downtimes for a host that just produced a
    /// non-UP result.
    pub fn check_pending_flex_host(&self, host: &str, state: HostState) {
        if state == HostState::Up {
            return;
        }
        self.start_pending_flex(host, None);
    }

    /// Start waiting flexible downtimes for a service that just produced a
    /// non-OK result.
    pub fn check_pending_flex_service(&self, host: &str, description: &str, state: ServiceState) {
        if state == ServiceState::Ok {
            return;
        }
        self.start_pending_flex(host, Some(description));
    }

    fn start_pending_flex(&self, host: &str, description: Option<&str>) {
        let now = unix_now();
        let due: Vec<u64> = {
            let mut inner = self.inner.lock();
            let ids: Vec<u64> = inner
                .downtimes
                .values()
                .filter(|d| {
                    d.host_name == host
                        && d.service_description.as_deref() == description
                        && !d.fixed
                        && !d.in_effect
                        && d.triggered_by == 0
                        && d.start_time <= now
                        && now <= d.end_time
                })
                .map(|d| d.id)
                .collect();
            for id in &ids {
                if let Some(d) = inner.downtimes.get_mut(id) {
                    d.flex_started_at = Some(now);
                }
            }
            ids
        };
        for id in due {
            self.handle_start(id);
        }
    }

    // -- lookups -------------------------------------------------------------

    pub fn get(&self, id: u64) -> Option<Downtime> {
        self.inner.lock().downtimes.get(&id).cloned()
    }

    /// All downtimes ordered by start time, untriggered before triggered on
    /// ties.
    pub fn all(&self) -> Vec<Downtime> {
        let mut out: Vec<Downtime> = self.inner.lock().downtimes.values().cloned().collect();
        out.sort_by_key(|d| (d.start_time, d.triggered_by != 0, d.id));
        out
    }

    /// Cancel every downtime on a host and on its services.
    pub fn delete_by_host(&self, host: &str) {
        let ids: Vec<u64> = {
            let inner = self.inner.lock();
            inner
                .downtimes
                .values()
                .filter(|d| d.host_name == host)
                .map(|d| d.id)
                .collect()
        };
        for id in ids {
            self.unschedule(id);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().downtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().downtimes.is_empty()
    }

    // -- internals -----------------------------------------------------------

    fn downtime_comment(&self, d: &Downtime) -> Comment {
        let what = if d.service_description.is_some() {
            "service"
        } else {
            "host"
        };
        let text = if d.fixed {
            format!(
                "This {what} has been scheduled for fixed downtime from {} to {}.",
                fmt_time(d.start_time),
                fmt_time(d.end_time)
            )
        } else {
            format!(
                "This {what} has been scheduled for flexible downtime starting between {} and {} and lasting for {} seconds.",
                fmt_time(d.start_time),
                fmt_time(d.end_time),
                d.duration
            )
        };
        Comment {
            id: 0,
            host_name: d.host_name.clone(),
            service_description: d.service_description.clone(),
            entry_type: CommentEntryType::Downtime,
            author: d.author.clone(),
            text,
            source: CommentSource::Internal,
            persistent: false,
            entry_time: d.entry_time,
            expire_time: None,
        }
    }

    /// Adjust the target's downtime depth, clamping at zero. Returns the new
    /// depth, or `None` when the target no longer resolves.
    fn bump_depth(&self, host: &str, description: Option<&str>, delta: i32) -> Option<u32> {
        match description {
            Some(desc) => {
                let row = self.store.service(host, desc)?;
                let mut s = row.write();
                s.scheduled_downtime_depth =
                    s.scheduled_downtime_depth.saturating_add_signed(delta);
                Some(s.scheduled_downtime_depth)
            }
            None => {
                let row = self.store.host(host)?;
                let mut h = row.write();
                h.scheduled_downtime_depth =
                    h.scheduled_downtime_depth.saturating_add_signed(delta);
                Some(h.scheduled_downtime_depth)
            }
        }
    }

    fn bump_pending(&self, host: &str, description: Option<&str>, delta: i32) {
        match description {
            Some(desc) => {
                if let Some(row) = self.store.service(host, desc) {
                    let mut s = row.write();
                    s.pending_flex_downtime = s.pending_flex_downtime.saturating_add_signed(delta);
                }
            }
            None => {
                if let Some(row) = self.store.host(host) {
                    let mut h = row.write();
                    h.pending_flex_downtime = h.pending_flex_downtime.saturating_add_signed(delta);
                }
            }
        }
    }

    fn alert(&self, d: &Downtime, verb: &str, text: &str) {
        match &d.service_description {
            Some(desc) => self.log.log(&format!(
                "SERVICE DOWNTIME ALERT: {};{desc};{verb}; Service {text}",
                d.host_name
            )),
            None => self.log.log(&format!(
                "HOST DOWNTIME ALERT: {};{verb}; Host {text}",
                d.host_name
            )),
        }
    }

    fn notify(&self, d: &Downtime, kind: NotificationType) {
        match &d.service_description {
            Some(desc) => {
                if let Some(row) = self.store.service(&d.host_name, desc) {
                    let snapshot = row.read().clone();
                    self.notifier.notify_service(&snapshot, kind, &d.comment);
                }
            }
            None => {
                if let Some(row) = self.store.host(&d.host_name) {
                    let snapshot = row.read().clone();
                    self.notifier.notify_host(&snapshot, kind, &d.comment);
                }
            }
        }
    }
}

fn triggered_ids(map: &BTreeMap<u64, Downtime>, id: u64) -> Vec<u64> {
    map.values()
        .filter(|d| d.triggered_by == id)
        .map(|d| d.id)
        .collect()
}

fn fmt_time(t: i64) -> String {
    Utc.timestamp_opt(t, 0)
        .single()
        .map_or_else(|| t.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::small_config;
    use crate::notifier::test_support::RecordingNotifier;

    fn fixture() -> (Arc<ObjectStore>, Arc<CommentManager>, Arc<RecordingNotifier>, DowntimeManager)
    {
        let store = Arc::new(ObjectStore::from_config(&small_config()).unwrap());
        let comments = Arc::new(CommentManager::new());
        let notifier = RecordingNotifier::new();
        let mgr = DowntimeManager::new(
            Arc::clone(&store),
            Arc::clone(&comments),
            Arc::new(MonitorLog::sink()),
            notifier.clone(),
        );
        (store, comments, notifier, mgr)
    }

    fn host_depth(store: &ObjectStore, name: &str) -> u32 {
        store.host(name).unwrap().read().scheduled_downtime_depth
    }

    fn fixed(host: &str, start: i64, end: i64) -> Downtime {
        Downtime::new(host, None, start, end, true, 0, 0, "ops", "maintenance")
    }

    #[test]
    fn test_schedule_creates_comment() {
        let (_store, comments, _n, mgr) = fixture();
        let id = mgr.schedule(fixed("web1", 100, 200));
        let d = mgr.get(id).unwrap();
        assert!(d.comment_id > 0);
        let c = comments.get(d.comment_id).unwrap();
        assert_eq!(c.entry_type, CommentEntryType::Downtime);
        assert!(c.text.contains("fixed downtime"));
    }

    #[test]
    fn test_start_and_end_transition_depth_through_zero() {
        let (store, _c, notifier, mgr) = fixture();
        let id = mgr.schedule(fixed("web1", 100, 200));
        mgr.handle_start(id);
        assert_eq!(host_depth(&store, "web1"), 1);
        // idempotent
        mgr.handle_start(id);
        assert_eq!(host_depth(&store, "web1"), 1);
        mgr.handle_end(id);
        assert_eq!(host_depth(&store, "web1"), 0);
        assert!(mgr.get(id).is_none());

        let kinds: Vec<_> = notifier.take().into_iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![NotificationType::DowntimeStart, NotificationType::DowntimeEnd]
        );
    }

    #[test]
    fn test_triggered_cascade_start_and_unschedule() {
        let (store, comments, _n, mgr) = fixture();
        let a = mgr.schedule(fixed("web1", 100, 7300));
        let mut b = fixed("web1", 100, 7300);
        b.triggered_by = a;
        let b = mgr.schedule(b);

        mgr.handle_start(a);
        assert_eq!(host_depth(&store, "web1"), 2, "A direct + B triggered");

        mgr.unschedule(a);
        assert_eq!(host_depth(&store, "web1"), 0);
        assert!(mgr.get(a).is_none());
        assert!(mgr.get(b).is_none());
        assert!(comments.is_empty(), "both downtime comments removed");
    }

    #[test]
    fn test_overlapping_downtimes_second_stop_is_silent() {
        let (store, _c, notifier, mgr) = fixture();
        let a = mgr.schedule(fixed("web1", 100, 200));
        let b = mgr.schedule(fixed("web1", 100, 200));
        mgr.handle_start(a);
        mgr.handle_start(b);
        assert_eq!(host_depth(&store, "web1"), 2);
        notifier.take();

        mgr.handle_end(a);
        assert_eq!(host_depth(&store, "web1"), 1);
        assert_eq!(notifier.count(), 0, "depth did not reach zero");
        mgr.handle_end(b);
        assert_eq!(host_depth(&store, "web1"), 0);
        assert_eq!(notifier.count(), 1);
    }

    #[test]
    fn test_flex_downtime_waits_for_problem() {
        let (store, _c, _n, mgr) = fixture();
        let now = unix_now();
        let d = Downtime::new("web1", None, now - 10, now + 3600, false, 600, 0, "ops", "flex");
        let id = mgr.schedule(d);

        let host = store.host("web1").unwrap();
        assert_eq!(host.read().pending_flex_downtime, 1);
        assert_eq!(host.read().scheduled_downtime_depth, 0);

        // An UP result must not start it.
        mgr.check_pending_flex_host("web1", HostState::Up);
        assert_eq!(host.read().scheduled_downtime_depth, 0);

        mgr.check_pending_flex_host("web1", HostState::Down);
        assert_eq!(host.read().scheduled_downtime_depth, 1);
        assert_eq!(host.read().pending_flex_downtime, 0);
        assert!(mgr.get(id).unwrap().flex_started_at.is_some());
    }

    #[test]
    fn test_expired_never_started_downtime_is_dropped() {
        let (store, comments, notifier, mgr) = fixture();
        let id = mgr.schedule(Downtime::new(
            "web1", None, 100, 200, false, 60, 0, "ops", "stale",
        ));
        assert_eq!(store.host("web1").unwrap().read().pending_flex_downtime, 1);

        mgr.check_expired(1_000_000);
        assert!(mgr.get(id).is_none());
        assert_eq!(store.host("web1").unwrap().read().pending_flex_downtime, 0);
        assert!(comments.is_empty());
        assert_eq!(notifier.count(), 1);
        assert_eq!(host_depth(&store, "web1"), 0);
    }

    #[test]
    fn test_service_downtime_touches_service_depth() {
        let (store, _c, _n, mgr) = fixture();
        let d = Downtime::new("web1", Some("http"), 100, 200, true, 0, 0, "ops", "svc work");
        let id = mgr.schedule(d);
        mgr.handle_start(id);
        let svc = store.service("web1", "http").unwrap();
        assert_eq!(svc.read().scheduled_downtime_depth, 1);
        assert_eq!(host_depth(&store, "web1"), 0);
    }

    #[test]
    fn test_ids_strictly_increase_and_retention_bumps_seed() {
        let (_s, _c, _n, mgr) = fixture();
        let mut d = fixed("web1", 100, 200);
        d.id = 77;
        mgr.schedule_with_id(d);
        let next = mgr.schedule(fixed("web1", 100, 200));
        assert_eq!(next, 78);
    }
}
