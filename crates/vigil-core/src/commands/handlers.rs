//! Built-in command handlers.
//!
//! Handlers run on the scheduler loop (dispatch happens between events), so
//! they may mutate rows and managers directly. Each handler parses its
//! arguments, resolves its target, and mutates state through the managers,
//! never by reaching around them. Per-object toggles set the matching
//! `modified_attributes` bit so retention reload can tell operator
//! overrides from configured defaults.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use super::{CommandRegistry, RawCommand};
use crate::comments::{Comment, CommentEntryType, CommentManager, CommentSource};
use crate::downtimes::{Downtime, DowntimeManager};
use crate::error::CommandError;
use crate::notifier::{NotificationType, Notifier};
use crate::objects::{modattr, Acknowledgement, Host, ObjectStore, ProgramState, Service};
use crate::results::{CheckResult, CheckType};
use crate::scheduler::{Event, EventKind, CHECK_OPTION_FORCE_EXECUTION};
use crate::unix_now;

/// Everything the built-in handlers touch.
#[derive(Clone)]
pub struct HandlerContext {
    pub store: Arc<ObjectStore>,
    pub comments: Arc<CommentManager>,
    pub downtimes: Arc<DowntimeManager>,
    pub globals: Arc<ProgramState>,
    pub notifier: Arc<dyn Notifier>,
    /// Injects events into the scheduler queue.
    pub event_tx: mpsc::UnboundedSender<Event>,
    /// Delivers passive check results to the loop.
    pub result_tx: mpsc::Sender<CheckResult>,
    pub shutdown_tx: broadcast::Sender<()>,
}

// -- argument helpers --------------------------------------------------------

fn arg<'a>(cmd: &'a RawCommand, idx: usize) -> Result<&'a str, CommandError> {
    cmd.args
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| CommandError::WrongArgCount {
            name:     cmd.name.clone(),
            expected: idx + 1,
            got:      cmd.args.len(),
        })
}

fn int_arg(cmd: &RawCommand, idx: usize) -> Result<i64, CommandError> {
    let raw = arg(cmd, idx)?;
    raw.trim().parse().map_err(|_| CommandError::BadArgument {
        name: cmd.name.clone(),
        arg:  raw.to_string(),
    })
}

fn host_row(
    ctx: &HandlerContext,
    cmd: &RawCommand,
    idx: usize,
) -> Result<crate::objects::HostRef, CommandError> {
    let name = arg(cmd, idx)?;
    ctx.store
        .host(name)
        .ok_or_else(|| CommandError::UnknownTarget {
            name:   cmd.name.clone(),
            target: name.to_string(),
        })
}

fn service_row(
    ctx: &HandlerContext,
    cmd: &RawCommand,
    host_idx: usize,
) -> Result<crate::objects::ServiceRef, CommandError> {
    let host = arg(cmd, host_idx)?;
    let desc = arg(cmd, host_idx + 1)?;
    ctx.store
        .service(host, desc)
        .ok_or_else(|| CommandError::UnknownTarget {
            name:   cmd.name.clone(),
            target: format!("{host}/{desc}"),
        })
}

// -- handler constructors ----------------------------------------------------

fn global_toggle(
    ctx: &HandlerContext,
    field: fn(&ProgramState) -> &AtomicBool,
    value: bool,
) -> impl Fn(&RawCommand) -> Result<(), CommandError> {
    let globals = Arc::clone(&ctx.globals);
    move |_cmd| {
        field(&globals).store(value, Ordering::Relaxed);
        globals.modified_attributes.fetch_or(1, Ordering::Relaxed);
        Ok(())
    }
}

fn host_toggle(
    ctx: &HandlerContext,
    set: fn(&mut Host, bool),
    value: bool,
    bit: u64,
) -> impl Fn(&RawCommand) -> Result<(), CommandError> {
    let ctx = ctx.clone();
    move |cmd| {
        let row = host_row(&ctx, cmd, 0)?;
        let mut h = row.write();
        set(&mut h, value);
        h.modified_attributes |= bit;
        Ok(())
    }
}

fn service_toggle(
    ctx: &HandlerContext,
    set: fn(&mut Service, bool),
    value: bool,
    bit: u64,
) -> impl Fn(&RawCommand) -> Result<(), CommandError> {
    let ctx = ctx.clone();
    move |cmd| {
        let row = service_row(&ctx, cmd, 0)?;
        let mut s = row.write();
        set(&mut s, value);
        s.modified_attributes |= bit;
        Ok(())
    }
}

// -- registration ------------------------------------------------------------

/// Register every built-in command handler.
#[allow(clippy::too_many_lines)]
pub fn register_builtin(registry: &CommandRegistry, ctx: &HandlerContext) {
    // global toggles
    registry.register(
        "ENABLE_NOTIFICATIONS",
        global_toggle(ctx, |g| &g.enable_notifications, true),
    );
    registry.register(
        "DISABLE_NOTIFICATIONS",
        global_toggle(ctx, |g| &g.enable_notifications, false),
    );
    registry.register(
        "START_EXECUTING_SVC_CHECKS",
        global_toggle(ctx, |g| &g.execute_service_checks, true),
    );
    registry.register(
        "STOP_EXECUTING_SVC_CHECKS",
        global_toggle(ctx, |g| &g.execute_service_checks, false),
    );
    registry.register(
        "START_EXECUTING_HOST_CHECKS",
        global_toggle(ctx, |g| &g.execute_host_checks, true),
    );
    registry.register(
        "STOP_EXECUTING_HOST_CHECKS",
        global_toggle(ctx, |g| &g.execute_host_checks, false),
    );
    registry.register(
        "START_ACCEPTING_PASSIVE_SVC_CHECKS",
        global_toggle(ctx, |g| &g.accept_passive_service_checks, true),
    );
    registry.register(
        "STOP_ACCEPTING_PASSIVE_SVC_CHECKS",
        global_toggle(ctx, |g| &g.accept_passive_service_checks, false),
    );
    registry.register(
        "START_ACCEPTING_PASSIVE_HOST_CHECKS",
        global_toggle(ctx, |g| &g.accept_passive_host_checks, true),
    );
    registry.register(
        "STOP_ACCEPTING_PASSIVE_HOST_CHECKS",
        global_toggle(ctx, |g| &g.accept_passive_host_checks, false),
    );
    registry.register(
        "ENABLE_EVENT_HANDLERS",
        global_toggle(ctx, |g| &g.enable_event_handlers, true),
    );
    registry.register(
        "DISABLE_EVENT_HANDLERS",
        global_toggle(ctx, |g| &g.enable_event_handlers, false),
    );
    registry.register(
        "ENABLE_FLAP_DETECTION",
        global_toggle(ctx, |g| &g.enable_flap_detection, true),
    );
    registry.register(
        "DISABLE_FLAP_DETECTION",
        global_toggle(ctx, |g| &g.enable_flap_detection, false),
    );

    // per-host toggles
    registry.register(
        "ENABLE_HOST_NOTIFICATIONS",
        host_toggle(ctx, |h, v| h.notifications_enabled = v, true, modattr::NOTIFICATIONS_ENABLED),
    );
    registry.register(
        "DISABLE_HOST_NOTIFICATIONS",
        host_toggle(ctx, |h, v| h.notifications_enabled = v, false, modattr::NOTIFICATIONS_ENABLED),
    );
    registry.register(
        "ENABLE_HOST_CHECK",
        host_toggle(ctx, |h, v| h.active_checks_enabled = v, true, modattr::ACTIVE_CHECKS_ENABLED),
    );
    registry.register(
        "DISABLE_HOST_CHECK",
        host_toggle(ctx, |h, v| h.active_checks_enabled = v, false, modattr::ACTIVE_CHECKS_ENABLED),
    );
    registry.register(
        "ENABLE_PASSIVE_HOST_CHECKS",
        host_toggle(ctx, |h, v| h.passive_checks_enabled = v, true, modattr::PASSIVE_CHECKS_ENABLED),
    );
    registry.register(
        "DISABLE_PASSIVE_HOST_CHECKS",
        host_toggle(ctx, |h, v| h.passive_checks_enabled = v, false, modattr::PASSIVE_CHECKS_ENABLED),
    );
    registry.register(
        "ENABLE_HOST_FLAP_DETECTION",
        host_toggle(ctx, |h, v| h.flap_detection_enabled = v, true, modattr::FLAP_DETECTION_ENABLED),
    );
    registry.register(
        "DISABLE_HOST_FLAP_DETECTION",
        host_toggle(ctx, |h, v| h.flap_detection_enabled = v, false, modattr::FLAP_DETECTION_ENABLED),
    );

    // per-service toggles
    registry.register(
        "ENABLE_SVC_NOTIFICATIONS",
        service_toggle(ctx, |s, v| s.notifications_enabled = v, true, modattr::NOTIFICATIONS_ENABLED),
    );
    registry.register(
        "DISABLE_SVC_NOTIFICATIONS",
        service_toggle(ctx, |s, v| s.notifications_enabled = v, false, modattr::NOTIFICATIONS_ENABLED),
    );
    registry.register(
        "ENABLE_SVC_CHECK",
        service_toggle(ctx, |s, v| s.active_checks_enabled = v, true, modattr::ACTIVE_CHECKS_ENABLED),
    );
    registry.register(
        "DISABLE_SVC_CHECK",
        service_toggle(ctx, |s, v| s.active_checks_enabled = v, false, modattr::ACTIVE_CHECKS_ENABLED),
    );
    registry.register(
        "ENABLE_PASSIVE_SVC_CHECKS",
        service_toggle(ctx, |s, v| s.passive_checks_enabled = v, true, modattr::PASSIVE_CHECKS_ENABLED),
    );
    registry.register(
        "DISABLE_PASSIVE_SVC_CHECKS",
        service_toggle(ctx, |s, v| s.passive_checks_enabled = v, false, modattr::PASSIVE_CHECKS_ENABLED),
    );
    registry.register(
        "ENABLE_SVC_FLAP_DETECTION",
        service_toggle(ctx, |s, v| s.flap_detection_enabled = v, true, modattr::FLAP_DETECTION_ENABLED),
    );
    registry.register(
        "DISABLE_SVC_FLAP_DETECTION",
        service_toggle(ctx, |s, v| s.flap_detection_enabled = v, false, modattr::FLAP_DETECTION_ENABLED),
    );

    register_check_commands(registry, ctx);
    register_passive_results(registry, ctx);
    register_acknowledgements(registry, ctx);
    register_downtime_commands(registry, ctx);
    register_comment_commands(registry, ctx);

    // shutdown
    for name in ["SHUTDOWN_PROCESS", "SHUTDOWN_PROGRAM"] {
        let shutdown = ctx.shutdown_tx.clone();
        registry.register(name, move |_cmd| {
            let _ = shutdown.send(());
            Ok(())
        });
    }
}

fn register_check_commands(registry: &CommandRegistry, ctx: &HandlerContext) {
    for (name, force) in [
        ("SCHEDULE_SVC_CHECK", 0),
        ("SCHEDULE_FORCED_SVC_CHECK", CHECK_OPTION_FORCE_EXECUTION),
    ] {
        let ctx = ctx.clone();
        registry.register(name, move |cmd| {
            let row = service_row(&ctx, cmd, 0)?;
            let at = int_arg(cmd, 2)?;
            let (host_name, description) = {
                let mut s = row.write();
                s.next_check = at;
                (s.host_name.clone(), s.description.clone())
            };
            let _ = ctx.event_tx.send(Event::at(
                at,
                EventKind::ServiceCheck {
                    host_name,
                    description,
                    options: force,
                },
            ));
            Ok(())
        });
    }

    for (name, force) in [
        ("SCHEDULE_HOST_CHECK", 0),
        ("SCHEDULE_FORCED_HOST_CHECK", CHECK_OPTION_FORCE_EXECUTION),
    ] {
        let ctx = ctx.clone();
        registry.register(name, move |cmd| {
            let row = host_row(&ctx, cmd, 0)?;
            let at = int_arg(cmd, 1)?;
            let host_name = {
                let mut h = row.write();
                h.next_check = at;
                h.name.clone()
            };
            let _ = ctx.event_tx.send(Event::at(
                at,
                EventKind::HostCheck {
                    host_name,
                    options: force,
                },
            ));
            Ok(())
        });
    }

    let fctx = ctx.clone();
    registry.register("SCHEDULE_FORCED_HOST_SVC_CHECKS", move |cmd| {
        let row = host_row(&fctx, cmd, 0)?;
        let at = int_arg(cmd, 1)?;
        let (host_name, descriptions) = {
            let h = row.read();
            (h.name.clone(), h.services.clone())
        };
        for description in descriptions {
            let _ = fctx.event_tx.send(Event::at(
                at,
                EventKind::ServiceCheck {
                    host_name: host_name.clone(),
                    description,
                    options: CHECK_OPTION_FORCE_EXECUTION,
                },
            ));
        }
        Ok(())
    });
}

fn register_passive_results(registry: &CommandRegistry, ctx: &HandlerContext) {
    let sctx = ctx.clone();
    registry.register("PROCESS_SERVICE_CHECK_RESULT", move |cmd| {
        let host = arg(cmd, 0)?.to_string();
        let desc = arg(cmd, 1)?.to_string();
        let rc = int_arg(cmd, 2)? as i32;
        let output = arg(cmd, 3)?.to_string();
        let now = unix_now();
        let result = CheckResult {
            host_name: host,
            service_description: Some(desc),
            return_code: rc,
            output,
            check_type: CheckType::Passive,
            exited_ok: true,
            start_time: cmd.entry_time.min(now),
            finish_time: now,
            latency: 0.0,
        };
        if sctx.result_tx.try_send(result).is_err() {
            warn!("result channel full, passive service result dropped");
        }
        Ok(())
    });

    let hctx = ctx.clone();
    registry.register("PROCESS_HOST_CHECK_RESULT", move |cmd| {
        let host = arg(cmd, 0)?.to_string();
        let rc = int_arg(cmd, 1)? as i32;
        let output = arg(cmd, 2)?.to_string();
        let now = unix_now();
        let result = CheckResult {
            host_name: host,
            service_description: None,
            return_code: rc,
            output,
            check_type: CheckType::Passive,
            exited_ok: true,
            start_time: cmd.entry_time.min(now),
            finish_time: now,
            latency: 0.0,
        };
        if hctx.result_tx.try_send(result).is_err() {
            warn!("result channel full, passive host result dropped");
        }
        Ok(())
    });
}

fn register_acknowledgements(registry: &CommandRegistry, ctx: &HandlerContext) {
    // ACKNOWLEDGE_SVC_PROBLEM;host;svc;sticky;notify;persistent;author;comment
    let actx = ctx.clone();
    registry.register("ACKNOWLEDGE_SVC_PROBLEM", move |cmd| {
        let row = service_row(&actx, cmd, 0)?;
        let sticky = int_arg(cmd, 2)? == 2;
        let notify = int_arg(cmd, 3)? != 0;
        let persistent = int_arg(cmd, 4)? != 0;
        let author = arg(cmd, 5)?;
        let text = arg(cmd, 6)?;

        let snapshot = {
            let mut s = row.write();
            if !s.is_problem() {
                return Ok(());
            }
            s.acknowledgement = if sticky {
                Acknowledgement::Sticky
            } else {
                Acknowledgement::Normal
            };
            s.clone()
        };
        actx.comments.add(Comment {
            id: 0,
            host_name: snapshot.host_name.clone(),
            service_description: Some(snapshot.description.clone()),
            entry_type: CommentEntryType::Acknowledgement,
            author: author.to_string(),
            text: text.to_string(),
            source: CommentSource::External,
            persistent,
            entry_time: 0,
            expire_time: None,
        });
        if notify {
            actx.notifier
                .notify_service(&snapshot, NotificationType::Acknowledgement, text);
        }
        Ok(())
    });

    // ACKNOWLEDGE_HOST_PROBLEM;host;sticky;notify;persistent;author;comment
    let hctx = ctx.clone();
    registry.register("ACKNOWLEDGE_HOST_PROBLEM", move |cmd| {
        let row = host_row(&hctx, cmd, 0)?;
        let sticky = int_arg(cmd, 1)? == 2;
        let notify = int_arg(cmd, 2)? != 0;
        let persistent = int_arg(cmd, 3)? != 0;
        let author = arg(cmd, 4)?;
        let text = arg(cmd, 5)?;

        let snapshot = {
            let mut h = row.write();
            if !h.is_problem() {
                return Ok(());
            }
            h.acknowledgement = if sticky {
                Acknowledgement::Sticky
            } else {
                Acknowledgement::Normal
            };
            h.clone()
        };
        hctx.comments.add(Comment {
            id: 0,
            host_name: snapshot.name.clone(),
            service_description: None,
            entry_type: CommentEntryType::Acknowledgement,
            author: author.to_string(),
            text: text.to_string(),
            source: CommentSource::External,
            persistent,
            entry_time: 0,
            expire_time: None,
        });
        if notify {
            hctx.notifier
                .notify_host(&snapshot, NotificationType::Acknowledgement, text);
        }
        Ok(())
    });

    let rctx = ctx.clone();
    registry.register("REMOVE_SVC_ACKNOWLEDGEMENT", move |cmd| {
        let row = service_row(&rctx, cmd, 0)?;
        let (host, desc) = {
            let mut s = row.write();
            s.acknowledgement = Acknowledgement::None;
            (s.host_name.clone(), s.description.clone())
        };
        rctx.comments.delete_service_ack_comments(&host, &desc);
        Ok(())
    });

    let rhctx = ctx.clone();
    registry.register("REMOVE_HOST_ACKNOWLEDGEMENT", move |cmd| {
        let row = host_row(&rhctx, cmd, 0)?;
        let host = {
            let mut h = row.write();
            h.acknowledgement = Acknowledgement::None;
            h.name.clone()
        };
        rhctx.comments.delete_host_ack_comments(&host);
        Ok(())
    });
}

fn register_downtime_commands(registry: &CommandRegistry, ctx: &HandlerContext) {
    // SCHEDULE_SVC_DOWNTIME;host;svc;start;end;fixed;trigger_id;duration;author;comment
    let sctx = ctx.clone();
    registry.register("SCHEDULE_SVC_DOWNTIME", move |cmd| {
        let row = service_row(&sctx, cmd, 0)?;
        let d = downtime_from_args(cmd, 2, arg(cmd, 0)?, Some(arg(cmd, 1)?))?;
        let id = sctx.downtimes.schedule(d);
        start_if_due(&sctx, id);
        let state = row.read().state;
        sctx.downtimes
            .check_pending_flex_service(arg(cmd, 0)?, arg(cmd, 1)?, state);
        Ok(())
    });

    // SCHEDULE_HOST_DOWNTIME;host;start;end;fixed;trigger_id;duration;author;comment
    let hctx = ctx.clone();
    registry.register("SCHEDULE_HOST_DOWNTIME", move |cmd| {
        let row = host_row(&hctx, cmd, 0)?;
        let d = downtime_from_args(cmd, 1, arg(cmd, 0)?, None)?;
        let id = hctx.downtimes.schedule(d);
        start_if_due(&hctx, id);
        let state = row.read().state;
        hctx.downtimes.check_pending_flex_host(arg(cmd, 0)?, state);
        Ok(())
    });

    // SCHEDULE_HOST_SVC_DOWNTIME;host;start;end;fixed;trigger_id;duration;author;comment
    let fctx = ctx.clone();
    registry.register("SCHEDULE_HOST_SVC_DOWNTIME", move |cmd| {
        let row = host_row(&fctx, cmd, 0)?;
        let host = arg(cmd, 0)?;
        let descriptions = row.read().services.clone();
        for desc in &descriptions {
            let d = downtime_from_args(cmd, 1, host, Some(desc))?;
            let id = fctx.downtimes.schedule(d);
            start_if_due(&fctx, id);
            if let Some(svc) = fctx.store.service(host, desc) {
                let state = svc.read().state;
                fctx.downtimes.check_pending_flex_service(host, desc, state);
            }
        }
        Ok(())
    });

    for name in ["DEL_SVC_DOWNTIME", "DEL_HOST_DOWNTIME"] {
        let dctx = ctx.clone();
        registry.register(name, move |cmd| {
            let id = int_arg(cmd, 0)? as u64;
            dctx.downtimes.unschedule(id);
            Ok(())
        });
    }
}

/// Parse the common downtime argument tail starting at `base`:
/// `start;end;fixed;trigger_id;duration;author;comment`.
fn downtime_from_args(
    cmd: &RawCommand,
    base: usize,
    host: &str,
    service: Option<&str>,
) -> Result<Downtime, CommandError> {
    let start = int_arg(cmd, base)?;
    let end = int_arg(cmd, base + 1)?;
    let fixed = int_arg(cmd, base + 2)? != 0;
    let trigger = int_arg(cmd, base + 3)? as u64;
    let duration = int_arg(cmd, base + 4)?;
    let author = arg(cmd, base + 5)?;
    let comment = arg(cmd, base + 6)?;
    let mut d = Downtime::new(host, service, start, end, fixed, duration, trigger, author, comment);
    d.entry_time = cmd.entry_time;
    Ok(d)
}

/// Fixed downtimes whose window is already open start immediately.
fn start_if_due(ctx: &HandlerContext, id: u64) {
    let now = unix_now();
    if let Some(d) = ctx.downtimes.get(id) {
        if d.fixed && d.start_time <= now && now < d.end_time {
            ctx.downtimes.handle_start(id);
        }
    }
}

fn register_comment_commands(registry: &CommandRegistry, ctx: &HandlerContext) {
    // ADD_SVC_COMMENT;host;svc;persistent;author;comment
    let sctx = ctx.clone();
    registry.register("ADD_SVC_COMMENT", move |cmd| {
        let _ = service_row(&sctx, cmd, 0)?;
        let persistent = int_arg(cmd, 2)? != 0;
        sctx.comments.add(Comment {
            id: 0,
            host_name: arg(cmd, 0)?.to_string(),
            service_description: Some(arg(cmd, 1)?.to_string()),
            entry_type: CommentEntryType::User,
            author: arg(cmd, 3)?.to_string(),
            text: arg(cmd, 4)?.to_string(),
            source: CommentSource::External,
            persistent,
            entry_time: 0,
            expire_time: None,
        });
        Ok(())
    });

    // ADD_HOST_COMMENT;host;persistent;author;comment
    let hctx = ctx.clone();
    registry.register("ADD_HOST_COMMENT", move |cmd| {
        let _ = host_row(&hctx, cmd, 0)?;
        let persistent = int_arg(cmd, 1)? != 0;
        hctx.comments.add(Comment {
            id: 0,
            host_name: arg(cmd, 0)?.to_string(),
            service_description: None,
            entry_type: CommentEntryType::User,
            author: arg(cmd, 2)?.to_string(),
            text: arg(cmd, 3)?.to_string(),
            source: CommentSource::External,
            persistent,
            entry_time: 0,
            expire_time: None,
        });
        Ok(())
    });

    for name in ["DEL_SVC_COMMENT", "DEL_HOST_COMMENT"] {
        let dctx = ctx.clone();
        registry.register(name, move |cmd| {
            let id = int_arg(cmd, 0)? as u64;
            dctx.comments.delete(id);
            Ok(())
        });
    }

    let dactx = ctx.clone();
    registry.register("DEL_ALL_SVC_COMMENTS", move |cmd| {
        let _ = service_row(&dactx, cmd, 0)?;
        dactx
            .comments
            .delete_all_for_service(arg(cmd, 0)?, arg(cmd, 1)?);
        Ok(())
    });

    let dahctx = ctx.clone();
    registry.register("DEL_ALL_HOST_COMMENTS", move |cmd| {
        let _ = host_row(&dahctx, cmd, 0)?;
        dahctx.comments.delete_all_for_host(arg(cmd, 0)?);
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_line;
    use crate::config::test_support::small_config;
    use crate::logfile::MonitorLog;
    use crate::notifier::test_support::RecordingNotifier;

    struct Fixture {
        registry: CommandRegistry,
        ctx: HandlerContext,
        event_rx: mpsc::UnboundedReceiver<Event>,
        result_rx: mpsc::Receiver<CheckResult>,
    }

    fn fixture() -> Fixture {
        let cfg = small_config();
        let store = Arc::new(ObjectStore::from_config(&cfg).unwrap());
        let comments = Arc::new(CommentManager::new());
        let globals = Arc::new(ProgramState::new(&cfg.daemon, 0));
        let notifier = RecordingNotifier::new();
        let downtimes = Arc::new(DowntimeManager::new(
            Arc::clone(&store),
            Arc::clone(&comments),
            Arc::new(MonitorLog::sink()),
            notifier.clone(),
        ));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::channel(16);
        let (shutdown_tx, _) = broadcast::channel(1);
        let ctx = HandlerContext {
            store,
            comments,
            downtimes,
            globals,
            notifier,
            event_tx,
            result_tx,
            shutdown_tx,
        };
        let registry = CommandRegistry::new();
        register_builtin(&registry, &ctx);
        Fixture {
            registry,
            ctx,
            event_rx,
            result_rx,
        }
    }

    fn run(fx: &Fixture, line: &str) {
        let cmd = parse_line(line).unwrap();
        fx.registry.dispatch(&cmd).unwrap();
    }

    #[test]
    fn test_global_toggle() {
        let fx = fixture();
        run(&fx, "[100] DISABLE_NOTIFICATIONS");
        assert!(!fx.ctx.globals.notifications_enabled());
        run(&fx, "[101] ENABLE_NOTIFICATIONS");
        assert!(fx.ctx.globals.notifications_enabled());
    }

    #[test]
    fn test_service_toggle_sets_modattr() {
        let fx = fixture();
        run(&fx, "[100] DISABLE_SVC_NOTIFICATIONS;web1;http");
        let svc = fx.ctx.store.service("web1", "http").unwrap();
        let s = svc.read();
        assert!(!s.notifications_enabled);
        assert_ne!(s.modified_attributes & modattr::NOTIFICATIONS_ENABLED, 0);
    }

    #[test]
    fn test_unknown_target_is_error() {
        let fx = fixture();
        let cmd = parse_line("[100] DISABLE_SVC_NOTIFICATIONS;ghost;http").unwrap();
        assert!(matches!(
            fx.registry.dispatch(&cmd),
            Err(CommandError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn test_forced_check_injects_event() {
        let mut fx = fixture();
        run(&fx, "[100] SCHEDULE_FORCED_SVC_CHECK;web1;http;1700000500");
        let ev = fx.event_rx.try_recv().unwrap();
        assert_eq!(ev.run_time, 1_700_000_500);
        match ev.kind {
            EventKind::ServiceCheck {
                host_name,
                description,
                options,
            } => {
                assert_eq!(host_name, "web1");
                assert_eq!(description, "http");
                assert_ne!(options & CHECK_OPTION_FORCE_EXECUTION, 0);
            }
            other => panic!("unexpected event {other:?}"),
        }
        // next_check mirrors the request
        let svc = fx.ctx.store.service("web1", "http").unwrap();
        assert_eq!(svc.read().next_check, 1_700_000_500);
    }

    #[test]
    fn test_passive_result_goes_to_channel() {
        let mut fx = fixture();
        run(&fx, "[100] PROCESS_SERVICE_CHECK_RESULT;web1;http;2;it broke");
        let result = fx.result_rx.try_recv().unwrap();
        assert_eq!(result.return_code, 2);
        assert_eq!(result.check_type, CheckType::Passive);
        assert_eq!(result.output, "it broke");
    }

    #[test]
    fn test_acknowledge_requires_problem() {
        let fx = fixture();
        // Service is OK: the ack is a silent no-op.
        run(&fx, "[100] ACKNOWLEDGE_SVC_PROBLEM;web1;http;1;0;1;ops;noted");
        let svc = fx.ctx.store.service("web1", "http").unwrap();
        assert_eq!(svc.read().acknowledgement, Acknowledgement::None);
        assert!(fx.ctx.comments.is_empty());

        svc.write().state = crate::objects::ServiceState::Critical;
        run(&fx, "[101] ACKNOWLEDGE_SVC_PROBLEM;web1;http;2;0;1;ops;noted");
        assert_eq!(svc.read().acknowledgement, Acknowledgement::Sticky);
        assert_eq!(fx.ctx.comments.for_service("web1", "http").len(), 1);
    }

    #[test]
    fn test_schedule_host_downtime_open_window_starts() {
        let fx = fixture();
        let now = unix_now();
        run(
            &fx,
            &format!("[100] SCHEDULE_HOST_DOWNTIME;web1;{};{};1;0;0;ops;kernel upgrade", now - 10, now + 3600),
        );
        let host = fx.ctx.store.host("web1").unwrap();
        assert_eq!(host.read().scheduled_downtime_depth, 1);
        assert_eq!(fx.ctx.downtimes.len(), 1);
    }

    #[test]
    fn test_del_downtime_by_id() {
        let fx = fixture();
        let now = unix_now();
        run(
            &fx,
            &format!("[100] SCHEDULE_HOST_DOWNTIME;web1;{};{};1;0;0;ops;work", now - 10, now + 3600),
        );
        let id = fx.ctx.downtimes.all()[0].id;
        run(&fx, &format!("[101] DEL_HOST_DOWNTIME;{id}"));
        assert!(fx.ctx.downtimes.is_empty());
        let host = fx.ctx.store.host("web1").unwrap();
        assert_eq!(host.read().scheduled_downtime_depth, 0);
    }

    #[test]
    fn test_host_comment_roundtrip() {
        let fx = fixture();
        run(&fx, "[100] ADD_HOST_COMMENT;web1;1;ops;watch this one");
        let list = fx.ctx.comments.for_host("web1");
        assert_eq!(list.len(), 1);
        assert!(list[0].persistent);
        run(&fx, &format!("[101] DEL_HOST_COMMENT;{}", list[0].id));
        assert!(fx.ctx.comments.is_empty());
    }
}
