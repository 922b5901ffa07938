//! Check execution.
//!
//! The scheduler emits [`CheckRequest`]s through the [`CheckRunner`]
//! contract; the shipped [`ShellCheckRunner`] runs the command line under
//! `sh -c` on the tokio blocking-friendly process API, bounded by the
//! per-check timeout. A timed-out check synthesizes a CRITICAL result, a
//! spawn failure an UNKNOWN one. The daemon never learns the difference
//! between a slow plugin and a dead one except through the result itself.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use crate::objects::{Host, Service};
use crate::results::{CheckResult, CheckType};
use crate::unix_now;

/// A check the scheduler wants executed.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub host_name: String,
    /// `None` for host checks.
    pub service_description: Option<String>,
    /// Fully expanded command line.
    pub command_line: String,
    pub timeout: Duration,
    /// When the scheduler intended this check to run; used for latency.
    pub scheduled_at: i64,
}

/// Contract between the scheduler and whatever executes checks.
///
/// `spawn_check` must not block: implementations hand the work to their own
/// workers and deliver the result on `results`. A dropped receiver means
/// the daemon is shutting down and the result is discarded.
pub trait CheckRunner: Send + Sync + 'static {
    fn spawn_check(&self, request: CheckRequest, results: mpsc::Sender<CheckResult>);
}

/// Runs check command lines under `sh -c`.
pub struct ShellCheckRunner;

impl CheckRunner for ShellCheckRunner {
    fn spawn_check(&self, request: CheckRequest, results: mpsc::Sender<CheckResult>) {
        tokio::spawn(async move {
            let result = run_one(&request).await;
            // Receiver closed == shutdown in progress; drop silently.
            let _ = results.send(result).await;
        });
    }
}

async fn run_one(request: &CheckRequest) -> CheckResult {
    let start_time = unix_now();
    let latency = (start_time - request.scheduled_at).max(0) as f64;

    let spawned = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&request.command_line)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            return CheckResult {
                host_name: request.host_name.clone(),
                service_description: request.service_description.clone(),
                return_code: 3,
                output: format!("(Failed to execute check command: {e})"),
                check_type: CheckType::Active,
                exited_ok: false,
                start_time,
                finish_time: unix_now(),
                latency,
            };
        }
    };

    let mut stdout = child.stdout.take();
    let wait = async {
        let mut output = String::new();
        if let Some(out) = stdout.as_mut() {
            let _ = out.read_to_string(&mut output).await;
        }
        let status = child.wait().await;
        (status, output)
    };

    match tokio::time::timeout(request.timeout, wait).await {
        Ok((Ok(status), output)) => CheckResult {
            host_name: request.host_name.clone(),
            service_description: request.service_description.clone(),
            return_code: status.code().unwrap_or(3),
            output,
            check_type: CheckType::Active,
            exited_ok: status.code().is_some(),
            start_time,
            finish_time: unix_now(),
            latency,
        },
        Ok((Err(e), _)) => CheckResult {
            host_name: request.host_name.clone(),
            service_description: request.service_description.clone(),
            return_code: 3,
            output: format!("(Check command wait failed: {e})"),
            check_type: CheckType::Active,
            exited_ok: false,
            start_time,
            finish_time: unix_now(),
            latency,
        },
        Err(_) => CheckResult {
            host_name: request.host_name.clone(),
            service_description: request.service_description.clone(),
            return_code: 2,
            output: format!(
                "(Check timed out after {} seconds)",
                request.timeout.as_secs()
            ),
            check_type: CheckType::Active,
            exited_ok: true,
            start_time,
            finish_time: unix_now(),
            latency,
        },
    }
}

/// Expand a `name!arg1!arg2` check-command reference against its command
/// definition, substituting the standard macros. Unknown macros are left in
/// place.
pub fn expand_command(
    raw_reference: &str,
    template: &str,
    host: &Host,
    service: Option<&Service>,
) -> String {
    let mut parts = raw_reference.split('!');
    let _name = parts.next();
    let args: Vec<&str> = parts.collect();

    let mut line = template.to_string();
    line = line.replace("$HOSTNAME$", &host.name);
    line = line.replace("$HOSTADDRESS$", &host.address);
    line = line.replace("$HOSTSTATE$", host.state.name());
    if let Some(svc) = service {
        line = line.replace("$SERVICEDESC$", &svc.description);
        line = line.replace("$SERVICESTATE$", svc.state.name());
    }
    for (i, arg) in args.iter().enumerate() {
        line = line.replace(&format!("$ARG{}$", i + 1), arg);
    }
    line
}
