//! vigild - the Vigil monitoring daemon.
//!
//! Loads the configuration, wires the core together (object store,
//! managers, scheduler, command pipe, query server), and runs the event
//! loop until SIGTERM/SIGINT or a SHUTDOWN_* command.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use vigil_core::{
    register_builtin, unix_now, CommandPipe, CommandRegistry, CommentManager, DowntimeManager,
    HandlerContext, LogNotifier, MonitorLog, ObjectStore, ProgramState, ResultHandler,
    ResultPolicy, Scheduler, SchedulerConfig, ShellCheckRunner, VigilConfig, VigilError,
};
use vigil_livestatus::{ChannelSink, LivestatusServer, LivestatusState};

/// Nagios-compatible host/service monitoring daemon
#[derive(Parser)]
#[command(name = "vigild")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, value_name = "FILE", default_value = "/etc/vigil/vigil.toml")]
    config: PathBuf,

    /// Validate the configuration, report problems, and exit
    #[arg(long)]
    verify_config: bool,

    /// Print the projected initial check schedule and exit
    #[arg(long)]
    test_scheduling: bool,

    /// Daemon mode: suppress stderr logging (supervision is the init
    /// system's job; vigild does not fork)
    #[arg(long)]
    daemon: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool, daemon: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if daemon {
        // Stderr is likely /dev/null under a supervisor; keep the format
        // terse and timestamped for whatever captures it.
        builder.without_time().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.daemon);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("vigild: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, VigilError> {
    let cfg = VigilConfig::load(&cli.config)?;

    if cli.verify_config {
        println!(
            "Configuration OK: {} host(s), {} service(s), {} command(s), {} timeperiod(s)",
            cfg.hosts.len(),
            cfg.services.len(),
            cfg.commands.len(),
            cfg.timeperiods.len()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let now = unix_now();
    let store = Arc::new(ObjectStore::from_config(&cfg)?);
    let globals = Arc::new(ProgramState::new(&cfg.daemon, now));
    let comments = Arc::new(CommentManager::new());

    // --test-scheduling must not touch the real log file.
    let log = if cli.test_scheduling {
        Arc::new(MonitorLog::sink())
    } else {
        Arc::new(MonitorLog::open(&cfg.daemon.log_file)?)
    };
    let notifier: Arc<dyn vigil_core::Notifier> = Arc::new(LogNotifier::new(Arc::clone(&log)));
    let downtimes = Arc::new(DowntimeManager::new(
        Arc::clone(&store),
        Arc::clone(&comments),
        Arc::clone(&log),
        Arc::clone(&notifier),
    ));
    let handler = ResultHandler::new(
        Arc::clone(&store),
        Arc::clone(&comments),
        Arc::clone(&downtimes),
        Arc::clone(&globals),
        Arc::clone(&log),
        Arc::clone(&notifier),
        ResultPolicy {
            interval_length: cfg.daemon.interval_length,
            use_aggressive_host_checking: cfg.daemon.use_aggressive_host_checking,
        },
    );

    let registry = Arc::new(CommandRegistry::new());
    let (mut scheduler, handle) = Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&globals),
        Arc::clone(&comments),
        Arc::clone(&downtimes),
        Arc::clone(&registry),
        handler,
        Arc::new(ShellCheckRunner),
        Arc::clone(&log),
        SchedulerConfig::from_daemon(&cfg.daemon),
    );

    if cfg.daemon.use_retained_state && !cli.test_scheduling {
        if let Err(e) = vigil_core::retention::load_retention(
            &cfg.daemon.retention_file,
            &store,
            &comments,
            &downtimes,
            &globals,
        ) {
            error!(error = %e, "retained state not loaded, starting from configured defaults");
        }
    }

    scheduler.init_schedule(now);

    if cli.test_scheduling {
        println!("Projected check schedule ({} entries):", scheduler.projected_schedule().len());
        for check in scheduler.projected_schedule() {
            match &check.service_description {
                Some(desc) => println!(
                    "  +{:>5}s  {}/{}",
                    check.run_time - now,
                    check.host_name,
                    desc
                ),
                None => println!("  +{:>5}s  {}", check.run_time - now, check.host_name),
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    register_builtin(
        &registry,
        &HandlerContext {
            store: Arc::clone(&store),
            comments: Arc::clone(&comments),
            downtimes: Arc::clone(&downtimes),
            globals: Arc::clone(&globals),
            notifier,
            event_tx: handle.event_tx.clone(),
            result_tx: handle.result_tx.clone(),
            shutdown_tx: handle.shutdown_tx.clone(),
        },
    );

    // External-command pipe.
    let pipe = CommandPipe::create(&cfg.daemon.command_file)?;
    let pipe_path = cfg.daemon.command_file.clone();
    tokio::spawn(pipe.run(handle.command_tx.clone(), handle.shutdown_tx.subscribe()));

    // Query protocol listeners.
    let lql_state = Arc::new(LivestatusState::new(
        Arc::clone(&store),
        Arc::clone(&comments),
        Arc::clone(&downtimes),
        Arc::clone(&globals),
        Arc::new(ChannelSink::new(handle.command_tx.clone())),
        &cfg.daemon.log_file,
    ));
    if let Some(socket) = cfg.daemon.query_socket.clone() {
        let server = LivestatusServer::new(Arc::clone(&lql_state));
        let shutdown = handle.shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = server.serve_unix(&socket, shutdown).await {
                error!(error = %e, "unix query listener failed");
            }
        });
    }
    if let Some(addr) = cfg.daemon.query_listen.clone() {
        let server = LivestatusServer::new(Arc::clone(&lql_state));
        let shutdown = handle.shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = server.serve_tcp(&addr, shutdown).await {
                error!(error = %e, "tcp query listener failed");
            }
        });
    }

    // SIGTERM/SIGINT ask the loop to stop.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let signal_shutdown = handle.shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
        let _ = signal_shutdown.send(());
    });

    log.log("LOG VERSION: 2.0");
    info!(
        version = vigil_core::VERSION,
        hosts = store.host_count(),
        services = store.service_count(),
        "vigild started"
    );

    scheduler.run().await;

    // Wake a pipe reader blocked in open(2) so its task can observe the
    // shutdown signal and exit.
    CommandPipe::create(&pipe_path).map(|p| p.unblock()).ok();
    info!("vigild stopped");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from(["vigild", "--config", "/tmp/v.toml", "--verify-config"]);
        assert!(cli.verify_config);
        assert_eq!(cli.config, PathBuf::from("/tmp/v.toml"));
        assert!(!cli.daemon);
    }
}
