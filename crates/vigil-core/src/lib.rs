//! # Vigil Core
//!
//! Core engine of the Vigil monitoring daemon: the in-memory object graph,
//! the check scheduler, the result-to-state machine, downtime and comment
//! lifecycles, and the external-command channel.
//!
//! ## Architecture
//!
//! ```text
//!            ┌────────────┐   check requests   ┌─────────────┐
//!            │ Scheduler  │ ─────────────────► │ CheckRunner │
//!            │ (one loop) │ ◄───────────────── │ (workers)   │
//!            └─────┬──────┘   result channel   └─────────────┘
//!                  │ applies
//!                  ▼
//!            ┌────────────┐      ┌──────────────────────┐
//!            │ResultHandler│ ──► │ ObjectStore / logs /  │
//!            └────────────┘      │ comments / downtimes  │
//!                  ▲             └──────────────────────┘
//!                  │ commands
//!            ┌─────┴──────┐
//!            │CommandPipe │  (FIFO + socket-borne commands)
//!            └────────────┘
//! ```
//!
//! All state transitions run on the scheduler loop, so per-object ordering
//! needs no locking beyond the row locks used by concurrent readers.

#![forbid(unsafe_code)]
// Missing docs allowed for internal items - public API is fully documented
#![allow(missing_docs)]
#![warn(clippy::all)]
// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod comments;
pub mod commands;
pub mod config;
pub mod downtimes;
pub mod error;
pub mod logfile;
pub mod notifier;
pub mod objects;
pub mod results;
pub mod retention;
pub mod runner;
pub mod scheduler;

pub use comments::{Comment, CommentEntryType, CommentManager, CommentSource};
pub use commands::{register_builtin, CommandPipe, CommandRegistry, HandlerContext, RawCommand};
pub use config::{DaemonConfig, VigilConfig};
pub use downtimes::{Downtime, DowntimeManager};
pub use error::{CommandError, ConfigError, PersistError, Result, VigilError};
pub use logfile::{LogEntry, MonitorLog};
pub use notifier::{LogNotifier, NotificationType, Notifier};
pub use objects::{
    Acknowledgement, Host, HostRef, HostState, ObjectStore, ProgramState, Service, ServiceRef,
    ServiceState, StateType,
};
pub use results::{CheckResult, CheckType, ResultHandler, ResultPolicy};
pub use runner::{CheckRequest, CheckRunner, ShellCheckRunner};
pub use scheduler::{
    Event, EventKind, Scheduler, SchedulerConfig, SchedulerHandle, CHECK_OPTION_FORCE_EXECUTION,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current wall-clock time as unix seconds.
///
/// All scheduling arithmetic in the daemon is done on unix seconds; this is
/// the single place the clock is read.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
