//! External-command ingestion.
//!
//! Two ingress paths feed the same handler table: the named pipe
//! ([`CommandPipe`]) and the query engine's COMMAND channel. Both produce a
//! canonical [`RawCommand`] which the scheduler loop dispatches through the
//! [`CommandRegistry`]. The registry is write-once: handlers register at
//! startup and only reads happen afterwards.

mod fifo;
mod handlers;
mod parser;
mod table;

pub use fifo::CommandPipe;
pub use handlers::{register_builtin, HandlerContext};
pub use parser::parse_line;
pub use table::expected_args;

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::CommandError;

/// A parsed external command: `[<ts>] NAME;arg;arg;…`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    pub entry_time: i64,
    pub name: String,
    pub args: Vec<String>,
}

impl RawCommand {
    pub fn new(entry_time: i64, name: &str, args: Vec<String>) -> Self {
        Self {
            entry_time,
            name: name.to_string(),
            args,
        }
    }

    /// The `NAME;arg;…` form, as logged to the monitoring log.
    pub fn wire_form(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{};{}", self.name, self.args.join(";"))
        }
    }
}

/// A registered command handler.
pub type Handler = Box<dyn Fn(&RawCommand) -> Result<(), CommandError> + Send + Sync>;

/// Name → handler table.
pub struct CommandRegistry {
    handlers: RwLock<HashMap<String, Handler>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register one handler. Startup-time only.
    pub fn register(
        &self,
        name: &str,
        handler: impl Fn(&RawCommand) -> Result<(), CommandError> + Send + Sync + 'static,
    ) {
        self.handlers
            .write()
            .insert(name.to_string(), Box::new(handler));
    }

    /// Register a batch of handlers. Startup-time only.
    pub fn register_many(&self, entries: Vec<(String, Handler)>) {
        let mut map = self.handlers.write();
        for (name, handler) in entries {
            map.insert(name, handler);
        }
    }

    /// Dispatch a command. Unknown names are ignored, not errors: operators
    /// routinely send commands this build does not implement.
    pub fn dispatch(&self, cmd: &RawCommand) -> Result<(), CommandError> {
        let handlers = self.handlers.read();
        match handlers.get(&cmd.name) {
            Some(handler) => handler(cmd),
            None => {
                debug!(command = %cmd.name, "unknown external command ignored");
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_registry_dispatches_registered_handler() {
        let registry = CommandRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        registry.register("TEST_CMD", move |_| {
            h.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
        let cmd = RawCommand::new(0, "TEST_CMD", vec![]);
        registry.dispatch(&cmd).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unknown_command_is_ignored() {
        let registry = CommandRegistry::new();
        let cmd = RawCommand::new(0, "NOT_A_THING", vec!["x".into()]);
        assert!(registry.dispatch(&cmd).is_ok());
    }
}
