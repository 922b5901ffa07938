//! The state provider: everything the tables read, plus the command sink
//! the COMMAND channel writes back through.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::warn;
use vigil_core::{
    logfile, CommentManager, DowntimeManager, LogEntry, ObjectStore, ProgramState, RawCommand,
};

/// Where socket-borne commands go. The scheduler loop consumes them; the
/// batch entry point exists so an all-command connection hands its whole
/// backlog over in one call.
pub trait CommandSink: Send + Sync {
    fn submit(&self, command: RawCommand);
    fn submit_batch(&self, commands: Vec<RawCommand>);
}

/// Sink backed by the scheduler's command channel.
pub struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<RawCommand>,
}

impl ChannelSink {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<RawCommand>) -> Self {
        Self { tx }
    }
}

impl CommandSink for ChannelSink {
    fn submit(&self, command: RawCommand) {
        if self.tx.send(command).is_err() {
            warn!("command sink closed, command dropped");
        }
    }

    fn submit_batch(&self, commands: Vec<RawCommand>) {
        for command in commands {
            self.submit(command);
        }
    }
}

#[derive(Default)]
struct LogCache {
    mtime: Option<SystemTime>,
    len: u64,
    entries: Vec<Arc<LogEntry>>,
}

/// Shared read view over the monitoring core.
pub struct LivestatusState {
    pub store: Arc<ObjectStore>,
    pub comments: Arc<CommentManager>,
    pub downtimes: Arc<DowntimeManager>,
    pub globals: Arc<ProgramState>,
    pub sink: Arc<dyn CommandSink>,
    log_path: PathBuf,
    log_cache: Mutex<LogCache>,
}

impl LivestatusState {
    pub fn new(
        store: Arc<ObjectStore>,
        comments: Arc<CommentManager>,
        downtimes: Arc<DowntimeManager>,
        globals: Arc<ProgramState>,
        sink: Arc<dyn CommandSink>,
        log_path: &Path,
    ) -> Self {
        Self {
            store,
            comments,
            downtimes,
            globals,
            sink,
            log_path: log_path.to_path_buf(),
            log_cache: Mutex::new(LogCache::default()),
        }
    }

    /// Parsed monitoring-log entries, cached until the file's mtime or
    /// length changes.
    pub fn log_entries(&self) -> Vec<Arc<LogEntry>> {
        let meta = std::fs::metadata(&self.log_path).ok();
        let (mtime, len) = match &meta {
            Some(m) => (m.modified().ok(), m.len()),
            None => (None, 0),
        };

        let mut cache = self.log_cache.lock();
        if cache.mtime == mtime && cache.len == len {
            return cache.entries.clone();
        }
        let entries = match logfile::read_log_file(&self.log_path) {
            Ok(parsed) => parsed.into_iter().map(Arc::new).collect(),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.log_path.display(), error = %e, "log table read failed");
                }
                Vec::new()
            }
        };
        cache.mtime = mtime;
        cache.len = len;
        cache.entries = entries;
        cache.entries.clone()
    }

    /// Ids of comments attached to a host, for the hosts table's
    /// `comments` column.
    pub fn host_comment_ids(&self, host: &str) -> Vec<String> {
        self.comments
            .for_host(host)
            .iter()
            .map(|c| c.id.to_string())
            .collect()
    }

    pub fn service_comment_ids(&self, host: &str, description: &str) -> Vec<String> {
        self.comments
            .for_service(host, description)
            .iter()
            .map(|c| c.id.to_string())
            .collect()
    }

    pub fn host_downtime_ids(&self, host: &str) -> Vec<String> {
        self.downtimes
            .all()
            .iter()
            .filter(|d| d.host_name == host && d.service_description.is_none())
            .map(|d| d.id.to_string())
            .collect()
    }

    pub fn service_downtime_ids(&self, host: &str, description: &str) -> Vec<String> {
        self.downtimes
            .all()
            .iter()
            .filter(|d| {
                d.host_name == host && d.service_description.as_deref() == Some(description)
            })
            .map(|d| d.id.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use vigil_core::config::test_support::small_config;
    use vigil_core::notifier::test_support::RecordingNotifier;
    use vigil_core::MonitorLog;

    pub(crate) struct NullSink;
    impl CommandSink for NullSink {
        fn submit(&self, _command: RawCommand) {}
        fn submit_batch(&self, _commands: Vec<RawCommand>) {}
    }

    fn state_with_log(path: &Path) -> LivestatusState {
        let cfg = small_config();
        let store = Arc::new(ObjectStore::from_config(&cfg).unwrap());
        let comments = Arc::new(CommentManager::new());
        let downtimes = Arc::new(DowntimeManager::new(
            Arc::clone(&store),
            Arc::clone(&comments),
            Arc::new(MonitorLog::sink()),
            RecordingNotifier::new(),
        ));
        let globals = Arc::new(ProgramState::new(&cfg.daemon, 0));
        LivestatusState::new(store, comments, downtimes, globals, Arc::new(NullSink), path)
    }

    #[test]
    fn test_log_cache_invalidates_on_growth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.log");
        std::fs::write(&path, "[100] LOG VERSION: 1\n").unwrap();

        let state = state_with_log(&path);
        assert_eq!(state.log_entries().len(), 1);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "[200] HOST ALERT: web1;DOWN;SOFT;1;gone").unwrap();
        drop(f);
        assert_eq!(state.log_entries().len(), 2);
    }

    #[test]
    fn test_missing_log_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_log(&dir.path().join("nope.log"));
        assert!(state.log_entries().is_empty());
    }
}
