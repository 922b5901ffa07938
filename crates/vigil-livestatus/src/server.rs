//! The query socket server.
//!
//! Listens on a Unix socket and/or TCP. Each connection is its own task;
//! requests are separated by blank lines. `COMMAND` lines accumulate and
//! are handed to the sink in one batch when the connection carried nothing
//! but commands; a query flushes anything queued before it individually.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use vigil_core::commands::parse_line;
use vigil_core::RawCommand;

use crate::engine::execute;
use crate::error::LqlError;
use crate::format::{fixed16, render, ResponseHeader};
use crate::query::Query;
use crate::state::LivestatusState;
use crate::tables::TableRegistry;

/// Read deadline per request line; stuck clients drop instead of pinning a
/// task through shutdown.
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// The query protocol server.
pub struct LivestatusServer {
    state: Arc<LivestatusState>,
    registry: Arc<TableRegistry>,
}

impl LivestatusServer {
    pub fn new(state: Arc<LivestatusState>) -> Self {
        Self {
            state,
            registry: Arc::new(TableRegistry::new()),
        }
    }

    /// Accept loop on a Unix socket. A stale socket file is replaced.
    pub async fn serve_unix(
        &self,
        path: &Path,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path)?;
        info!(path = %path.display(), "livestatus listening on unix socket");
        let socket_path: PathBuf = path.to_path_buf();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => self.spawn_connection(stream),
                    Err(e) => warn!(error = %e, "unix accept failed"),
                },
                _ = shutdown.recv() => break,
            }
        }
        let _ = std::fs::remove_file(&socket_path);
        Ok(())
    }

    /// Accept loop on TCP.
    pub async fn serve_tcp(
        &self,
        addr: &str,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr, "livestatus listening on tcp");
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => self.spawn_connection(stream),
                    Err(e) => warn!(error = %e, "tcp accept failed"),
                },
                _ = shutdown.recv() => break,
            }
        }
        Ok(())
    }

    fn spawn_connection<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &state, &registry).await {
                debug!(error = %e, "connection ended with error");
            }
        });
    }
}

/// Serve one connection until EOF, a non-keepalive response, or an error.
pub async fn handle_connection<S>(
    stream: S,
    state: &LivestatusState,
    registry: &TableRegistry,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();

    // Commands queue until a query arrives (flush individually) or EOF
    // (hand the whole backlog to the batch sink in one call).
    let mut pending_commands: Vec<RawCommand> = Vec::new();
    let mut saw_query = false;

    'requests: loop {
        let mut request: Vec<String> = Vec::new();
        loop {
            let line = match tokio::time::timeout(READ_TIMEOUT, lines.next_line()).await {
                Ok(Ok(Some(line))) => line,
                // EOF or error: flush and drop the connection.
                Ok(Ok(None)) => break 'requests,
                Ok(Err(e)) => {
                    debug!(error = %e, "read failed");
                    break 'requests;
                }
                Err(_) => {
                    debug!("read deadline expired, dropping client");
                    break 'requests;
                }
            };
            if line.trim().is_empty() {
                break;
            }
            request.push(line);
        }
        if request.is_empty() {
            continue;
        }

        if request[0].starts_with("COMMAND") {
            for line in &request {
                match parse_command_line(line) {
                    Some(cmd) => pending_commands.push(cmd),
                    None => debug!(line = %line, "malformed COMMAND line dropped"),
                }
            }
            continue;
        }

        // A query: anything queued flushes individually first.
        saw_query = true;
        for cmd in pending_commands.drain(..) {
            state.sink.submit(cmd);
        }

        let keep_alive = respond(&mut write_half, &request, state, registry).await?;
        if !keep_alive {
            break;
        }
    }

    if !pending_commands.is_empty() {
        if saw_query {
            for cmd in pending_commands {
                state.sink.submit(cmd);
            }
        } else {
            state.sink.submit_batch(pending_commands);
        }
    }
    write_half.shutdown().await.ok();
    Ok(())
}

/// Parse `COMMAND [<ts>] NAME;args`.
fn parse_command_line(line: &str) -> Option<RawCommand> {
    let rest = line.strip_prefix("COMMAND")?.trim_start();
    parse_line(rest).ok()
}

/// Execute one query and write the response. Returns whether the
/// connection stays open.
async fn respond<W>(
    writer: &mut W,
    request: &[String],
    state: &LivestatusState,
    registry: &TableRegistry,
) -> std::io::Result<bool>
where
    W: AsyncWrite + Unpin,
{
    let (status, body, response_header, keep_alive) = match Query::parse(request) {
        Ok(query) => match execute(&query, registry, state) {
            Ok(result) => {
                state.globals.queries_served.fetch_add(1, Ordering::Relaxed);
                let body = render(&result, query.output_format, query.column_headers);
                (200u16, body, query.response_header, query.keep_alive)
            }
            Err(e) => {
                let header = query.response_header;
                (e.status(), format!("{e}\n"), header, query.keep_alive)
            }
        },
        Err(failure) => (
            failure.error.status(),
            format!("{}\n", failure.error),
            failure.response_header,
            failure.keep_alive,
        ),
    };

    if response_header == ResponseHeader::Fixed16 {
        writer.write_all(fixed16(status, body.len()).as_bytes()).await?;
    }
    writer.write_all(body.as_bytes()).await?;
    writer.flush().await?;
    Ok(keep_alive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use vigil_core::config::test_support::small_config;
    use vigil_core::notifier::test_support::RecordingNotifier;
    use vigil_core::{
        CommentManager, DowntimeManager, MonitorLog, ObjectStore, ProgramState, ServiceState,
    };

    use crate::state::CommandSink;

    #[derive(Default)]
    struct RecordingSink {
        singles: Mutex<Vec<RawCommand>>,
        batches: Mutex<Vec<Vec<RawCommand>>>,
    }

    impl CommandSink for RecordingSink {
        fn submit(&self, command: RawCommand) {
            self.singles.lock().push(command);
        }
        fn submit_batch(&self, commands: Vec<RawCommand>) {
            self.batches.lock().push(commands);
        }
    }

    fn state_with_sink(sink: Arc<RecordingSink>) -> LivestatusState {
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
        LivestatusState::new(
            store,
            comments,
            downtimes,
            globals,
            sink,
            std::path::Path::new("/nonexistent/vigil.log"),
        )
    }

    async fn run_session(input: &str, state: &LivestatusState) -> String {
        let registry = TableRegistry::new();
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (mut client_read, mut client_write) = tokio::io::split(client);

        let session = tokio::spawn({
            let input = input.to_string();
            async move {
                client_write.write_all(input.as_bytes()).await.unwrap();
                client_write.shutdown().await.unwrap();
                let mut out = String::new();
                tokio::io::AsyncReadExt::read_to_string(&mut client_read, &mut out)
                    .await
                    .unwrap();
                out
            }
        });

        handle_connection(server, state, &registry).await.unwrap();
        session.await.unwrap()
    }

    #[tokio::test]
    async fn test_stats_query_csv_and_json_bodies() {
        let sink = Arc::new(RecordingSink::default());
        let state = state_with_sink(Arc::clone(&sink));
        // 3 services: make two CRITICAL so counts are 1 OK / 2 CRITICAL.
        for svc in [("web1", "http"), ("web1", "ssh")] {
            state.store.service(svc.0, svc.1).unwrap().write().state = ServiceState::Critical;
        }

        let out = run_session("GET services\nStats: state = 0\nStats: state = 2\n\n", &state).await;
        assert_eq!(out, "1;2\n");

        let out = run_session(
            "GET services\nStats: state = 0\nStats: state = 2\nOutputFormat: json\n\n",
            &state,
        )
        .await;
        assert_eq!(out, "[[1,2]]\n");
    }

    #[tokio::test]
    async fn test_fixed16_header() {
        let sink = Arc::new(RecordingSink::default());
        let state = state_with_sink(sink);
        let out = run_session(
            "GET hosts\nColumns: name\nResponseHeader: fixed16\n\n",
            &state,
        )
        .await;
        let body = "web1\ndb1\n";
        assert_eq!(out, format!("{}{}", fixed16(200, body.len()), body));
    }

    #[tokio::test]
    async fn test_unknown_table_404() {
        let sink = Arc::new(RecordingSink::default());
        let state = state_with_sink(sink);
        let out = run_session("GET widgets\nResponseHeader: fixed16\n\n", &state).await;
        assert!(out.starts_with("404"));
        assert!(out.contains("Unknown table: widgets"));
    }

    #[tokio::test]
    async fn test_all_command_connection_batches_once() {
        let sink = Arc::new(RecordingSink::default());
        let state = state_with_sink(Arc::clone(&sink));
        let mut input = String::new();
        for _ in 0..100 {
            input.push_str("COMMAND [1700000000] ENABLE_SVC_NOTIFICATIONS;web1;http\n\n");
        }
        let out = run_session(&input, &state).await;
        assert!(out.is_empty(), "commands get no response");
        assert_eq!(sink.singles.lock().len(), 0);
        let batches = sink.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[0][0].name, "ENABLE_SVC_NOTIFICATIONS");
    }

    #[tokio::test]
    async fn test_commands_before_query_flush_individually() {
        let sink = Arc::new(RecordingSink::default());
        let state = state_with_sink(Arc::clone(&sink));
        let input = "COMMAND [1700000000] ENABLE_SVC_NOTIFICATIONS;web1;http\n\n\
                     COMMAND [1700000001] DISABLE_SVC_NOTIFICATIONS;web1;ssh\n\n\
                     GET hosts\nColumns: name\n\n";
        let out = run_session(input, &state).await;
        assert_eq!(out, "web1\ndb1\n");
        assert_eq!(sink.singles.lock().len(), 2);
        assert!(sink.batches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_keepalive_serves_multiple_queries() {
        let sink = Arc::new(RecordingSink::default());
        let state = state_with_sink(sink);
        let input = "GET hosts\nColumns: name\nKeepAlive: on\n\n\
                     GET status\nColumns: num_hosts\n\n";
        let out = run_session(input, &state).await;
        assert_eq!(out, "web1\ndb1\n2\n");
    }

    #[tokio::test]
    async fn test_parse_error_is_400() {
        let sink = Arc::new(RecordingSink::default());
        let state = state_with_sink(sink);
        let out = run_session("GET hosts\nWhatIsThis: 1\n\n", &state).await;
        assert!(out.contains("unknown header"));
    }
}
