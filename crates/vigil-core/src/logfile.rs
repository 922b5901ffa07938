//! The monitoring log: an append-only `[<ts>] TYPE: detail` file.
//!
//! This is a domain artifact, not a diagnostic channel: alerts,
//! notifications, external commands and downtime events land here, and the
//! query engine's `log` table reads it back. Diagnostic logging goes
//! through `tracing`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use crate::unix_now;

/// Log classes, grouping types for the query engine.
pub mod logclass {
    pub const INFO: i64 = 0;
    pub const ALERT: i64 = 1;
    pub const STATE: i64 = 2;
    pub const NOTIFICATION: i64 = 3;
    pub const PASSIVE: i64 = 4;
    pub const COMMAND: i64 = 5;
    pub const INITIAL_STATE: i64 = 6;
    pub const PROGRAM: i64 = 7;
}

/// Append-only writer for the monitoring log.
///
/// Write failures are logged through `tracing` and otherwise swallowed:
/// losing a log line must never take the daemon down.
pub struct MonitorLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl MonitorLog {
    /// Open (creating if needed) the log at `path`.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        })
    }

    /// A log that drops everything; used by unit tests and `--verify-config`.
    pub fn sink() -> Self {
        Self {
            path: PathBuf::new(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, stamped with the current time.
    pub fn log(&self, line: &str) {
        self.log_at(unix_now(), line);
    }

    /// Append one entry with an explicit timestamp.
    pub fn log_at(&self, ts: i64, line: &str) {
        let mut guard = self.file.lock();
        if let Some(file) = guard.as_mut() {
            if let Err(e) = writeln!(file, "[{ts}] {line}") {
                tracing::warn!(path = %self.path.display(), error = %e, "monitoring log write failed");
            }
        }
    }

    /// Rotate the log: rename the current file to a dated archive next to
    /// it and start a fresh one. Transient failures are returned so the
    /// scheduler can retry on the next rotation interval.
    pub fn rotate(&self) -> std::io::Result<()> {
        let mut guard = self.file.lock();
        if guard.is_none() {
            return Ok(());
        }
        let now = unix_now();
        let stamp = Utc
            .timestamp_opt(now, 0)
            .single()
            .map_or_else(|| now.to_string(), |t| t.format("%Y-%m-%d-%H").to_string());
        let mut archive = self.path.clone().into_os_string();
        archive.push(format!("-{stamp}"));
        // Close before rename so Windows-style semantics would also work.
        *guard = None;
        std::fs::rename(&self.path, &archive)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "[{now}] LOG ROTATION: SCHEDULED")?;
        *guard = Some(file);
        Ok(())
    }
}

/// One parsed line of the monitoring log, shaped for the `log` table.
#[derive(Debug, Clone, Default)]
pub struct LogEntry {
    pub time: i64,
    pub class: i64,
    pub log_type: String,
    /// Raw text after the timestamp.
    pub message: String,
    pub host_name: String,
    pub service_description: String,
    pub state: i64,
    pub state_type: String,
    pub attempt: i64,
    pub plugin_output: String,
    pub contact_name: String,
    pub command_name: String,
}

impl LogEntry {
    /// Parse one log line. Returns `None` for lines without the
    /// `[<ts>] ` prefix.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (ts, rest) = rest.split_once("] ")?;
        let time: i64 = ts.parse().ok()?;

        let mut entry = Self {
            time,
            message: rest.to_string(),
            ..Self::default()
        };

        let Some((log_type, detail)) = rest.split_once(": ") else {
            entry.class = logclass::INFO;
            entry.log_type = rest.to_string();
            return Some(entry);
        };
        entry.log_type = log_type.to_string();
        entry.class = class_of(log_type);

        let fields: Vec<&str> = detail.split(';').collect();
        match log_type {
            "HOST ALERT" | "INITIAL HOST STATE" | "CURRENT HOST STATE" => {
                // host;state;type;attempt;output
                entry.host_name = fields.first().copied().unwrap_or("").to_string();
                entry.state = host_state_int(fields.get(1).copied().unwrap_or(""));
                entry.state_type = fields.get(2).copied().unwrap_or("").to_string();
                entry.attempt = fields.get(3).and_then(|f| f.parse().ok()).unwrap_or(0);
                entry.plugin_output = fields.get(4..).map_or(String::new(), |f| f.join(";"));
            }
            "SERVICE ALERT" | "INITIAL SERVICE STATE" | "CURRENT SERVICE STATE" => {
                // host;svc;state;type;attempt;output
                entry.host_name = fields.first().copied().unwrap_or("").to_string();
                entry.service_description = fields.get(1).copied().unwrap_or("").to_string();
                entry.state = service_state_int(fields.get(2).copied().unwrap_or(""));
                entry.state_type = fields.get(3).copied().unwrap_or("").to_string();
                entry.attempt = fields.get(4).and_then(|f| f.parse().ok()).unwrap_or(0);
                entry.plugin_output = fields.get(5..).map_or(String::new(), |f| f.join(";"));
            }
            "HOST NOTIFICATION" => {
                // contact;host;state;command;output
                entry.contact_name = fields.first().copied().unwrap_or("").to_string();
                entry.host_name = fields.get(1).copied().unwrap_or("").to_string();
                entry.state = host_state_int(fields.get(2).copied().unwrap_or(""));
                entry.command_name = fields.get(3).copied().unwrap_or("").to_string();
                entry.plugin_output = fields.get(4..).map_or(String::new(), |f| f.join(";"));
            }
            "SERVICE NOTIFICATION" => {
                // contact;host;svc;state;command;output
                entry.contact_name = fields.first().copied().unwrap_or("").to_string();
                entry.host_name = fields.get(1).copied().unwrap_or("").to_string();
                entry.service_description = fields.get(2).copied().unwrap_or("").to_string();
                entry.state = service_state_int(fields.get(3).copied().unwrap_or(""));
                entry.command_name = fields.get(4).copied().unwrap_or("").to_string();
                entry.plugin_output = fields.get(5..).map_or(String::new(), |f| f.join(";"));
            }
            "HOST DOWNTIME ALERT" | "HOST FLAPPING ALERT" => {
                entry.host_name = fields.first().copied().unwrap_or("").to_string();
                entry.plugin_output = fields.get(2..).map_or(String::new(), |f| f.join(";"));
            }
            "SERVICE DOWNTIME ALERT" | "SERVICE FLAPPING ALERT" => {
                entry.host_name = fields.first().copied().unwrap_or("").to_string();
                entry.service_description = fields.get(1).copied().unwrap_or("").to_string();
                entry.plugin_output = fields.get(3..).map_or(String::new(), |f| f.join(";"));
            }
            "PASSIVE HOST CHECK" => {
                entry.host_name = fields.first().copied().unwrap_or("").to_string();
                entry.plugin_output = fields.get(2..).map_or(String::new(), |f| f.join(";"));
            }
            "PASSIVE SERVICE CHECK" => {
                entry.host_name = fields.first().copied().unwrap_or("").to_string();
                entry.service_description = fields.get(1).copied().unwrap_or("").to_string();
                entry.plugin_output = fields.get(3..).map_or(String::new(), |f| f.join(";"));
            }
            "EXTERNAL COMMAND" => {
                entry.command_name = fields.first().copied().unwrap_or("").to_string();
            }
            _ => {}
        }
        Some(entry)
    }
}

fn class_of(log_type: &str) -> i64 {
    match log_type {
        "HOST ALERT" | "SERVICE ALERT" => logclass::ALERT,
        "HOST DOWNTIME ALERT" | "SERVICE DOWNTIME ALERT" | "HOST FLAPPING ALERT"
        | "SERVICE FLAPPING ALERT" => logclass::STATE,
        "HOST NOTIFICATION" | "SERVICE NOTIFICATION" => logclass::NOTIFICATION,
        "PASSIVE HOST CHECK" | "PASSIVE SERVICE CHECK" => logclass::PASSIVE,
        "EXTERNAL COMMAND" => logclass::COMMAND,
        "INITIAL HOST STATE" | "INITIAL SERVICE STATE" | "CURRENT HOST STATE"
        | "CURRENT SERVICE STATE" => logclass::INITIAL_STATE,
        "LOG ROTATION" | "LOG VERSION" => logclass::PROGRAM,
        _ => logclass::INFO,
    }
}

fn host_state_int(s: &str) -> i64 {
    match s {
        "UP" => 0,
        "UNREACHABLE" => 2,
        "DOWN" => 1,
        _ => s.parse().unwrap_or(0),
    }
}

fn service_state_int(s: &str) -> i64 {
    match s {
        "OK" => 0,
        "WARNING" => 1,
        "CRITICAL" => 2,
        "UNKNOWN" => 3,
        _ => s.parse().unwrap_or(0),
    }
}

/// Read and parse a whole log file, skipping unparseable lines.
pub fn read_log_file(path: &Path) -> std::io::Result<Vec<LogEntry>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text.lines().filter_map(LogEntry::parse).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_alert() {
        let e = LogEntry::parse(
            "[1700000000] SERVICE ALERT: web1;http;CRITICAL;SOFT;1;Connection refused",
        )
        .unwrap();
        assert_eq!(e.time, 1_700_000_000);
        assert_eq!(e.class, logclass::ALERT);
        assert_eq!(e.host_name, "web1");
        assert_eq!(e.service_description, "http");
        assert_eq!(e.state, 2);
        assert_eq!(e.state_type, "SOFT");
        assert_eq!(e.attempt, 1);
        assert_eq!(e.plugin_output, "Connection refused");
    }

    #[test]
    fn test_parse_output_with_semicolons() {
        let e = LogEntry::parse("[1700000000] SERVICE ALERT: h;s;OK;HARD;1;a;b;c").unwrap();
        assert_eq!(e.plugin_output, "a;b;c");
    }

    #[test]
    fn test_parse_unknown_type_keeps_message() {
        let e = LogEntry::parse("[1700000000] SOMETHING NEW: detail here").unwrap();
        assert_eq!(e.log_type, "SOMETHING NEW");
        assert_eq!(e.class, logclass::INFO);
        assert_eq!(e.message, "SOMETHING NEW: detail here");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(LogEntry::parse("no timestamp here").is_none());
        assert!(LogEntry::parse("[nan] TYPE: x").is_none());
    }

    #[test]
    fn test_writer_appends_and_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.log");
        let log = MonitorLog::open(&path).unwrap();
        log.log_at(1_700_000_000, "HOST ALERT: db1;DOWN;HARD;3;timed out");
        log.log_at(1_700_000_001, "EXTERNAL COMMAND: ENABLE_NOTIFICATIONS");
        let entries = read_log_file(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].host_name, "db1");
        assert_eq!(entries[1].class, logclass::COMMAND);
        assert_eq!(entries[1].command_name, "ENABLE_NOTIFICATIONS");
    }
}
