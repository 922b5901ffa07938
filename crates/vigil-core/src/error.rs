//! Error types for the Vigil core.
//!
//! # Error Hierarchy
//!
//! ```text
//! VigilError
//! ├── Config    - configuration load/validation errors (refuse to start)
//! ├── Command   - malformed or unroutable external commands
//! ├── Persist   - status/retention file I/O and parse errors
//! └── Io        - other transient I/O
//! ```
//!
//! The in-memory managers (object store, comments, downtimes) never surface
//! errors across their API boundary; everything they are asked to do on a
//! missing target is a silent no-op, logged by the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Vigil core operations.
pub type Result<T> = std::result::Result<T, VigilError>;

/// Main error type for Vigil core operations.
#[derive(Error, Debug)]
pub enum VigilError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal invariant was violated. Treated as a bug: logged at
    /// error level by the caller, never a panic.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

/// Configuration errors. Any of these refuses startup; there is no
/// partial-start mode.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse configuration file {path}: {source}")]
    Parse {
        path:   PathBuf,
        source: Box<toml::de::Error>,
    },

    /// One or more semantic problems found by the validation pass.
    /// All problems are collected before this is returned.
    #[error("invalid configuration ({} problem(s)):\n{}", problems.len(), problems.join("\n"))]
    Invalid { problems: Vec<String> },
}

/// External-command errors. The pipe is fire-and-forget, so these are only
/// ever logged, never returned to a client.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("malformed command line: {line:?}")]
    Malformed { line: String },

    #[error("command {name} expects {expected} argument(s), got {got}")]
    WrongArgCount {
        name:     String,
        expected: usize,
        got:      usize,
    },

    #[error("command {name}: bad argument {arg:?}")]
    BadArgument { name: String, arg: String },

    #[error("command {name}: unknown target {target:?}")]
    UnknownTarget { name: String, target: String },
}

/// Status/retention persistence errors. Transient: the writer retries on
/// its next interval.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("cannot write {path}: {source}")]
    Write {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read {path}: {source}")]
    Read {
        path:   PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path:    PathBuf,
        line:    usize,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_lists_all_problems() {
        let err = ConfigError::Invalid {
            problems: vec!["host 'a': unknown parent 'b'".into(), "no hosts defined".into()],
        };
        let text = err.to_string();
        assert!(text.contains("2 problem(s)"));
        assert!(text.contains("unknown parent"));
        assert!(text.contains("no hosts defined"));
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::WrongArgCount {
            name:     "ACKNOWLEDGE_SVC_PROBLEM".into(),
            expected: 7,
            got:      2,
        };
        assert!(err.to_string().contains("expects 7"));
    }
}
