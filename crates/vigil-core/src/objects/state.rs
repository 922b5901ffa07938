//! State enums shared by hosts and services.

use serde::{Deserialize, Serialize};

/// Host states, wire-compatible with Nagios return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostState {
    /// Host is reachable and responding.
    Up,
    /// Host failed its check.
    Down,
    /// Host failed its check behind a failed parent.
    Unreachable,
}

impl HostState {
    /// Integer representation used by the status file and the query engine.
    pub const fn as_int(self) -> i64 {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Unreachable => 2,
        }
    }

    /// Inverse of [`Self::as_int`]; out-of-range values map to `Down`.
    pub const fn from_int(v: i64) -> Self {
        match v {
            0 => Self::Up,
            2 => Self::Unreachable,
            _ => Self::Down,
        }
    }

    /// Bit used in the `notified_on` bitmask.
    pub const fn notify_bit(self) -> u32 {
        1 << self.as_int()
    }
}

/// Service states, wire-compatible with plugin return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    pub const fn as_int(self) -> i64 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Unknown => 3,
        }
    }

    /// Map a plugin return code. Codes outside 0–3 map to `Unknown`.
    pub const fn from_return_code(rc: i32) -> Self {
        match rc {
            0 => Self::Ok,
            1 => Self::Warning,
            2 => Self::Critical,
            _ => Self::Unknown,
        }
    }

    pub const fn from_int(v: i64) -> Self {
        match v {
            0 => Self::Ok,
            1 => Self::Warning,
            2 => Self::Critical,
            _ => Self::Unknown,
        }
    }

    /// Bit used in the `notified_on` bitmask.
    pub const fn notify_bit(self) -> u32 {
        1 << self.as_int()
    }

    /// Human-readable name as it appears in alert log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl HostState {
    /// Human-readable name as it appears in alert log lines.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Unreachable => "UNREACHABLE",
        }
    }
}

/// Whether a state is confirmed (reached max attempts) or still
/// accumulating attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateType {
    Soft,
    Hard,
}

impl StateType {
    pub const fn as_int(self) -> i64 {
        match self {
            Self::Soft => 0,
            Self::Hard => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Soft => "SOFT",
            Self::Hard => "HARD",
        }
    }
}

/// Operator acknowledgement of a problem.
///
/// A normal acknowledgement clears on the next state change; a sticky one
/// persists until the object returns to its good state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Acknowledgement {
    None,
    Normal,
    Sticky,
}

impl Acknowledgement {
    pub const fn as_int(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Normal => 1,
            Self::Sticky => 2,
        }
    }

    pub const fn is_acknowledged(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Bits of the `modified_attributes` mask, recording which options an
/// operator has overridden at runtime. Retention reload only re-applies
/// toggles whose bit is set.
pub mod modattr {
    pub const NONE: u64 = 0;
    pub const NOTIFICATIONS_ENABLED: u64 = 1 << 0;
    pub const ACTIVE_CHECKS_ENABLED: u64 = 1 << 1;
    pub const PASSIVE_CHECKS_ENABLED: u64 = 1 << 2;
    pub const EVENT_HANDLER_ENABLED: u64 = 1 << 3;
    pub const FLAP_DETECTION_ENABLED: u64 = 1 << 4;
}
