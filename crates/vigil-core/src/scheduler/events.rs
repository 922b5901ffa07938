//! Scheduler events and their min-heap ordering.

use std::cmp::Ordering;

/// Check option flag: bypass the enabled/timeperiod/parallelism gates.
pub const CHECK_OPTION_FORCE_EXECUTION: u32 = 1;

/// What a scheduled event does when it comes due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    ServiceCheck {
        host_name:   String,
        description: String,
        options:     u32,
    },
    HostCheck {
        host_name: String,
        options:   u32,
    },
    StatusSave,
    RetentionSave,
    LogRotation,
    ExpireDowntimes,
    CheckFreshness,
    /// Drain any finished check results that accumulated while the loop
    /// was busy.
    Reaper,
}

/// A queued event. Ordered by `run_time`, then by insertion id so equal
/// times dispatch in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub run_time: i64,
    /// Assigned by the scheduler when the event enters the queue; 0 until
    /// then.
    pub id: u64,
    pub kind: EventKind,
}

impl Event {
    /// An event due at `run_time`, not yet queued.
    pub fn at(run_time: i64, kind: EventKind) -> Self {
        Self {
            run_time,
            id: 0,
            kind,
        }
    }
}

// Reversed ordering: `BinaryHeap` is a max-heap, and the earliest event
// must surface first.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .run_time
            .cmp(&self.run_time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
