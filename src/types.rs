/*
 * Core Type Definitions
 *
 * Lightweight, Copy-able value types shared by the framework and every
 * policy. Nothing here owns resources; the heavy state lives in the
 * policies and in SchedCore.
 */

use core::fmt;

use crate::config::NPROC;

/// Process identifier.
///
/// Pids are small non-negative integers bounded by [`NPROC`]. "No process"
/// is expressed as `Option<Pid>`, never as a sentinel value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub usize);

impl Pid {
    /// Check that this pid indexes the process table.
    pub fn is_valid(self) -> bool {
        self.0 < NPROC
    }

    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process state as recorded in the external process table.
///
/// The framework reads and writes this field through [`crate::KernelCtx`];
/// everything else about a process is opaque to the scheduler.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProcState {
    /// Currently executing on the CPU.
    Running,
    /// Runnable and queued in some ready structure.
    Ready,
    /// Sleeping for a duration.
    Sleeping,
    /// Blocked waiting for an event.
    Waiting,
    /// Suspended by an external actor.
    Suspended,
    /// Table slot unused.
    Free,
}

impl ProcState {
    /// Short tag used by the state dumps.
    pub fn tag(self) -> &'static str {
        match self {
            ProcState::Running => "RUN",
            ProcState::Ready => "READY",
            ProcState::Sleeping => "SLEEP",
            ProcState::Waiting => "WAIT",
            ProcState::Suspended => "SUSP",
            ProcState::Free => "FREE",
        }
    }
}

/// The closed set of scheduling policies.
///
/// The set is fixed at build time; [`crate::policies::make_policy`] maps a
/// kind to a freshly initialized policy instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PolicyKind {
    RoundRobin,
    Priority,
    Mlfq,
    Lottery,
    Cfs,
    Realtime,
}

impl PolicyKind {
    /// Decode an externally supplied policy selector. Returns `None` for
    /// values outside the closed set.
    pub fn from_raw(raw: u32) -> Option<PolicyKind> {
        match raw {
            0 => Some(PolicyKind::RoundRobin),
            1 => Some(PolicyKind::Priority),
            2 => Some(PolicyKind::Mlfq),
            3 => Some(PolicyKind::Lottery),
            4 => Some(PolicyKind::Cfs),
            5 => Some(PolicyKind::Realtime),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            PolicyKind::RoundRobin => 0,
            PolicyKind::Priority => 1,
            PolicyKind::Mlfq => 2,
            PolicyKind::Lottery => 3,
            PolicyKind::Cfs => 4,
            PolicyKind::Realtime => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::RoundRobin => "round-robin",
            PolicyKind::Priority => "priority",
            PolicyKind::Mlfq => "mlfq",
            PolicyKind::Lottery => "lottery",
            PolicyKind::Cfs => "cfs",
            PolicyKind::Realtime => "realtime",
        }
    }
}

/// Selection algorithm used by the real-time policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RtAlgorithm {
    /// Earliest deadline first: smallest absolute deadline wins.
    Edf,
    /// Rate-monotonic: smallest period gets the highest static priority.
    Rms,
    /// Deadline-monotonic: smallest relative deadline gets the highest
    /// static priority.
    Dms,
    /// Least laxity first: smallest `deadline - now - remaining` wins,
    /// recomputed every tick.
    Llf,
}

impl RtAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            RtAlgorithm::Edf => "EDF",
            RtAlgorithm::Rms => "RMS",
            RtAlgorithm::Dms => "DMS",
            RtAlgorithm::Llf => "LLF",
        }
    }
}

/// What to do when a real-time task overruns its absolute deadline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RtMissPolicy {
    /// Drop the instance; the task leaves the ready list until its next
    /// periodic release.
    Skip,
    /// Keep running the overrun instance to completion.
    Continue,
    /// Abort the instance immediately and forget the current execution.
    Abort,
    /// Log the miss and keep running.
    Notify,
}

/// Lifecycle state of a real-time task instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RtTaskState {
    Inactive,
    Ready,
    Running,
    Blocked,
    Completed,
    Missed,
}

impl RtTaskState {
    pub fn tag(self) -> &'static str {
        match self {
            RtTaskState::Inactive => "INACTIVE",
            RtTaskState::Ready => "READY",
            RtTaskState::Running => "RUNNING",
            RtTaskState::Blocked => "BLOCKED",
            RtTaskState::Completed => "COMPLETED",
            RtTaskState::Missed => "MISSED",
        }
    }
}

/// Errors surfaced by the control surface.
///
/// Operations the interface defines as silent no-ops (dequeue of a
/// non-member, enqueue on an exhausted pool) do not produce these.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Pid outside `0..NPROC`.
    InvalidPid,
    /// Pid names a free process-table slot.
    ProcessFree,
    /// `scheduler_switch` target is not a known policy kind.
    UnknownPolicy,
    /// Operation addressed a task the policy does not track.
    NoSuchTask,
    /// A task with this pid is already registered.
    TaskExists,
    /// The fixed-size task pool has no free slot.
    PoolExhausted,
    /// The scheduler has not been initialized yet.
    NotInitialized,
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SchedError::InvalidPid => "pid out of range",
            SchedError::ProcessFree => "process slot is free",
            SchedError::UnknownPolicy => "unknown scheduling policy",
            SchedError::NoSuchTask => "no such task",
            SchedError::TaskExists => "task already registered",
            SchedError::PoolExhausted => "task pool exhausted",
            SchedError::NotInitialized => "scheduler not initialized",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_validity_follows_nproc() {
        assert!(Pid(0).is_valid());
        assert!(Pid(NPROC - 1).is_valid());
        assert!(!Pid(NPROC).is_valid());
    }

    #[test]
    fn policy_kind_names_are_distinct() {
        let kinds = [
            PolicyKind::RoundRobin,
            PolicyKind::Priority,
            PolicyKind::Mlfq,
            PolicyKind::Lottery,
            PolicyKind::Cfs,
            PolicyKind::Realtime,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in kinds.iter().skip(i + 1) {
                assert_ne!(a.name(), b.name());
            }
        }
    }
}
