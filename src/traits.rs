/*
 * Scheduler Trait Definitions
 *
 * Two traits separate scheduling policy from mechanism:
 *
 * - SchedPolicy: the capability record a policy fills in. The framework
 *   (SchedCore) holds a Box<dyn SchedPolicy> and calls through it.
 * - KernelCtx: the only way a policy may query or modify kernel state
 *   (process table fields, the current pid, the context switch).
 *
 * This separation allows swapping scheduling algorithms at runtime without
 * touching framework code, and testing policies in isolation against a
 * simulated kernel.
 */

use bitflags::bitflags;

use crate::stats::PolicyStats;
use crate::types::{Pid, PolicyKind, ProcState};

bitflags! {
    /// Which entries of the policy record a policy actually provides.
    ///
    /// Any entry may be absent. The framework consults this set before
    /// dispatching and falls back to the generic ready queue (for
    /// `ENQUEUE`/`DEQUEUE`), to direct process-table access (for the
    /// priority entries), or to its own quantum countdown (for
    /// `QUANTUM`/`TICK`).
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct PolicyCaps: u32 {
        const SCHEDULE     = 1 << 0;
        const YIELD        = 1 << 1;
        const PREEMPT      = 1 << 2;
        const ENQUEUE      = 1 << 3;
        const DEQUEUE      = 1 << 4;
        const PICK_NEXT    = 1 << 5;
        const SET_PRIORITY = 1 << 6;
        const GET_PRIORITY = 1 << 7;
        const BOOST        = 1 << 8;
        const DECAY        = 1 << 9;
        const QUANTUM      = 1 << 10;
        const TICK         = 1 << 11;
        const STATS        = 1 << 12;
    }
}

/// Kernel context handed to every policy operation.
///
/// Policies never touch the process table directly; these methods are the
/// whole surface. The implementation behind it is the embedding kernel (or
/// [`crate::sim::SimKernel`] in hosted use).
pub trait KernelCtx {
    /// State of a process; `ProcState::Free` for out-of-range pids.
    fn proc_state(&self, pid: Pid) -> ProcState;

    /// Write a process's state field.
    fn set_proc_state(&mut self, pid: Pid, state: ProcState);

    /// A process's priority field.
    fn proc_priority(&self, pid: Pid) -> u32;

    /// Write a process's priority field.
    fn set_proc_priority(&mut self, pid: Pid, priority: u32);

    /// The pid currently on the CPU, if any.
    fn current(&self) -> Option<Pid>;

    /// Save `old`'s register context and resume `new`.
    ///
    /// The implementation must record `new` as the current process before
    /// suspending the caller. All scheduler structures are already
    /// consistent when this is invoked; the call may not return for an
    /// arbitrarily long time.
    fn context_switch(&mut self, old: Option<Pid>, new: Pid);
}

/// Interrupt-disable/restore primitive supplied by the environment.
///
/// `disable` returns an opaque mask that `restore` later consumes. Use
/// [`IntrGuard`] rather than calling these directly; the guard restores on
/// every exit path.
pub trait IntrOps: Send + Sync {
    fn disable(&self) -> usize;
    fn restore(&self, mask: usize);
}

/// No-op interrupt controller for hosted environments and tests.
pub struct NoIntr;

impl IntrOps for NoIntr {
    fn disable(&self) -> usize {
        0
    }
    fn restore(&self, _mask: usize) {}
}

/// Scoped interrupt mask. Disables on construction, restores on drop.
pub struct IntrGuard<'a> {
    ops: &'a dyn IntrOps,
    mask: usize,
}

impl<'a> IntrGuard<'a> {
    pub fn new(ops: &'a dyn IntrOps) -> Self {
        let mask = ops.disable();
        Self { ops, mask }
    }
}

impl Drop for IntrGuard<'_> {
    fn drop(&mut self) {
        self.ops.restore(self.mask);
    }
}

/// The uniform policy interface.
///
/// Every policy implements this record; the framework routes all
/// scheduling points through it. Default method bodies are inert so a
/// policy only writes the entries it advertises in [`SchedPolicy::caps`].
///
/// Contracts:
/// - `schedule` picks the next runnable process, transitions the outgoing
///   process `Running -> Ready` and the incoming one `Ready -> Running`,
///   and invokes `ctx.context_switch`. It returns whether a switch
///   happened; when nothing is runnable it must leave all state unchanged.
/// - `tick` is called once per clock unit with interrupts masked. The
///   return value requests a reschedule (`need_resched`); the framework
///   runs `schedule` at the next interrupt or syscall exit.
/// - `set_priority` returns whether the change inverted priorities badly
///   enough that a reschedule is wanted.
/// - `dequeue` of a pid the policy does not track is a no-op, not an
///   error. `enqueue` on an exhausted node pool is a silent no-op;
///   `validate` reports the structural consequence.
pub trait SchedPolicy: Send {
    fn name(&self) -> &'static str;
    fn kind(&self) -> PolicyKind;
    fn caps(&self) -> PolicyCaps;

    /// Tear down before the framework drops this policy. Queued processes
    /// are not migrated; the caller re-enqueues survivors.
    fn shutdown(&mut self, _ctx: &mut dyn KernelCtx) {}

    /// Dispatch the next process. Returns true if a context switch was
    /// performed.
    fn schedule(&mut self, _ctx: &mut dyn KernelCtx) -> bool {
        false
    }

    /// Current process voluntarily gives up the CPU.
    fn yield_cpu(&mut self, _ctx: &mut dyn KernelCtx) {}

    /// Current process is forcibly displaced.
    fn preempt(&mut self, _ctx: &mut dyn KernelCtx) {}

    /// Admit a process to the policy's ready structures.
    fn enqueue(&mut self, _ctx: &mut dyn KernelCtx, _pid: Pid) {}

    /// Remove a process from the policy's structures.
    fn dequeue(&mut self, _ctx: &mut dyn KernelCtx, _pid: Pid) {}

    /// Which pid `schedule` would dispatch next, without dispatching it.
    fn pick_next(&mut self, _ctx: &mut dyn KernelCtx) -> Option<Pid> {
        None
    }

    /// Whether the policy currently holds `pid` in any of its
    /// structures. The framework uses this to spot Ready processes that
    /// fell through a full node pool.
    fn tracks(&self, _pid: Pid) -> bool {
        false
    }

    /// Update a process's priority. Returns true if a reschedule is
    /// wanted.
    fn set_priority(&mut self, _ctx: &mut dyn KernelCtx, _pid: Pid, _priority: u32) -> bool {
        false
    }

    /// The priority the policy is currently scheduling the process at.
    fn get_priority(&self, _ctx: &dyn KernelCtx, _pid: Pid) -> Option<u32> {
        None
    }

    /// Nudge a process's effective priority upward.
    fn boost_priority(&mut self, _ctx: &mut dyn KernelCtx, _pid: Pid) {}

    /// Let a process's effective priority fall back toward its base.
    fn decay_priority(&mut self, _ctx: &mut dyn KernelCtx, _pid: Pid) {}

    fn set_quantum(&mut self, _quantum: u32) {}

    fn get_quantum(&self) -> u32 {
        0
    }

    /// One clock unit elapsed. Returns true to request a reschedule.
    fn tick(&mut self, _ctx: &mut dyn KernelCtx) -> bool {
        false
    }

    /// Would the head of the ready structure preempt the current process?
    /// Consulted by the framework after wakeups and enqueues.
    fn check_preempt(&mut self, _ctx: &mut dyn KernelCtx) -> bool {
        false
    }

    /// Typed snapshot of the policy's own counters.
    fn stats_snapshot(&self) -> PolicyStats;

    fn reset_stats(&mut self) {}

    /// Human-readable counter dump through the log.
    fn print_stats(&self) {}

    /// Check the policy's structural invariants; log each violation and
    /// return false if any was found. Never repairs anything.
    fn validate(&self, _ctx: &dyn KernelCtx) -> bool {
        true
    }

    /// Human-readable structure dump through the log.
    fn dump(&self, _ctx: &dyn KernelCtx) {}
}
