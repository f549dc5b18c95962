/*
 * Simulated Kernel Environment
 *
 * Reference implementation of the external collaborators: a process table
 * with state and priority fields, a current-pid register, and a context
 * switch that just records the handoff. The test suite drives every
 * policy through this; an embedding kernel replaces it with the real
 * thing.
 */

use alloc::vec::Vec;

use crate::config::NPROC;
use crate::traits::KernelCtx;
use crate::types::{Pid, ProcState};

#[derive(Debug, Copy, Clone)]
struct SimProc {
    state: ProcState,
    priority: u32,
}

/// In-memory stand-in for the kernel surrounding the scheduler.
pub struct SimKernel {
    procs: [SimProc; NPROC],
    current: Option<Pid>,
    /// Every context switch performed, oldest first.
    pub switches: Vec<(Option<Pid>, Pid)>,
}

impl SimKernel {
    pub fn new() -> Self {
        Self {
            procs: [SimProc {
                state: ProcState::Free,
                priority: 0,
            }; NPROC],
            current: None,
            switches: Vec::new(),
        }
    }

    /// Put a process into the table in the Ready state.
    pub fn spawn(&mut self, pid: Pid, priority: u32) {
        if pid.is_valid() {
            self.procs[pid.0] = SimProc {
                state: ProcState::Ready,
                priority,
            };
        }
    }

    /// Release a table slot.
    pub fn reap(&mut self, pid: Pid) {
        if pid.is_valid() {
            self.procs[pid.0].state = ProcState::Free;
            if self.current == Some(pid) {
                self.current = None;
            }
        }
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub fn proc_state(&self, pid: Pid) -> ProcState {
        if pid.is_valid() {
            self.procs[pid.0].state
        } else {
            ProcState::Free
        }
    }

    pub fn switch_count(&self) -> usize {
        self.switches.len()
    }
}

impl Default for SimKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelCtx for SimKernel {
    fn proc_state(&self, pid: Pid) -> ProcState {
        SimKernel::proc_state(self, pid)
    }

    fn set_proc_state(&mut self, pid: Pid, state: ProcState) {
        if pid.is_valid() {
            self.procs[pid.0].state = state;
        }
    }

    fn proc_priority(&self, pid: Pid) -> u32 {
        if pid.is_valid() {
            self.procs[pid.0].priority
        } else {
            0
        }
    }

    fn set_proc_priority(&mut self, pid: Pid, priority: u32) {
        if pid.is_valid() {
            self.procs[pid.0].priority = priority;
        }
    }

    fn current(&self) -> Option<Pid> {
        self.current
    }

    fn context_switch(&mut self, old: Option<Pid>, new: Pid) {
        self.switches.push((old, new));
        self.current = Some(new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_switch_updates_current() {
        let mut sim = SimKernel::new();
        sim.spawn(Pid(1), 50);
        sim.context_switch(None, Pid(1));
        assert_eq!(sim.current(), Some(Pid(1)));
        assert_eq!(sim.switch_count(), 1);
        assert_eq!(sim.switches[0], (None, Pid(1)));
    }

    #[test]
    fn out_of_range_pids_read_as_free() {
        let sim = SimKernel::new();
        assert_eq!(sim.proc_state(Pid(NPROC + 5)), ProcState::Free);
    }
}
