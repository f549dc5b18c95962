/*
 * Scheduler Core - Framework Layer
 *
 * SchedCore owns the active policy and everything that outlives it:
 * framework-wide counters, per-process accounting, the global tick, the
 * need_resched flag, and a generic FIFO ready queue that stands in for
 * any capability the active policy does not provide.
 *
 * Every scheduling point funnels through here. The core consults the
 * policy's capability set, delegates when the entry is present, and falls
 * back otherwise, so a partially-implemented policy still yields a
 * functioning system.
 */

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::config::{DEFAULT_QUANTUM, MAX_QUANTUM, MIN_QUANTUM, NPROC, PRIORITY_MAX, PRIORITY_MIN};
use crate::policies::make_policy;
use crate::pool::SlotPool;
use crate::stats::{PolicyStats, ProcStats, SchedStats};
use crate::traits::{KernelCtx, PolicyCaps, SchedPolicy};
use crate::types::{Pid, PolicyKind, ProcState, SchedError};

struct ReadyNode {
    pid: Pid,
    priority: u32,
    time_slice: u32,
    enqueue_time: u64,
    next: Option<usize>,
    prev: Option<usize>,
}

/// Generic FIFO ready queue; the fallback when the active policy does not
/// manage its own ready structures.
struct ReadyQueue {
    pool: SlotPool<ReadyNode>,
    head: Option<usize>,
    tail: Option<usize>,
    count: u32,
}

impl ReadyQueue {
    fn new() -> Self {
        Self {
            pool: SlotPool::new(NPROC),
            head: None,
            tail: None,
            count: 0,
        }
    }

    fn enqueue(&mut self, pid: Pid, priority: u32, time_slice: u32, now: u64) -> bool {
        let tail = self.tail;
        let idx = match self.pool.alloc(ReadyNode {
            pid,
            priority,
            time_slice,
            enqueue_time: now,
            next: None,
            prev: tail,
        }) {
            Some(idx) => idx,
            None => return false,
        };

        match tail {
            Some(t) => {
                if let Some(n) = self.pool.get_mut(t) {
                    n.next = Some(idx);
                }
            }
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.count += 1;
        true
    }

    fn dequeue(&mut self, pid: Pid) -> bool {
        let mut cur = self.head;
        while let Some(idx) = cur {
            let (npid, next, prev) = match self.pool.get(idx) {
                Some(n) => (n.pid, n.next, n.prev),
                None => return false,
            };
            if npid == pid {
                match prev {
                    Some(p) => {
                        if let Some(n) = self.pool.get_mut(p) {
                            n.next = next;
                        }
                    }
                    None => self.head = next,
                }
                match next {
                    Some(nx) => {
                        if let Some(n) = self.pool.get_mut(nx) {
                            n.prev = prev;
                        }
                    }
                    None => self.tail = prev,
                }
                self.count -= 1;
                self.pool.free(idx);
                return true;
            }
            cur = next;
        }
        false
    }

    fn peek(&self) -> Option<Pid> {
        self.head.and_then(|i| self.pool.get(i)).map(|n| n.pid)
    }

    fn pop(&mut self) -> Option<Pid> {
        let head = self.head?;
        let (pid, next) = {
            let n = self.pool.get(head)?;
            (n.pid, n.next)
        };

        self.head = next;
        match next {
            Some(nx) => {
                if let Some(n) = self.pool.get_mut(nx) {
                    n.prev = None;
                }
            }
            None => self.tail = None,
        }
        self.count -= 1;
        self.pool.free(head);
        Some(pid)
    }

    fn contains(&self, pid: Pid) -> bool {
        let mut cur = self.head;
        while let Some(idx) = cur {
            match self.pool.get(idx) {
                Some(n) => {
                    if n.pid == pid {
                        return true;
                    }
                    cur = n.next;
                }
                None => return false,
            }
        }
        false
    }

    fn validate(&self, ctx: &dyn KernelCtx) -> bool {
        let mut valid = true;
        let mut traversed = 0u32;
        let mut cur = self.head;

        while let Some(idx) = cur {
            let node = match self.pool.get(idx) {
                Some(n) => n,
                None => {
                    log::warn!("ready: dangling index {}", idx);
                    return false;
                }
            };
            traversed += 1;

            if !node.pid.is_valid() {
                log::warn!("ready: invalid pid {} in queue", node.pid);
                valid = false;
            } else if ctx.proc_state(node.pid) != ProcState::Ready {
                log::warn!(
                    "ready: pid {} queued but state {}",
                    node.pid,
                    ctx.proc_state(node.pid).tag()
                );
                valid = false;
            }

            cur = node.next;
            if traversed as usize > NPROC {
                log::warn!("ready: queue appears circular");
                return false;
            }
        }

        if traversed != self.count {
            log::warn!("ready: count mismatch: {} vs {}", traversed, self.count);
            valid = false;
        }
        if self.pool.in_use() != traversed as usize {
            log::warn!(
                "ready: pool accounting broken: {} in use vs {} queued",
                self.pool.in_use(),
                traversed
            );
            valid = false;
        }
        valid
    }

    fn dump(&self) {
        log::info!("=== Ready Queue ===");
        log::info!("count: {}", self.count);
        let mut cur = self.head;
        while let Some(idx) = cur {
            match self.pool.get(idx) {
                Some(n) => {
                    log::info!(
                        "pid {:>3}  priority {:>2}  slice {:>4}  enqueued @{}",
                        n.pid,
                        n.priority,
                        n.time_slice,
                        n.enqueue_time
                    );
                    cur = n.next;
                }
                None => break,
            }
        }
    }
}

/// The framework core: one active policy plus everything that survives a
/// policy switch.
pub struct SchedCore {
    policy: Box<dyn SchedPolicy>,
    kind: PolicyKind,
    stats: SchedStats,
    proc_stats: Vec<ProcStats>,
    ready: ReadyQueue,
    need_resched: bool,
    system_ticks: u64,
    quantum: u32,
    quantum_remaining: u32,
}

impl SchedCore {
    pub fn new(kind: PolicyKind) -> Self {
        let policy = make_policy(kind);
        log::info!("scheduler initialized: {}", policy.name());
        Self {
            policy,
            kind,
            stats: SchedStats::default(),
            proc_stats: vec![ProcStats::default(); NPROC],
            ready: ReadyQueue::new(),
            need_resched: false,
            system_ticks: 0,
            quantum: DEFAULT_QUANTUM,
            quantum_remaining: DEFAULT_QUANTUM,
        }
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Mutable access to the active policy for policy-specific surfaces
    /// (tickets, nice values, RT task parameters).
    pub fn policy_mut(&mut self) -> &mut dyn SchedPolicy {
        &mut *self.policy
    }

    pub fn policy(&self) -> &dyn SchedPolicy {
        &*self.policy
    }

    /// Shut down the active policy and hand control to a fresh one.
    ///
    /// Processes queued inside the old policy are NOT migrated; the
    /// caller re-enqueues any survivors through `sched_ready`. Framework
    /// and per-process counters persist across the switch.
    pub fn switch_policy(&mut self, ctx: &mut dyn KernelCtx, kind: PolicyKind) {
        self.policy.shutdown(ctx);
        self.policy = make_policy(kind);
        self.kind = kind;
        log::info!("scheduler switched to: {}", self.policy.name());
    }

    pub fn shutdown(&mut self, ctx: &mut dyn KernelCtx) {
        self.policy.shutdown(ctx);
    }

    /// Run one scheduling decision. Clears `need_resched`; either a
    /// context switch happens or nothing changes.
    pub fn schedule(&mut self, ctx: &mut dyn KernelCtx) {
        self.stats.total_schedules += 1;
        self.need_resched = false;

        let before = ctx.current();
        let switched = if self.policy.caps().contains(PolicyCaps::SCHEDULE) {
            self.policy.schedule(ctx)
        } else {
            self.generic_schedule(ctx)
        };

        if switched {
            self.stats.context_switches += 1;
            if let Some(pid) = ctx.current() {
                if pid.is_valid() && Some(pid) != before {
                    let ps = &mut self.proc_stats[pid.0];
                    ps.times_scheduled += 1;
                    ps.context_switches += 1;
                    ps.last_scheduled = self.system_ticks;
                    ps.last_runtime = 0;
                }
            }
        }
    }

    fn generic_schedule(&mut self, ctx: &mut dyn KernelCtx) -> bool {
        let next = match self.ready.pop() {
            Some(pid) => pid,
            None => return false,
        };
        self.stats.runnable_count = self.stats.runnable_count.saturating_sub(1);

        let old = ctx.current();
        if old == Some(next) {
            return false;
        }

        if let Some(old_pid) = old {
            if ctx.proc_state(old_pid) == ProcState::Running {
                ctx.set_proc_state(old_pid, ProcState::Ready);
            }
        }
        ctx.set_proc_state(next, ProcState::Running);
        self.quantum_remaining = self.quantum;
        ctx.context_switch(old, next);
        true
    }

    /// Mark a reschedule as wanted and run one immediately.
    pub fn resched(&mut self, ctx: &mut dyn KernelCtx) {
        self.need_resched = true;
        self.schedule(ctx);
    }

    pub fn yield_cpu(&mut self, ctx: &mut dyn KernelCtx) {
        self.stats.voluntary_yields += 1;
        if let Some(pid) = ctx.current() {
            if pid.is_valid() {
                self.proc_stats[pid.0].voluntary_switches += 1;
            }
        }

        if self.policy.caps().contains(PolicyCaps::YIELD) {
            self.policy.yield_cpu(ctx);
        } else {
            if let Some(pid) = ctx.current() {
                if ctx.proc_state(pid) == ProcState::Running {
                    ctx.set_proc_state(pid, ProcState::Ready);
                    self.enqueue_fallback(ctx, pid);
                }
            }
            self.resched(ctx);
        }
    }

    pub fn preempt(&mut self, ctx: &mut dyn KernelCtx) {
        self.stats.preemptions += 1;
        if let Some(pid) = ctx.current() {
            if pid.is_valid() {
                self.proc_stats[pid.0].involuntary_switches += 1;
            }
        }

        if self.policy.caps().contains(PolicyCaps::PREEMPT) {
            self.policy.preempt(ctx);
        } else {
            if let Some(pid) = ctx.current() {
                if ctx.proc_state(pid) == ProcState::Running {
                    ctx.set_proc_state(pid, ProcState::Ready);
                    self.enqueue_fallback(ctx, pid);
                }
            }
            self.resched(ctx);
        }
    }

    fn enqueue_fallback(&mut self, ctx: &mut dyn KernelCtx, pid: Pid) {
        if self.ready.contains(pid) {
            return;
        }
        let priority = ctx.proc_priority(pid);
        if self
            .ready
            .enqueue(pid, priority, self.quantum, self.system_ticks)
        {
            self.stats.runnable_count += 1;
            if self.stats.runnable_count > self.stats.max_runnable {
                self.stats.max_runnable = self.stats.runnable_count;
            }
        }
    }

    /// Admit a process to the ready structures of the active policy.
    pub fn sched_ready(&mut self, ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() {
            return;
        }
        if self.policy.caps().contains(PolicyCaps::ENQUEUE) {
            self.policy.enqueue(ctx, pid);
        } else {
            self.enqueue_fallback(ctx, pid);
        }
        if self.policy.check_preempt(ctx) {
            self.need_resched = true;
        }
    }

    /// A process stopped being runnable; pull it out before the next
    /// scheduling decision.
    pub fn sched_block(&mut self, ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() {
            return;
        }
        self.stats.blocked_count += 1;

        if self.policy.caps().contains(PolicyCaps::DEQUEUE) {
            self.policy.dequeue(ctx, pid);
        } else if self.ready.dequeue(pid) {
            self.stats.runnable_count = self.stats.runnable_count.saturating_sub(1);
        }

        if ctx.current() == Some(pid) {
            self.resched(ctx);
        }
    }

    /// A blocked process became runnable again.
    pub fn sched_wakeup(&mut self, ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() {
            return;
        }
        self.stats.blocked_count = self.stats.blocked_count.saturating_sub(1);

        ctx.set_proc_state(pid, ProcState::Ready);
        if self.policy.caps().contains(PolicyCaps::ENQUEUE) {
            self.policy.enqueue(ctx, pid);
        } else {
            self.enqueue_fallback(ctx, pid);
        }

        if let Some(curr) = ctx.current() {
            if ctx.proc_priority(pid) > ctx.proc_priority(curr) {
                self.need_resched = true;
            }
        }
        if self.policy.check_preempt(ctx) {
            self.need_resched = true;
        }
    }

    /// A pid was (re)allocated; start its accounting from zero.
    pub fn sched_new_process(&mut self, pid: Pid) {
        if pid.is_valid() {
            self.proc_stats[pid.0] = ProcStats::default();
        }
    }

    /// A process exited; drop every trace of it from the ready
    /// structures.
    pub fn sched_exit(&mut self, ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() {
            return;
        }

        if self.policy.caps().contains(PolicyCaps::DEQUEUE) {
            self.policy.dequeue(ctx, pid);
        } else if self.ready.dequeue(pid) {
            self.stats.runnable_count = self.stats.runnable_count.saturating_sub(1);
        }

        if ctx.current() == Some(pid) {
            self.resched(ctx);
        }
    }

    /// Set a process's priority; returns the old value.
    pub fn setpriority(
        &mut self,
        ctx: &mut dyn KernelCtx,
        pid: Pid,
        priority: u32,
    ) -> Result<u32, SchedError> {
        if !pid.is_valid() {
            return Err(SchedError::InvalidPid);
        }
        if ctx.proc_state(pid) == ProcState::Free {
            return Err(SchedError::ProcessFree);
        }

        let priority = priority.min(PRIORITY_MAX);
        let old = ctx.proc_priority(pid);

        if self.policy.caps().contains(PolicyCaps::SET_PRIORITY) {
            if self.policy.set_priority(ctx, pid, priority) {
                self.need_resched = true;
            }
        } else {
            ctx.set_proc_priority(pid, priority);
        }

        if ctx.proc_state(pid) == ProcState::Ready {
            self.resched(ctx);
        }
        Ok(old)
    }

    pub fn getpriority(&self, ctx: &dyn KernelCtx, pid: Pid) -> Result<u32, SchedError> {
        if !pid.is_valid() {
            return Err(SchedError::InvalidPid);
        }
        if ctx.proc_state(pid) == ProcState::Free {
            return Err(SchedError::ProcessFree);
        }

        if self.policy.caps().contains(PolicyCaps::GET_PRIORITY) {
            if let Some(p) = self.policy.get_priority(ctx, pid) {
                return Ok(p);
            }
        }
        Ok(ctx.proc_priority(pid))
    }

    /// Adjust the current process's priority by a niceness increment;
    /// positive increments lower the priority. Returns the new value.
    pub fn nice(&mut self, ctx: &mut dyn KernelCtx, increment: i32) -> Result<u32, SchedError> {
        let pid = ctx.current().ok_or(SchedError::InvalidPid)?;
        if !pid.is_valid() {
            return Err(SchedError::InvalidPid);
        }

        let new_priority = (ctx.proc_priority(pid) as i64 - increment as i64)
            .clamp(PRIORITY_MIN as i64, PRIORITY_MAX as i64) as u32;
        ctx.set_proc_priority(pid, new_priority);
        Ok(new_priority)
    }

    pub fn set_quantum(&mut self, quantum: u32) {
        let quantum = quantum.clamp(MIN_QUANTUM, MAX_QUANTUM);
        self.quantum = quantum;
        if self.policy.caps().contains(PolicyCaps::QUANTUM) {
            self.policy.set_quantum(quantum);
        }
    }

    pub fn get_quantum(&self) -> u32 {
        if self.policy.caps().contains(PolicyCaps::QUANTUM) {
            self.policy.get_quantum()
        } else {
            self.quantum
        }
    }

    /// One clock unit: advance global time, charge the running process,
    /// and let the policy decide whether a reschedule is due.
    pub fn sched_tick(&mut self, ctx: &mut dyn KernelCtx) {
        self.system_ticks += 1;

        match ctx.current() {
            Some(pid) if pid.is_valid() => {
                let ps = &mut self.proc_stats[pid.0];
                ps.total_runtime += 1;
                ps.last_runtime += 1;
                self.stats.busy_time += 1;
            }
            _ => self.stats.idle_time += 1,
        }

        if self.policy.caps().contains(PolicyCaps::TICK) {
            if self.policy.tick(ctx) {
                self.need_resched = true;
            }
        } else {
            if self.quantum_remaining > 0 {
                self.quantum_remaining -= 1;
            }
            if self.quantum_remaining == 0 {
                self.stats.quantum_expirations += 1;
                self.quantum_remaining = self.quantum;
                self.need_resched = true;
            }
        }
    }

    pub fn time(&self) -> u64 {
        self.system_ticks
    }

    pub fn need_resched(&self) -> bool {
        self.need_resched
    }

    pub fn stats(&self) -> SchedStats {
        self.stats
    }

    pub fn policy_stats(&self) -> PolicyStats {
        self.policy.stats_snapshot()
    }

    pub fn proc_stats(&self, pid: Pid) -> Result<ProcStats, SchedError> {
        if !pid.is_valid() {
            return Err(SchedError::InvalidPid);
        }
        Ok(self.proc_stats[pid.0])
    }

    pub fn reset_stats(&mut self) {
        self.policy.reset_stats();
        self.stats = SchedStats::default();
        for ps in self.proc_stats.iter_mut() {
            *ps = ProcStats::default();
        }
    }

    pub fn ready_count(&self) -> u32 {
        self.ready.count
    }

    pub fn ready_peek(&self) -> Option<Pid> {
        self.ready.peek()
    }

    pub fn print_ready_queue(&self) {
        self.ready.dump();
    }

    /// Check every structural invariant the core can see: the generic
    /// ready queue, the active policy's structures, and coverage — every
    /// Ready process must sit somewhere. A Ready process nobody tracks is
    /// the visible aftermath of an exhausted node pool. Violations are
    /// logged; the core keeps running either way.
    pub fn validate(&self, ctx: &dyn KernelCtx) -> bool {
        let mut valid = self.ready.validate(ctx);

        for pid in (0..NPROC).map(Pid) {
            if ctx.proc_state(pid) == ProcState::Ready
                && !self.ready.contains(pid)
                && !self.policy.tracks(pid)
            {
                log::warn!("core: pid {} is Ready but on no ready structure", pid);
                valid = false;
            }
        }

        self.policy.validate(ctx) && valid
    }

    pub fn print_stats(&self) {
        log::info!("=== Scheduler Statistics ===");
        log::info!("policy: {}", self.policy.name());
        log::info!("total schedules: {}", self.stats.total_schedules);
        log::info!("context switches: {}", self.stats.context_switches);
        log::info!("preemptions: {}", self.stats.preemptions);
        log::info!("voluntary yields: {}", self.stats.voluntary_yields);
        log::info!("quantum expirations: {}", self.stats.quantum_expirations);
        log::info!("runnable: {}", self.stats.runnable_count);
        log::info!("blocked: {}", self.stats.blocked_count);
        log::info!("max runnable: {}", self.stats.max_runnable);
        self.policy.print_stats();
    }

    /// Human-readable dump of the whole scheduling state.
    pub fn dump(&self, ctx: &dyn KernelCtx) {
        log::info!("=== Scheduler State ===");
        log::info!("policy: {}", self.policy.name());
        log::info!(
            "current pid: {}",
            match ctx.current() {
                Some(pid) => pid.0 as i64,
                None => -1,
            }
        );
        log::info!("need_resched: {}", self.need_resched);
        log::info!("quantum: {} (remaining {})", self.quantum, self.quantum_remaining);
        log::info!("system ticks: {}", self.system_ticks);

        self.ready.dump();

        log::info!("=== Per-Process Stats ===");
        for pid in 0..NPROC {
            let state = ctx.proc_state(Pid(pid));
            if state != ProcState::Free {
                let ps = &self.proc_stats[pid];
                log::info!(
                    "pid {:>3}  {:<6} prio {:>2}  runtime {:>8}  switches {}",
                    pid,
                    state.tag(),
                    ctx.proc_priority(Pid(pid)),
                    ps.total_runtime,
                    ps.context_switches
                );
            }
        }

        self.policy.dump(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimKernel;
    use crate::stats::RrStats;

    /// A policy that provides nothing, to exercise every fallback path.
    struct NullPolicy;

    impl SchedPolicy for NullPolicy {
        fn name(&self) -> &'static str {
            "null"
        }
        fn kind(&self) -> PolicyKind {
            PolicyKind::RoundRobin
        }
        fn caps(&self) -> PolicyCaps {
            PolicyCaps::empty()
        }
        fn stats_snapshot(&self) -> PolicyStats {
            PolicyStats::RoundRobin(RrStats::default())
        }
    }

    fn core_with_null_policy() -> SchedCore {
        let mut core = SchedCore::new(PolicyKind::RoundRobin);
        core.policy = Box::new(NullPolicy);
        core
    }

    #[test]
    fn fallback_queue_runs_processes_fifo() {
        let mut core = core_with_null_policy();
        let mut sim = SimKernel::new();
        for p in 1..=3 {
            sim.spawn(Pid(p), 50);
            core.sched_ready(&mut sim, Pid(p));
        }
        assert_eq!(core.ready_count(), 3);
        assert_eq!(core.ready_peek(), Some(Pid(1)));

        core.schedule(&mut sim);
        assert_eq!(sim.current(), Some(Pid(1)));
        core.yield_cpu(&mut sim);
        assert_eq!(sim.current(), Some(Pid(2)));
        assert!(core.validate(&sim));
    }

    #[test]
    fn fallback_tick_expires_quantum() {
        let mut core = core_with_null_policy();
        let mut sim = SimKernel::new();
        sim.spawn(Pid(1), 50);
        core.sched_ready(&mut sim, Pid(1));
        core.schedule(&mut sim);

        for _ in 0..DEFAULT_QUANTUM {
            core.sched_tick(&mut sim);
        }
        assert!(core.need_resched());
        assert_eq!(core.stats().quantum_expirations, 1);
    }

    #[test]
    fn setpriority_validates_pid_and_state() {
        let mut core = SchedCore::new(PolicyKind::Priority);
        let mut sim = SimKernel::new();
        assert_eq!(
            core.setpriority(&mut sim, Pid(NPROC + 1), 10),
            Err(SchedError::InvalidPid)
        );
        assert_eq!(
            core.setpriority(&mut sim, Pid(3), 10),
            Err(SchedError::ProcessFree)
        );

        sim.spawn(Pid(3), 40);
        assert_eq!(core.setpriority(&mut sim, Pid(3), 150), Ok(40));
        assert_eq!(core.getpriority(&sim, Pid(3)), Ok(PRIORITY_MAX));
    }

    #[test]
    fn nice_lowers_priority_with_positive_increment() {
        let mut core = SchedCore::new(PolicyKind::RoundRobin);
        let mut sim = SimKernel::new();
        sim.spawn(Pid(2), 50);
        sim.context_switch(None, Pid(2));

        assert_eq!(core.nice(&mut sim, 10), Ok(40));
        assert_eq!(core.nice(&mut sim, -30), Ok(70));
        assert_eq!(core.nice(&mut sim, 1000), Ok(PRIORITY_MIN));
    }

    #[test]
    fn quantum_clamps_to_framework_range() {
        let mut core = core_with_null_policy();
        core.set_quantum(0);
        assert_eq!(core.get_quantum(), MIN_QUANTUM);
        core.set_quantum(100_000);
        assert_eq!(core.get_quantum(), MAX_QUANTUM);
    }

    #[test]
    fn stats_persist_across_policy_switch() {
        let mut core = SchedCore::new(PolicyKind::RoundRobin);
        let mut sim = SimKernel::new();
        sim.spawn(Pid(1), 50);
        sim.spawn(Pid(2), 50);
        core.sched_ready(&mut sim, Pid(1));
        core.sched_ready(&mut sim, Pid(2));
        core.schedule(&mut sim);
        for _ in 0..50 {
            core.sched_tick(&mut sim);
            if core.need_resched() {
                core.schedule(&mut sim);
            }
        }
        let before = core.stats();
        assert!(before.context_switches > 0);

        core.switch_policy(&mut sim, PolicyKind::Cfs);
        let after = core.stats();
        assert_eq!(before.context_switches, after.context_switches);
        assert_eq!(before.total_schedules, after.total_schedules);
        assert_eq!(core.policy_kind(), PolicyKind::Cfs);
        assert_eq!(core.time(), 50);
    }

    #[test]
    fn switch_to_same_kind_is_idempotent_when_quiescent() {
        let mut core = SchedCore::new(PolicyKind::RoundRobin);
        let mut sim = SimKernel::new();
        core.switch_policy(&mut sim, PolicyKind::Lottery);
        core.switch_policy(&mut sim, PolicyKind::Lottery);
        assert_eq!(core.policy_kind(), PolicyKind::Lottery);
        assert!(core.validate(&sim));
        assert!(matches!(core.policy_stats(), PolicyStats::Lottery(_)));
    }

    #[test]
    fn schedule_clears_need_resched() {
        let mut core = SchedCore::new(PolicyKind::RoundRobin);
        let mut sim = SimKernel::new();
        sim.spawn(Pid(1), 50);
        core.sched_ready(&mut sim, Pid(1));
        core.resched(&mut sim);
        assert!(!core.need_resched());
    }

    #[test]
    fn exit_of_current_reschedules() {
        let mut core = SchedCore::new(PolicyKind::RoundRobin);
        let mut sim = SimKernel::new();
        sim.spawn(Pid(1), 50);
        sim.spawn(Pid(2), 50);
        core.sched_ready(&mut sim, Pid(1));
        core.sched_ready(&mut sim, Pid(2));
        core.schedule(&mut sim);
        assert_eq!(sim.current(), Some(Pid(1)));

        core.sched_exit(&mut sim, Pid(1));
        sim.reap(Pid(1));
        core.schedule(&mut sim);
        assert_eq!(sim.current(), Some(Pid(2)));
    }

    #[test]
    fn ready_process_on_no_structure_fails_validate() {
        let mut core = SchedCore::new(PolicyKind::RoundRobin);
        let mut sim = SimKernel::new();
        sim.spawn(Pid(5), 50);
        // Ready in the table, never admitted anywhere: exactly what a
        // silently dropped enqueue leaves behind.
        assert!(!core.validate(&sim));

        core.sched_ready(&mut sim, Pid(5));
        assert!(core.validate(&sim));
    }

    #[test]
    fn proc_stats_track_runtime() {
        let mut core = SchedCore::new(PolicyKind::RoundRobin);
        let mut sim = SimKernel::new();
        sim.spawn(Pid(1), 50);
        core.sched_ready(&mut sim, Pid(1));
        core.schedule(&mut sim);
        for _ in 0..7 {
            core.sched_tick(&mut sim);
        }
        let ps = core.proc_stats(Pid(1)).unwrap();
        assert_eq!(ps.total_runtime, 7);
        assert_eq!(ps.times_scheduled, 1);
        assert_eq!(core.stats().busy_time, 7);
    }
}
