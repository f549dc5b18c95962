/*
 * Round-Robin Scheduling Policy
 *
 * Circular doubly-linked FIFO with an equal time slice for everyone. The
 * cursor marks whose turn it is; quantum expiry advances the cursor and
 * asks the framework to reschedule. Simple, starvation-free, and the
 * baseline the other policies are measured against.
 */

use crate::config::{NPROC, RR_DEFAULT_QUANTUM, RR_MAX_QUANTUM, RR_MIN_QUANTUM};
use crate::pool::SlotPool;
use crate::stats::{PolicyStats, RrStats};
use crate::traits::{KernelCtx, PolicyCaps, SchedPolicy};
use crate::types::{Pid, PolicyKind, ProcState};

struct RrNode {
    pid: Pid,
    time_remaining: u32,
    total_time: u64,
    rounds: u32,
    next: usize,
    prev: usize,
}

/// Round-robin policy state: one circular queue plus the cursor.
pub struct RoundRobinPolicy {
    pool: SlotPool<RrNode>,
    head: Option<usize>,
    current: Option<usize>,
    count: u32,
    quantum: u32,
    stats: RrStats,
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self {
            pool: SlotPool::new(NPROC),
            head: None,
            current: None,
            count: 0,
            quantum: RR_DEFAULT_QUANTUM,
            stats: RrStats::default(),
        }
    }

    fn find(&self, pid: Pid) -> Option<usize> {
        let head = self.head?;
        let mut idx = head;
        loop {
            let node = self.pool.get(idx)?;
            if node.pid == pid {
                return Some(idx);
            }
            idx = node.next;
            if idx == head {
                return None;
            }
        }
    }

    /// Advance the cursor one position and hand the new holder a fresh
    /// slice. With zero or one queued process this is a no-op.
    pub fn rotate(&mut self) {
        if let Some(curr) = self.current {
            if self.count > 1 {
                let next = {
                    let node = match self.pool.get_mut(curr) {
                        Some(n) => n,
                        None => return,
                    };
                    node.rounds += 1;
                    node.next
                };
                let quantum = self.quantum;
                if let Some(node) = self.pool.get_mut(next) {
                    node.time_remaining = quantum;
                }
                self.current = Some(next);
            }
        }
    }

    /// Hand `pid` a fresh slice without moving the cursor.
    pub fn reset_slice(&mut self, pid: Pid) {
        let quantum = self.quantum;
        if let Some(idx) = self.find(pid) {
            if let Some(node) = self.pool.get_mut(idx) {
                node.time_remaining = quantum;
            }
        }
    }

    pub fn queue_len(&self) -> u32 {
        self.count
    }

    pub fn stats(&self) -> RrStats {
        self.stats
    }
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedPolicy for RoundRobinPolicy {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::RoundRobin
    }

    fn caps(&self) -> PolicyCaps {
        PolicyCaps::SCHEDULE
            | PolicyCaps::YIELD
            | PolicyCaps::PREEMPT
            | PolicyCaps::ENQUEUE
            | PolicyCaps::DEQUEUE
            | PolicyCaps::PICK_NEXT
            | PolicyCaps::QUANTUM
            | PolicyCaps::TICK
    }

    fn shutdown(&mut self, _ctx: &mut dyn KernelCtx) {
        self.pool.clear();
        self.head = None;
        self.current = None;
        self.count = 0;
    }

    fn schedule(&mut self, ctx: &mut dyn KernelCtx) -> bool {
        let next_pid = match self.current.and_then(|i| self.pool.get(i)).map(|n| n.pid) {
            Some(pid) => pid,
            None => return false,
        };

        let old = ctx.current();
        if old == Some(next_pid) {
            return false;
        }

        if let Some(old_pid) = old {
            if ctx.proc_state(old_pid) == ProcState::Running {
                ctx.set_proc_state(old_pid, ProcState::Ready);
            }
        }
        ctx.set_proc_state(next_pid, ProcState::Running);

        self.stats.total_context_switches += 1;
        ctx.context_switch(old, next_pid);
        true
    }

    fn yield_cpu(&mut self, ctx: &mut dyn KernelCtx) {
        if let Some(curr) = self.current {
            if let Some(node) = self.pool.get_mut(curr) {
                node.time_remaining = 0;
            }
        }

        if let Some(pid) = ctx.current() {
            if ctx.proc_state(pid) == ProcState::Running {
                ctx.set_proc_state(pid, ProcState::Ready);
            }
        }

        self.rotate();
        self.schedule(ctx);
    }

    fn preempt(&mut self, ctx: &mut dyn KernelCtx) {
        // Forced displacement behaves exactly like a voluntary yield here.
        self.yield_cpu(ctx);
    }

    fn enqueue(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() || self.find(pid).is_some() {
            return;
        }

        let idx = match self.pool.alloc(RrNode {
            pid,
            time_remaining: self.quantum,
            total_time: 0,
            rounds: 0,
            next: 0,
            prev: 0,
        }) {
            Some(idx) => idx,
            None => return,
        };

        match self.head {
            None => {
                if let Some(node) = self.pool.get_mut(idx) {
                    node.next = idx;
                    node.prev = idx;
                }
                self.head = Some(idx);
                self.current = Some(idx);
            }
            Some(head) => {
                // Append at the tail, which is head.prev in a circle.
                let tail = self.pool.get(head).map(|n| n.prev).unwrap_or(head);
                if let Some(node) = self.pool.get_mut(idx) {
                    node.next = head;
                    node.prev = tail;
                }
                if let Some(node) = self.pool.get_mut(tail) {
                    node.next = idx;
                }
                if let Some(node) = self.pool.get_mut(head) {
                    node.prev = idx;
                }
            }
        }

        self.count += 1;
        self.stats.total_processes += 1;
        if self.count > self.stats.max_queue_length {
            self.stats.max_queue_length = self.count;
        }
        self.stats.current_queue_length = self.count;
    }

    fn dequeue(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() {
            return;
        }
        let idx = match self.find(pid) {
            Some(idx) => idx,
            None => return,
        };

        let (next, prev) = match self.pool.get(idx) {
            Some(n) => (n.next, n.prev),
            None => return,
        };

        if next == idx {
            self.head = None;
            self.current = None;
        } else {
            if let Some(node) = self.pool.get_mut(prev) {
                node.next = next;
            }
            if let Some(node) = self.pool.get_mut(next) {
                node.prev = prev;
            }
            if self.head == Some(idx) {
                self.head = Some(next);
            }
            if self.current == Some(idx) {
                self.current = Some(next);
            }
        }

        self.count -= 1;
        self.stats.current_queue_length = self.count;
        self.pool.free(idx);
    }

    fn pick_next(&mut self, _ctx: &mut dyn KernelCtx) -> Option<Pid> {
        self.current.and_then(|i| self.pool.get(i)).map(|n| n.pid)
    }

    fn tracks(&self, pid: Pid) -> bool {
        self.find(pid).is_some()
    }

    fn set_quantum(&mut self, quantum: u32) {
        self.quantum = quantum.clamp(RR_MIN_QUANTUM, RR_MAX_QUANTUM);
    }

    fn get_quantum(&self) -> u32 {
        self.quantum
    }

    fn tick(&mut self, ctx: &mut dyn KernelCtx) -> bool {
        let curr = match self.current {
            Some(idx) => idx,
            None => return false,
        };

        let expired = {
            let node = match self.pool.get_mut(curr) {
                Some(n) => n,
                None => return false,
            };
            if ctx.current() != Some(node.pid) {
                return false;
            }
            node.total_time += 1;
            if node.time_remaining > 0 {
                node.time_remaining -= 1;
            }
            node.time_remaining == 0
        };

        if expired {
            self.stats.total_quantum_expires += 1;
            self.rotate();
        }
        expired
    }

    fn stats_snapshot(&self) -> PolicyStats {
        PolicyStats::RoundRobin(self.stats)
    }

    fn reset_stats(&mut self) {
        self.stats = RrStats::default();
        self.stats.current_queue_length = self.count;
    }

    fn print_stats(&self) {
        log::info!("=== Round-Robin Statistics ===");
        log::info!(
            "queue length: {} (max {})",
            self.stats.current_queue_length,
            self.stats.max_queue_length
        );
        log::info!("processes admitted: {}", self.stats.total_processes);
        log::info!("context switches: {}", self.stats.total_context_switches);
        log::info!("quantum expirations: {}", self.stats.total_quantum_expires);
        log::info!("quantum: {} ticks", self.quantum);
    }

    fn validate(&self, _ctx: &dyn KernelCtx) -> bool {
        let mut valid = true;

        let head = match self.head {
            Some(head) => head,
            None => {
                if self.count != 0 {
                    log::warn!("rr: empty queue but count = {}", self.count);
                    valid = false;
                }
                return valid;
            }
        };

        let mut idx = head;
        let mut traversed = 0u32;
        loop {
            let node = match self.pool.get(idx) {
                Some(n) => n,
                None => {
                    log::warn!("rr: dangling index {} in queue", idx);
                    return false;
                }
            };
            traversed += 1;

            if !node.pid.is_valid() {
                log::warn!("rr: invalid pid {} in queue", node.pid);
                valid = false;
            }
            match self.pool.get(node.next) {
                Some(next) => {
                    if next.prev != idx {
                        log::warn!("rr: link mismatch at pid {}", node.pid);
                        valid = false;
                    }
                }
                None => {
                    log::warn!("rr: broken forward link at pid {}", node.pid);
                    return false;
                }
            }

            idx = node.next;
            if idx == head {
                break;
            }
            if traversed as usize > NPROC {
                log::warn!("rr: queue corrupted (too many nodes)");
                return false;
            }
        }

        if traversed != self.count {
            log::warn!("rr: count mismatch: {} traversed vs {} stored", traversed, self.count);
            valid = false;
        }
        valid
    }

    fn dump(&self, _ctx: &dyn KernelCtx) {
        log::info!("=== Round-Robin Queue ===");
        log::info!("count: {}, quantum: {} ticks", self.count, self.quantum);

        let head = match self.head {
            Some(head) => head,
            None => return,
        };
        let mut idx = head;
        let mut seen = 0usize;
        loop {
            if let Some(node) = self.pool.get(idx) {
                let marker = if self.current == Some(idx) { '*' } else { ' ' };
                log::info!(
                    "{}pid {:>3}  left {:>4}  total {:>6}  rounds {}",
                    marker,
                    node.pid,
                    node.time_remaining,
                    node.total_time,
                    node.rounds
                );
                idx = node.next;
            } else {
                break;
            }
            seen += 1;
            if idx == head || seen > NPROC {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimKernel;
    use crate::traits::SchedPolicy;

    fn setup(pids: &[usize]) -> (RoundRobinPolicy, SimKernel) {
        let mut sim = SimKernel::new();
        let mut rr = RoundRobinPolicy::new();
        for &p in pids {
            sim.spawn(Pid(p), 50);
            rr.enqueue(&mut sim, Pid(p));
        }
        (rr, sim)
    }

    #[test]
    fn enqueue_dequeue_restores_initial_state() {
        let (mut rr, mut sim) = setup(&[1, 2, 3]);
        assert_eq!(rr.queue_len(), 3);

        rr.enqueue(&mut sim, Pid(9));
        rr.dequeue(&mut sim, Pid(9));

        assert_eq!(rr.queue_len(), 3);
        assert!(rr.validate(&sim));
        assert_eq!(rr.pick_next(&mut sim), Some(Pid(1)));
    }

    #[test]
    fn duplicate_enqueue_is_ignored() {
        let (mut rr, mut sim) = setup(&[1]);
        rr.enqueue(&mut sim, Pid(1));
        assert_eq!(rr.queue_len(), 1);
    }

    #[test]
    fn dequeue_of_nonmember_is_noop() {
        let (mut rr, mut sim) = setup(&[1, 2]);
        rr.dequeue(&mut sim, Pid(7));
        assert_eq!(rr.queue_len(), 2);
        assert!(rr.validate(&sim));
    }

    #[test]
    fn quantum_expiry_rotates_cursor() {
        let (mut rr, mut sim) = setup(&[1, 2, 3]);
        rr.schedule(&mut sim);
        assert_eq!(sim.current(), Some(Pid(1)));

        let mut requested = false;
        for _ in 0..10 {
            requested = rr.tick(&mut sim);
        }
        assert!(requested);
        assert_eq!(rr.pick_next(&mut sim), Some(Pid(2)));

        rr.schedule(&mut sim);
        assert_eq!(sim.current(), Some(Pid(2)));
    }

    #[test]
    fn yield_moves_to_next_process() {
        let (mut rr, mut sim) = setup(&[1, 2]);
        rr.schedule(&mut sim);
        rr.yield_cpu(&mut sim);
        assert_eq!(sim.current(), Some(Pid(2)));
        assert_eq!(sim.proc_state(Pid(1)), ProcState::Ready);
        assert_eq!(sim.proc_state(Pid(2)), ProcState::Running);
    }

    #[test]
    fn quantum_is_clamped() {
        let mut rr = RoundRobinPolicy::new();
        rr.set_quantum(0);
        assert_eq!(rr.get_quantum(), RR_MIN_QUANTUM);
        rr.set_quantum(500);
        assert_eq!(rr.get_quantum(), RR_MAX_QUANTUM);
    }

    #[test]
    fn dequeue_of_cursor_advances_it() {
        let (mut rr, mut sim) = setup(&[1, 2, 3]);
        rr.dequeue(&mut sim, Pid(1));
        assert_eq!(rr.pick_next(&mut sim), Some(Pid(2)));
        assert_eq!(rr.queue_len(), 2);
        assert!(rr.validate(&sim));
    }

    #[test]
    fn pool_accounting_matches_queue() {
        let (mut rr, mut sim) = setup(&[1, 2, 3]);
        rr.dequeue(&mut sim, Pid(2));
        assert_eq!(rr.pool.in_use(), 2);
        assert_eq!(rr.pool.in_use() + rr.pool.free_count(), rr.pool.capacity());
    }
}
