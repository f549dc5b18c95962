/*
 * Aging Priority Scheduling Policy
 *
 * One list sorted descending by current priority; the head runs next.
 * Two feedback loops fight starvation: periodic aging raises everyone who
 * waits, and a per-tick guard gives an outsized boost to anyone queued
 * past the starvation threshold. Decay walks an inflated priority back
 * toward its base, never below it.
 */

use crate::config::{
    NPROC, PRIORITY_MAX, PRIO_AGING_AMOUNT, PRIO_AGING_ENABLED, PRIO_AGING_INTERVAL,
    PRIO_STARVATION_BOOST, PRIO_STARVATION_THRESHOLD,
};
use crate::pool::SlotPool;
use crate::stats::{PolicyStats, PrioStats};
use crate::traits::{KernelCtx, PolicyCaps, SchedPolicy};
use crate::types::{Pid, PolicyKind, ProcState};

struct PrioNode {
    pid: Pid,
    base_priority: u32,
    current_priority: u32,
    wait_time: u64,
    last_run: u64,
    next: Option<usize>,
}

pub struct PriorityPolicy {
    pool: SlotPool<PrioNode>,
    head: Option<usize>,
    count: u32,
    aging_enabled: bool,
    aging_interval: u32,
    aging_amount: u32,
    aging_counter: u32,
    ticks: u64,
    stats: PrioStats,
}

impl PriorityPolicy {
    pub fn new() -> Self {
        Self {
            pool: SlotPool::new(NPROC),
            head: None,
            count: 0,
            aging_enabled: PRIO_AGING_ENABLED,
            aging_interval: PRIO_AGING_INTERVAL,
            aging_amount: PRIO_AGING_AMOUNT,
            aging_counter: 0,
            ticks: 0,
            stats: PrioStats::default(),
        }
    }

    fn find(&self, pid: Pid) -> Option<usize> {
        let mut cur = self.head;
        while let Some(idx) = cur {
            let node = self.pool.get(idx)?;
            if node.pid == pid {
                return Some(idx);
            }
            cur = node.next;
        }
        None
    }

    /// Unlink `idx` from the sorted list, leaving the node allocated.
    fn unlink(&mut self, idx: usize) -> bool {
        let mut prev = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            if c == idx {
                let next = self.pool.get(c).and_then(|n| n.next);
                match prev {
                    None => self.head = next,
                    Some(p) => {
                        if let Some(pn) = self.pool.get_mut(p) {
                            pn.next = next;
                        }
                    }
                }
                if let Some(n) = self.pool.get_mut(c) {
                    n.next = None;
                }
                self.count -= 1;
                self.stats.current_queue_length = self.count;
                return true;
            }
            prev = Some(c);
            cur = self.pool.get(c).and_then(|n| n.next);
        }
        false
    }

    /// Insert an allocated node at its sorted position. Equal priorities
    /// keep FIFO order: the new node goes after the last equal one.
    fn insert_ordered(&mut self, idx: usize) {
        let prio = match self.pool.get(idx) {
            Some(n) => n.current_priority,
            None => return,
        };

        let mut prev = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            let cp = match self.pool.get(c) {
                Some(n) => n.current_priority,
                None => break,
            };
            if cp >= prio {
                prev = Some(c);
                cur = self.pool.get(c).and_then(|n| n.next);
            } else {
                break;
            }
        }

        if let Some(n) = self.pool.get_mut(idx) {
            n.next = cur;
        }
        match prev {
            None => self.head = Some(idx),
            Some(p) => {
                if let Some(pn) = self.pool.get_mut(p) {
                    pn.next = Some(idx);
                }
            }
        }
        self.count += 1;
        self.stats.current_queue_length = self.count;
    }

    /// Periodic aging: every queued process creeps upward so long waits
    /// eventually win over high static priority.
    pub fn age_all(&mut self) {
        if !self.aging_enabled {
            return;
        }
        let amount = self.aging_amount;
        let mut cur = self.head;
        while let Some(idx) = cur {
            let next = match self.pool.get_mut(idx) {
                Some(node) => {
                    if node.current_priority < PRIORITY_MAX {
                        node.current_priority =
                            (node.current_priority + amount).min(PRIORITY_MAX);
                        self.stats.aging_boosts += 1;
                    }
                    node.next
                }
                None => None,
            };
            cur = next;
        }
    }

    /// Starvation guard: anything queued past the threshold gets a large
    /// one-shot boost and its wait clock restarts.
    pub fn check_starvation(&mut self) {
        let mut cur = self.head;
        while let Some(idx) = cur {
            let next = match self.pool.get_mut(idx) {
                Some(node) => {
                    if node.wait_time > PRIO_STARVATION_THRESHOLD {
                        node.current_priority =
                            (node.current_priority + PRIO_STARVATION_BOOST).min(PRIORITY_MAX);
                        node.wait_time = 0;
                        self.stats.starvation_boosts += 1;
                    }
                    node.next
                }
                None => None,
            };
            cur = next;
        }
    }

    pub fn set_aging_enabled(&mut self, enabled: bool) {
        self.aging_enabled = enabled;
    }

    pub fn set_aging_interval(&mut self, ticks: u32) {
        self.aging_interval = ticks;
    }

    pub fn set_aging_amount(&mut self, amount: u32) {
        self.aging_amount = amount;
    }

    /// Drop an inflated priority straight back to its base.
    pub fn reset(&mut self, pid: Pid) {
        if let Some(idx) = self.find(pid) {
            if let Some(node) = self.pool.get_mut(idx) {
                node.current_priority = node.base_priority;
            }
        }
    }

    pub fn queue_len(&self) -> u32 {
        self.count
    }

    pub fn stats(&self) -> PrioStats {
        self.stats
    }

    #[cfg(test)]
    fn node_snapshot(&self, pid: Pid) -> Option<(u32, u32, u64)> {
        self.find(pid)
            .and_then(|i| self.pool.get(i))
            .map(|n| (n.base_priority, n.current_priority, n.wait_time))
    }
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedPolicy for PriorityPolicy {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Priority
    }

    fn caps(&self) -> PolicyCaps {
        PolicyCaps::SCHEDULE
            | PolicyCaps::YIELD
            | PolicyCaps::PREEMPT
            | PolicyCaps::ENQUEUE
            | PolicyCaps::DEQUEUE
            | PolicyCaps::PICK_NEXT
            | PolicyCaps::SET_PRIORITY
            | PolicyCaps::GET_PRIORITY
            | PolicyCaps::BOOST
            | PolicyCaps::DECAY
            | PolicyCaps::TICK
    }

    fn shutdown(&mut self, _ctx: &mut dyn KernelCtx) {
        self.pool.clear();
        self.head = None;
        self.count = 0;
    }

    fn schedule(&mut self, ctx: &mut dyn KernelCtx) -> bool {
        self.stats.total_schedules += 1;

        // An outgoing Running process rejoins the queue at its rank first,
        // so a tick-driven preemption cannot drop it.
        if let Some(old_pid) = ctx.current() {
            if ctx.proc_state(old_pid) == ProcState::Running && self.find(old_pid).is_none() {
                ctx.set_proc_state(old_pid, ProcState::Ready);
                self.enqueue(ctx, old_pid);
            }
        }

        let next_idx = match self.head {
            Some(idx) => idx,
            None => return false,
        };
        let next_pid = match self.pool.get(next_idx) {
            Some(n) => n.pid,
            None => return false,
        };

        let ticks = self.ticks;
        if let Some(node) = self.pool.get_mut(next_idx) {
            self.stats.avg_wait_time = (self.stats.avg_wait_time + node.wait_time) / 2;
            node.wait_time = 0;
            node.last_run = ticks;
        }

        // The winner leaves the queue while it holds the CPU.
        self.unlink(next_idx);
        self.pool.free(next_idx);
        ctx.set_proc_state(next_pid, ProcState::Running);

        let old = ctx.current();
        if old == Some(next_pid) {
            return false;
        }
        if let Some(old_pid) = old {
            if ctx.proc_state(old_pid) == ProcState::Running {
                ctx.set_proc_state(old_pid, ProcState::Ready);
            }
        }

        self.stats.context_switches += 1;
        ctx.context_switch(old, next_pid);
        true
    }

    fn yield_cpu(&mut self, ctx: &mut dyn KernelCtx) {
        if let Some(pid) = ctx.current() {
            if ctx.proc_state(pid) == ProcState::Running {
                ctx.set_proc_state(pid, ProcState::Ready);
                self.enqueue(ctx, pid);
            }
        }
        self.schedule(ctx);
    }

    fn preempt(&mut self, ctx: &mut dyn KernelCtx) {
        self.stats.preemptions += 1;
        if let Some(pid) = ctx.current() {
            if ctx.proc_state(pid) == ProcState::Running {
                ctx.set_proc_state(pid, ProcState::Ready);
                self.enqueue(ctx, pid);
            }
        }
        self.schedule(ctx);
    }

    fn enqueue(&mut self, ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() || self.find(pid).is_some() {
            return;
        }

        let priority = ctx.proc_priority(pid);
        let idx = match self.pool.alloc(PrioNode {
            pid,
            base_priority: priority,
            current_priority: priority,
            wait_time: 0,
            last_run: self.ticks,
            next: None,
        }) {
            Some(idx) => idx,
            None => return,
        };

        self.insert_ordered(idx);
    }

    fn dequeue(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() {
            return;
        }
        if let Some(idx) = self.find(pid) {
            self.unlink(idx);
            self.pool.free(idx);
        }
    }

    fn pick_next(&mut self, _ctx: &mut dyn KernelCtx) -> Option<Pid> {
        self.head.and_then(|i| self.pool.get(i)).map(|n| n.pid)
    }

    fn tracks(&self, pid: Pid) -> bool {
        self.find(pid).is_some()
    }

    fn set_priority(&mut self, ctx: &mut dyn KernelCtx, pid: Pid, priority: u32) -> bool {
        if !pid.is_valid() {
            return false;
        }
        let priority = priority.min(PRIORITY_MAX);

        ctx.set_proc_priority(pid, priority);

        if let Some(idx) = self.find(pid) {
            // Re-insert at the new rank. Wait accounting survives the move
            // so the starvation guard cannot be dodged by priority churn.
            self.unlink(idx);
            if let Some(node) = self.pool.get_mut(idx) {
                node.base_priority = priority;
                node.current_priority = priority;
            }
            self.insert_ordered(idx);
        }

        self.stats.priority_changes += 1;

        ctx.proc_state(pid) == ProcState::Ready || ctx.current() == Some(pid)
    }

    fn get_priority(&self, ctx: &dyn KernelCtx, pid: Pid) -> Option<u32> {
        if !pid.is_valid() {
            return None;
        }
        match self.find(pid).and_then(|i| self.pool.get(i)) {
            Some(node) => Some(node.current_priority),
            None => Some(ctx.proc_priority(pid)),
        }
    }

    fn boost_priority(&mut self, ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() {
            return;
        }
        match self.find(pid) {
            Some(idx) => {
                if let Some(node) = self.pool.get_mut(idx) {
                    if node.current_priority < PRIORITY_MAX {
                        node.current_priority += 1;
                    }
                }
            }
            None => {
                let p = ctx.proc_priority(pid);
                if p < PRIORITY_MAX {
                    ctx.set_proc_priority(pid, p + 1);
                }
            }
        }
    }

    fn decay_priority(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        if let Some(idx) = self.find(pid) {
            if let Some(node) = self.pool.get_mut(idx) {
                if node.current_priority > node.base_priority {
                    node.current_priority -= 1;
                }
            }
        }
    }

    fn tick(&mut self, ctx: &mut dyn KernelCtx) -> bool {
        self.ticks += 1;

        let mut cur = self.head;
        while let Some(idx) = cur {
            let next = match self.pool.get_mut(idx) {
                Some(node) => {
                    node.wait_time += 1;
                    node.next
                }
                None => None,
            };
            cur = next;
        }

        if self.aging_enabled {
            self.aging_counter += 1;
            if self.aging_counter >= self.aging_interval {
                self.age_all();
                self.aging_counter = 0;
            }
        }

        self.check_starvation();

        // Preempt when the queue head outranks whoever is on the CPU.
        if let (Some(head), Some(curr_pid)) = (self.head, ctx.current()) {
            if let Some(node) = self.pool.get(head) {
                if ctx.proc_priority(node.pid) > ctx.proc_priority(curr_pid) {
                    return true;
                }
            }
        }
        false
    }

    fn check_preempt(&mut self, ctx: &mut dyn KernelCtx) -> bool {
        match (self.head, ctx.current()) {
            (Some(head), Some(curr_pid)) => match self.pool.get(head) {
                Some(node) => ctx.proc_priority(node.pid) > ctx.proc_priority(curr_pid),
                None => false,
            },
            (Some(_), None) => true,
            _ => false,
        }
    }

    fn stats_snapshot(&self) -> PolicyStats {
        PolicyStats::Priority(self.stats)
    }

    fn reset_stats(&mut self) {
        self.stats = PrioStats::default();
        self.stats.current_queue_length = self.count;
    }

    fn print_stats(&self) {
        log::info!("=== Priority Statistics ===");
        log::info!("queue length: {}", self.stats.current_queue_length);
        log::info!("schedules: {}", self.stats.total_schedules);
        log::info!("context switches: {}", self.stats.context_switches);
        log::info!("priority changes: {}", self.stats.priority_changes);
        log::info!("preemptions: {}", self.stats.preemptions);
        log::info!("aging boosts: {}", self.stats.aging_boosts);
        log::info!("starvation boosts: {}", self.stats.starvation_boosts);
        log::info!("avg wait: {} ticks", self.stats.avg_wait_time);
        log::info!(
            "aging: {} (interval {}, amount {})",
            if self.aging_enabled { "enabled" } else { "disabled" },
            self.aging_interval,
            self.aging_amount
        );
    }

    fn validate(&self, _ctx: &dyn KernelCtx) -> bool {
        let mut valid = true;
        let mut prev_prio: Option<u32> = None;
        let mut traversed = 0u32;

        let mut cur = self.head;
        while let Some(idx) = cur {
            let node = match self.pool.get(idx) {
                Some(n) => n,
                None => {
                    log::warn!("prio: dangling index {} in queue", idx);
                    return false;
                }
            };
            traversed += 1;

            if !node.pid.is_valid() {
                log::warn!("prio: invalid pid {}", node.pid);
                valid = false;
            }
            if let Some(pp) = prev_prio {
                if node.current_priority > pp {
                    log::warn!(
                        "prio: order violation: {} after {}",
                        node.current_priority,
                        pp
                    );
                    valid = false;
                }
            }
            prev_prio = Some(node.current_priority);
            cur = node.next;

            if traversed as usize > NPROC {
                log::warn!("prio: queue corrupted (too many nodes)");
                return false;
            }
        }

        if traversed != self.count {
            log::warn!("prio: count mismatch: {} vs {}", traversed, self.count);
            valid = false;
        }
        valid
    }

    fn dump(&self, _ctx: &dyn KernelCtx) {
        log::info!("=== Priority Queue ===");
        log::info!("count: {}", self.count);
        let mut cur = self.head;
        while let Some(idx) = cur {
            match self.pool.get(idx) {
                Some(node) => {
                    log::info!(
                        "pid {:>3}  base {:>2}  curr {:>2}  wait {:>6}  last-run {}",
                        node.pid,
                        node.base_priority,
                        node.current_priority,
                        node.wait_time,
                        node.last_run
                    );
                    cur = node.next;
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimKernel;

    fn setup(procs: &[(usize, u32)]) -> (PriorityPolicy, SimKernel) {
        let mut sim = SimKernel::new();
        let mut prio = PriorityPolicy::new();
        for &(p, pr) in procs {
            sim.spawn(Pid(p), pr);
            prio.enqueue(&mut sim, Pid(p));
        }
        (prio, sim)
    }

    #[test]
    fn head_is_highest_priority() {
        let (mut prio, mut sim) = setup(&[(1, 10), (2, 90), (3, 50)]);
        assert_eq!(prio.pick_next(&mut sim), Some(Pid(2)));
        assert!(prio.validate(&sim));
    }

    #[test]
    fn equal_priorities_keep_fifo_order() {
        let (mut prio, mut sim) = setup(&[(1, 50), (2, 50), (3, 50)]);
        assert_eq!(prio.pick_next(&mut sim), Some(Pid(1)));
        prio.schedule(&mut sim);
        assert_eq!(prio.pick_next(&mut sim), Some(Pid(2)));
    }

    #[test]
    fn schedule_dequeues_the_winner() {
        let (mut prio, mut sim) = setup(&[(1, 10), (2, 90)]);
        assert!(prio.schedule(&mut sim));
        assert_eq!(sim.current(), Some(Pid(2)));
        assert_eq!(prio.queue_len(), 1);
        assert_eq!(prio.pick_next(&mut sim), Some(Pid(1)));
    }

    #[test]
    fn set_priority_reorders_queue() {
        let (mut prio, mut sim) = setup(&[(1, 10), (2, 90)]);
        let resched = prio.set_priority(&mut sim, Pid(1), 95);
        assert!(resched);
        assert_eq!(prio.pick_next(&mut sim), Some(Pid(1)));
        assert!(prio.validate(&sim));
    }

    #[test]
    fn set_priority_twice_equals_last_write() {
        let (mut prio, mut sim) = setup(&[(1, 10), (2, 50), (3, 30)]);
        prio.set_priority(&mut sim, Pid(1), 70);
        prio.set_priority(&mut sim, Pid(1), 20);

        let (mut other, mut sim2) = setup(&[(1, 10), (2, 50), (3, 30)]);
        // Rebuild the same table state before the single write.
        other.set_priority(&mut sim2, Pid(1), 20);

        let order = |p: &mut PriorityPolicy, s: &mut SimKernel| {
            let mut pids = alloc::vec::Vec::new();
            while let Some(pid) = p.pick_next(s) {
                pids.push(pid);
                p.dequeue(s, pid);
            }
            pids
        };
        assert_eq!(order(&mut prio, &mut sim), order(&mut other, &mut sim2));
    }

    #[test]
    fn set_priority_preserves_wait_accounting() {
        let (mut prio, mut sim) = setup(&[(1, 10), (2, 90)]);
        for _ in 0..5 {
            prio.tick(&mut sim);
        }
        let before = prio.node_snapshot(Pid(1)).unwrap().2;
        assert_eq!(before, 5);
        prio.set_priority(&mut sim, Pid(1), 60);
        let after = prio.node_snapshot(Pid(1)).unwrap().2;
        assert_eq!(after, 5);
    }

    #[test]
    fn aging_raises_waiting_processes() {
        let (mut prio, mut sim) = setup(&[(1, 10)]);
        prio.set_aging_interval(10);
        prio.set_aging_amount(1);
        for _ in 0..100 {
            prio.tick(&mut sim);
        }
        let (_, current, _) = prio.node_snapshot(Pid(1)).unwrap();
        assert_eq!(current, 20);
    }

    #[test]
    fn aging_clamps_at_max() {
        let (mut prio, mut sim) = setup(&[(1, 98)]);
        prio.set_aging_interval(1);
        prio.set_aging_amount(5);
        for _ in 0..10 {
            prio.tick(&mut sim);
        }
        let (_, current, _) = prio.node_snapshot(Pid(1)).unwrap();
        assert_eq!(current, PRIORITY_MAX);
        assert!(prio.validate(&sim));
    }

    #[test]
    fn starvation_boost_fires_past_threshold() {
        let (mut prio, mut sim) = setup(&[(1, 5)]);
        prio.set_aging_enabled(false);
        for _ in 0..(PRIO_STARVATION_THRESHOLD + 2) {
            prio.tick(&mut sim);
        }
        let (_, current, wait) = prio.node_snapshot(Pid(1)).unwrap();
        assert_eq!(current, 5 + PRIO_STARVATION_BOOST);
        assert!(wait < PRIO_STARVATION_THRESHOLD);
        assert_eq!(prio.stats().starvation_boosts, 1);
    }

    #[test]
    fn decay_never_drops_below_base() {
        let (mut prio, mut sim) = setup(&[(1, 40)]);
        prio.boost_priority(&mut sim, Pid(1));
        prio.boost_priority(&mut sim, Pid(1));
        prio.decay_priority(&mut sim, Pid(1));
        prio.decay_priority(&mut sim, Pid(1));
        prio.decay_priority(&mut sim, Pid(1));
        let (base, current, _) = prio.node_snapshot(Pid(1)).unwrap();
        assert_eq!(current, base);
    }

    #[test]
    fn tick_requests_resched_on_inversion() {
        let (mut prio, mut sim) = setup(&[(1, 30), (2, 80)]);
        prio.schedule(&mut sim); // pid 2 runs
        assert!(!prio.tick(&mut sim));
        sim.spawn(Pid(3), 95);
        prio.enqueue(&mut sim, Pid(3));
        assert!(prio.tick(&mut sim));
    }
}
