/*
 * Multi-Level Feedback Queue Policy
 *
 * Eight FIFO levels, level 0 highest. Each level doubles the quantum of
 * the one above it; a process that burns through twice its quantum at a
 * level (the allotment) drops one level. Two countervailing forces keep
 * interactive work responsive: a periodic global boost that lifts every
 * demoted process back to level 0, and an I/O bonus that promotes
 * processes which keep finishing I/O instead of spinning.
 */

use crate::config::{
    MLFQ_BOOST_INTERVAL, MLFQ_IO_BONUS_LEVELS, MLFQ_IO_PROMOTE_COUNT, MLFQ_LEVEL_QUANTA,
    MLFQ_NUM_LEVELS, MLFQ_YIELD_PROMOTE_COUNT, NPROC, PRIORITY_HIGH, PRIORITY_LOW,
    PRIORITY_NORMAL,
};
use crate::pool::SlotPool;
use crate::stats::{MlfqStats, PolicyStats};
use crate::traits::{KernelCtx, PolicyCaps, SchedPolicy};
use crate::types::{Pid, PolicyKind, ProcState};

struct MlfqNode {
    pid: Pid,
    level: usize,
    time_allotment: u32,
    time_used: u32,
    arrival_time: u64,
    io_count: u32,
    next: Option<usize>,
    prev: Option<usize>,
}

#[derive(Default, Clone, Copy)]
struct LevelQueue {
    head: Option<usize>,
    tail: Option<usize>,
    count: u32,
}

pub struct MlfqPolicy {
    pool: SlotPool<MlfqNode>,
    queues: [LevelQueue; MLFQ_NUM_LEVELS],
    quanta: [u32; MLFQ_NUM_LEVELS],
    allotments: [u32; MLFQ_NUM_LEVELS],
    boost_enabled: bool,
    boost_interval: u32,
    boost_counter: u32,
    io_bonus_enabled: bool,
    current: Option<usize>,
    current_time_used: u32,
    ticks: u64,
    stats: MlfqStats,
}

impl MlfqPolicy {
    pub fn new() -> Self {
        let quanta = MLFQ_LEVEL_QUANTA;
        let mut allotments = [0u32; MLFQ_NUM_LEVELS];
        for (a, q) in allotments.iter_mut().zip(quanta.iter()) {
            *a = q * 2;
        }
        Self {
            pool: SlotPool::new(NPROC),
            queues: [LevelQueue::default(); MLFQ_NUM_LEVELS],
            quanta,
            allotments,
            boost_enabled: true,
            boost_interval: MLFQ_BOOST_INTERVAL,
            boost_counter: 0,
            io_bonus_enabled: true,
            current: None,
            current_time_used: 0,
            ticks: 0,
            stats: MlfqStats::default(),
        }
    }

    fn find(&self, pid: Pid) -> Option<usize> {
        for queue in &self.queues {
            let mut cur = queue.head;
            while let Some(idx) = cur {
                let node = self.pool.get(idx)?;
                if node.pid == pid {
                    return Some(idx);
                }
                cur = node.next;
            }
        }
        None
    }

    fn entry_level(priority: u32) -> usize {
        if priority >= PRIORITY_HIGH {
            0
        } else if priority >= PRIORITY_NORMAL {
            2
        } else if priority >= PRIORITY_LOW {
            4
        } else {
            6
        }
    }

    fn add_to_level(&mut self, idx: usize, level: usize) {
        let level = level.min(MLFQ_NUM_LEVELS - 1);
        let tail = self.queues[level].tail;

        if let Some(node) = self.pool.get_mut(idx) {
            node.level = level;
            node.next = None;
            node.prev = tail;
        }
        match tail {
            Some(t) => {
                if let Some(node) = self.pool.get_mut(t) {
                    node.next = Some(idx);
                }
            }
            None => self.queues[level].head = Some(idx),
        }
        self.queues[level].tail = Some(idx);
        self.queues[level].count += 1;
        self.stats.per_level_count[level] += 1;
    }

    fn remove_from_queue(&mut self, idx: usize) {
        let (level, next, prev) = match self.pool.get(idx) {
            Some(n) => (n.level, n.next, n.prev),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.pool.get_mut(p) {
                    node.next = next;
                }
            }
            None => self.queues[level].head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.pool.get_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.queues[level].tail = prev,
        }

        self.queues[level].count -= 1;
        self.stats.per_level_count[level] -= 1;

        if let Some(node) = self.pool.get_mut(idx) {
            node.next = None;
            node.prev = None;
        }
    }

    fn place_fresh(&mut self, idx: usize, level: usize) {
        let level = level.min(MLFQ_NUM_LEVELS - 1);
        let allotment = self.allotments[level];
        let ticks = self.ticks;
        if let Some(node) = self.pool.get_mut(idx) {
            node.time_allotment = allotment;
            node.time_used = 0;
            node.arrival_time = ticks;
        }
        self.add_to_level(idx, level);
    }

    /// Move a queued process to an explicit level with fresh accounting.
    pub fn move_to_level(&mut self, pid: Pid, level: usize) {
        if !pid.is_valid() || level >= MLFQ_NUM_LEVELS {
            return;
        }
        if let Some(idx) = self.find(pid) {
            self.remove_from_queue(idx);
            self.place_fresh(idx, level);
        }
    }

    /// One level down. At the bottom the allotment simply refreshes.
    pub fn demote(&mut self, pid: Pid) {
        let idx = match self.find(pid) {
            Some(idx) => idx,
            None => return,
        };
        let level = match self.pool.get(idx) {
            Some(n) => n.level,
            None => return,
        };

        if level >= MLFQ_NUM_LEVELS - 1 {
            let allotment = self.allotments[level];
            if let Some(node) = self.pool.get_mut(idx) {
                node.time_used = 0;
                node.time_allotment = allotment;
            }
            return;
        }

        self.remove_from_queue(idx);
        self.place_fresh(idx, level + 1);
        self.stats.demotions += 1;
    }

    /// One level up; level 0 is the ceiling.
    pub fn promote(&mut self, pid: Pid) {
        let idx = match self.find(pid) {
            Some(idx) => idx,
            None => return,
        };
        let level = match self.pool.get(idx) {
            Some(n) => n.level,
            None => return,
        };
        if level == 0 {
            return;
        }

        self.remove_from_queue(idx);
        self.place_fresh(idx, level - 1);
        self.stats.promotions += 1;
    }

    /// Global anti-starvation boost: everything below level 0 comes back
    /// to the top with fresh accounting.
    pub fn priority_boost(&mut self) {
        for level in 1..MLFQ_NUM_LEVELS {
            while let Some(idx) = self.queues[level].head {
                self.remove_from_queue(idx);
                self.place_fresh(idx, 0);
            }
        }
        self.stats.priority_boosts += 1;
    }

    /// Record an I/O completion; enough of them earn a promotion.
    pub fn io_done(&mut self, pid: Pid) {
        if !self.io_bonus_enabled {
            return;
        }
        let idx = match self.find(pid) {
            Some(idx) => idx,
            None => return,
        };
        let (level, io_count) = match self.pool.get_mut(idx) {
            Some(node) => {
                node.io_count += 1;
                (node.level, node.io_count)
            }
            None => return,
        };

        if io_count > MLFQ_IO_PROMOTE_COUNT && level > 0 {
            let new_level = level.saturating_sub(MLFQ_IO_BONUS_LEVELS);
            if new_level != level {
                self.remove_from_queue(idx);
                self.place_fresh(idx, new_level);
                self.stats.io_bonuses += 1;
            }
            if let Some(node) = self.pool.get_mut(idx) {
                node.io_count = 0;
            }
        }
    }

    pub fn set_boost_interval(&mut self, ticks: u32) {
        self.boost_interval = ticks;
    }

    pub fn set_boost_enabled(&mut self, enabled: bool) {
        self.boost_enabled = enabled;
    }

    pub fn set_io_bonus_enabled(&mut self, enabled: bool) {
        self.io_bonus_enabled = enabled;
    }

    pub fn level_quantum(&self, level: usize) -> u32 {
        self.quanta[level.min(MLFQ_NUM_LEVELS - 1)]
    }

    pub fn set_level_quantum(&mut self, level: usize, quantum: u32) {
        if level >= MLFQ_NUM_LEVELS {
            return;
        }
        self.quanta[level] = quantum;
        self.allotments[level] = quantum * 2;
    }

    /// Which level a process currently sits at.
    pub fn level_of(&self, pid: Pid) -> Option<usize> {
        self.find(pid).and_then(|i| self.pool.get(i)).map(|n| n.level)
    }

    pub fn stats(&self) -> MlfqStats {
        self.stats
    }

    #[cfg(test)]
    fn node_usage(&self, pid: Pid) -> Option<(u32, u32)> {
        self.find(pid)
            .and_then(|i| self.pool.get(i))
            .map(|n| (n.time_used, n.time_allotment))
    }
}

impl Default for MlfqPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedPolicy for MlfqPolicy {
    fn name(&self) -> &'static str {
        "mlfq"
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Mlfq
    }

    fn caps(&self) -> PolicyCaps {
        PolicyCaps::SCHEDULE
            | PolicyCaps::YIELD
            | PolicyCaps::PREEMPT
            | PolicyCaps::ENQUEUE
            | PolicyCaps::DEQUEUE
            | PolicyCaps::PICK_NEXT
            | PolicyCaps::BOOST
            | PolicyCaps::DECAY
            | PolicyCaps::TICK
    }

    fn shutdown(&mut self, _ctx: &mut dyn KernelCtx) {
        self.pool.clear();
        self.queues = [LevelQueue::default(); MLFQ_NUM_LEVELS];
        self.current = None;
        self.current_time_used = 0;
    }

    fn schedule(&mut self, ctx: &mut dyn KernelCtx) -> bool {
        self.stats.total_schedules += 1;

        let next_idx = match self.queues.iter().find_map(|q| q.head) {
            Some(idx) => idx,
            None => return false,
        };
        let (next_pid, level) = match self.pool.get(next_idx) {
            Some(n) => (n.pid, n.level),
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

        // The winner keeps its queue slot at the head of its level until
        // something displaces it.
        self.current = Some(next_idx);
        self.current_time_used = 0;

        self.stats.context_switches += 1;
        self.stats.per_level_time[level] += 1;
        ctx.context_switch(old, next_pid);
        true
    }

    fn yield_cpu(&mut self, ctx: &mut dyn KernelCtx) {
        // A voluntary yield reads as I/O-like behavior: the level usage
        // clock restarts, and habitual yielders earn a promotion.
        if let Some(idx) = self.current {
            let (pid, yields) = match self.pool.get_mut(idx) {
                Some(node) => {
                    node.io_count += 1;
                    node.time_used = 0;
                    (node.pid, node.io_count)
                }
                None => {
                    self.current = None;
                    return;
                }
            };
            if self.io_bonus_enabled && yields > MLFQ_YIELD_PROMOTE_COUNT {
                self.promote(pid);
                if let Some(node) = self.pool.get_mut(idx) {
                    node.io_count = 0;
                }
                self.stats.io_bonuses += 1;
            }
        }

        if let Some(pid) = ctx.current() {
            if ctx.proc_state(pid) == ProcState::Running {
                ctx.set_proc_state(pid, ProcState::Ready);
            }
        }

        self.current = None;
        self.schedule(ctx);
    }

    fn preempt(&mut self, ctx: &mut dyn KernelCtx) {
        if let Some(idx) = self.current {
            let (pid, exhausted) = match self.pool.get(idx) {
                Some(n) => (n.pid, n.time_used >= n.time_allotment),
                None => {
                    self.current = None;
                    return;
                }
            };
            if exhausted {
                self.demote(pid);
            } else {
                // Allotment left: rotate to the back of the same level.
                let level = self.pool.get(idx).map(|n| n.level).unwrap_or(0);
                self.remove_from_queue(idx);
                self.add_to_level(idx, level);
            }
        }

        if let Some(pid) = ctx.current() {
            if ctx.proc_state(pid) == ProcState::Running {
                ctx.set_proc_state(pid, ProcState::Ready);
            }
        }

        self.current = None;
        self.schedule(ctx);
    }

    fn enqueue(&mut self, ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() || self.find(pid).is_some() {
            return;
        }

        let level = Self::entry_level(ctx.proc_priority(pid));
        let idx = match self.pool.alloc(MlfqNode {
            pid,
            level,
            time_allotment: 0,
            time_used: 0,
            arrival_time: 0,
            io_count: 0,
            next: None,
            prev: None,
        }) {
            Some(idx) => idx,
            None => return,
        };

        self.place_fresh(idx, level);
    }

    fn dequeue(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() {
            return;
        }
        if let Some(idx) = self.find(pid) {
            if self.current == Some(idx) {
                self.current = None;
            }
            self.remove_from_queue(idx);
            self.pool.free(idx);
        }
    }

    fn pick_next(&mut self, _ctx: &mut dyn KernelCtx) -> Option<Pid> {
        let idx = self.queues.iter().find_map(|q| q.head)?;
        self.pool.get(idx).map(|n| n.pid)
    }

    fn tracks(&self, pid: Pid) -> bool {
        self.find(pid).is_some()
    }

    fn boost_priority(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        self.promote(pid);
    }

    fn decay_priority(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        self.demote(pid);
    }

    fn tick(&mut self, _ctx: &mut dyn KernelCtx) -> bool {
        self.ticks += 1;
        let mut need_resched = false;

        if let Some(idx) = self.current {
            self.current_time_used += 1;

            let (pid, level, used, allotment) = match self.pool.get_mut(idx) {
                Some(node) => {
                    node.time_used += 1;
                    (node.pid, node.level, node.time_used, node.time_allotment)
                }
                None => {
                    self.current = None;
                    return false;
                }
            };

            self.stats.per_level_time[level] += 1;

            if used >= allotment {
                self.demote(pid);
                need_resched = true;
            } else if self.current_time_used >= self.quanta[level] {
                need_resched = true;
            }
        }

        if self.boost_enabled {
            self.boost_counter += 1;
            if self.boost_counter >= self.boost_interval {
                self.priority_boost();
                self.boost_counter = 0;
            }
        }

        need_resched
    }

    fn stats_snapshot(&self) -> PolicyStats {
        PolicyStats::Mlfq(self.stats)
    }

    fn reset_stats(&mut self) {
        let counts: [u32; MLFQ_NUM_LEVELS] = core::array::from_fn(|i| self.queues[i].count);
        self.stats = MlfqStats::default();
        self.stats.per_level_count = counts;
    }

    fn print_stats(&self) {
        log::info!("=== MLFQ Statistics ===");
        log::info!("schedules: {}", self.stats.total_schedules);
        log::info!("context switches: {}", self.stats.context_switches);
        log::info!("promotions: {}", self.stats.promotions);
        log::info!("demotions: {}", self.stats.demotions);
        log::info!("priority boosts: {}", self.stats.priority_boosts);
        log::info!("io bonuses: {}", self.stats.io_bonuses);
        log::info!("boost interval: {} ticks", self.boost_interval);
        for level in 0..MLFQ_NUM_LEVELS {
            log::info!(
                "level {}: quantum {:>3}  count {:>2}  cpu-time {}",
                level,
                self.quanta[level],
                self.stats.per_level_count[level],
                self.stats.per_level_time[level]
            );
        }
    }

    fn validate(&self, _ctx: &dyn KernelCtx) -> bool {
        let mut valid = true;

        for (level, queue) in self.queues.iter().enumerate() {
            let mut traversed = 0u32;
            let mut cur = queue.head;
            while let Some(idx) = cur {
                let node = match self.pool.get(idx) {
                    Some(n) => n,
                    None => {
                        log::warn!("mlfq: dangling index {} at level {}", idx, level);
                        return false;
                    }
                };
                traversed += 1;

                if !node.pid.is_valid() {
                    log::warn!("mlfq: invalid pid {} at level {}", node.pid, level);
                    valid = false;
                }
                if node.level != level {
                    log::warn!(
                        "mlfq: level mismatch: node says {}, queue is {}",
                        node.level,
                        level
                    );
                    valid = false;
                }
                if let Some(next) = node.next {
                    match self.pool.get(next) {
                        Some(nn) if nn.prev == Some(idx) => {}
                        _ => {
                            log::warn!("mlfq: link mismatch at pid {}", node.pid);
                            valid = false;
                        }
                    }
                }

                cur = node.next;
                if traversed as usize > NPROC {
                    log::warn!("mlfq: level {} corrupted", level);
                    return false;
                }
            }

            if traversed != queue.count {
                log::warn!(
                    "mlfq: count mismatch at level {}: {} vs {}",
                    level,
                    traversed,
                    queue.count
                );
                valid = false;
            }
        }
        valid
    }

    fn dump(&self, _ctx: &dyn KernelCtx) {
        log::info!("=== MLFQ Queues ===");
        for (level, queue) in self.queues.iter().enumerate() {
            log::info!(
                "level {} (quantum {}, allotment {}, count {}):",
                level,
                self.quanta[level],
                self.allotments[level],
                queue.count
            );
            let mut cur = queue.head;
            while let Some(idx) = cur {
                match self.pool.get(idx) {
                    Some(node) => {
                        let marker = if self.current == Some(idx) { '*' } else { ' ' };
                        log::info!(
                            "  {}pid {:>3}  used {:>3}/{:<3}  io {}  arrived @{}",
                            marker,
                            node.pid,
                            node.time_used,
                            node.time_allotment,
                            node.io_count,
                            node.arrival_time
                        );
                        cur = node.next;
                    }
                    None => break,
                }
            }
        }
    }
}
