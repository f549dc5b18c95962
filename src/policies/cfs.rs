/*
 * Completely-Fair Scheduling Policy
 *
 * Each task accumulates virtual runtime at a rate inversely proportional
 * to its weight; the runnable task with the smallest vruntime runs next.
 * The run queue is a timeline sorted ascending by vruntime with a cached
 * leftmost, and the running task sits in a separate curr slot off the
 * timeline. min_vruntime tracks the floor of the system and only moves
 * forward, so sleepers rejoin near the pack instead of monopolizing the
 * CPU with an ancient vruntime.
 */

use crate::config::{
    CFS_MIN_GRANULARITY, CFS_NICE_DEFAULT, CFS_NICE_LEVELS, CFS_NICE_MAX, CFS_NICE_MIN,
    CFS_SLEEPER_BONUS, CFS_TARGET_LATENCY, CFS_WEIGHT_NICE0, NPROC,
};
use crate::pool::SlotPool;
use crate::stats::{CfsStats, PolicyStats};
use crate::traits::{KernelCtx, PolicyCaps, SchedPolicy};
use crate::types::{Pid, PolicyKind, ProcState};

/// Weight for each nice level, nice -20 first. Nice 0 maps to 1024 and
/// each step changes CPU share by ~10%.
const WEIGHT_TABLE: [u64; CFS_NICE_LEVELS] = [
    88761, 71755, 56483, 46273, 36291,
    29154, 23254, 18705, 14949, 11916,
    9548, 7620, 6100, 4904, 3906,
    3121, 2501, 1991, 1586, 1277,
    1024, 820, 655, 526, 423,
    335, 272, 215, 172, 137,
    110, 87, 70, 56, 45,
    36, 29, 23, 18, 15,
];

/// Precomputed `2^32 / weight` for the inverse mapping.
const WMULT_TABLE: [u64; CFS_NICE_LEVELS] = [
    48388, 59856, 76040, 92818, 118348,
    147320, 184698, 229616, 287308, 360437,
    449829, 563644, 704093, 875809, 1099582,
    1376151, 1717300, 2157191, 2708050, 3363326,
    4194304, 5237765, 6557202, 8165337, 10153587,
    12820798, 15790321, 19976592, 24970740, 31350126,
    39045157, 49367440, 61356676, 76695844, 95443717,
    119304647, 148102320, 186737708, 238609294, 286331153,
];

struct CfsTask {
    pid: Pid,
    nice: i32,
    weight: u64,
    vruntime: u64,
    exec_start: u64,
    sum_exec: u64,
    prev_sum_exec: u64,
    sleep_start: u64,
    on_rq: bool,
    next: Option<usize>,
    prev: Option<usize>,
}

pub struct CfsPolicy {
    pool: SlotPool<CfsTask>,
    /// Head of the vruntime-sorted timeline.
    head: Option<usize>,
    /// Cached first timeline entry; always equals `head`.
    leftmost: Option<usize>,
    /// Running task, held off the timeline.
    curr: Option<usize>,
    nr_running: u32,
    load_weight: u64,
    min_vruntime: u64,
    clock: u64,
    stats: CfsStats,
}

/// Map a nice value to its weight, clamping to the table.
pub fn nice_to_weight(nice: i32) -> u64 {
    let index = (nice + 20).clamp(0, CFS_NICE_LEVELS as i32 - 1) as usize;
    WEIGHT_TABLE[index]
}

/// Inverse-weight multiplier for a nice value.
pub fn nice_to_wmult(nice: i32) -> u64 {
    let index = (nice + 20).clamp(0, CFS_NICE_LEVELS as i32 - 1) as usize;
    WMULT_TABLE[index]
}

/// Convert a real-time delta into virtual time at `weight`.
pub fn calc_delta(delta_exec: u64, weight: u64) -> u64 {
    if weight == 0 {
        return delta_exec;
    }
    delta_exec * CFS_WEIGHT_NICE0 / weight
}

impl CfsPolicy {
    pub fn new() -> Self {
        Self {
            pool: SlotPool::new(NPROC),
            head: None,
            leftmost: None,
            curr: None,
            nr_running: 0,
            load_weight: 0,
            min_vruntime: 0,
            clock: 0,
            stats: CfsStats::default(),
        }
    }

    fn find(&self, pid: Pid) -> Option<usize> {
        self.pool.iter().find(|(_, t)| t.pid == pid).map(|(i, _)| i)
    }

    /// One scheduling period: stretches with the number of runnable tasks
    /// so every task still gets at least the minimum granularity.
    pub fn sched_latency(&self) -> u64 {
        CFS_TARGET_LATENCY.max(CFS_MIN_GRANULARITY * self.nr_running as u64)
    }

    /// Ideal slice for a task of `weight`: its proportional share of one
    /// latency period, floored at the minimum granularity.
    pub fn timeslice(&self, weight: u64) -> u64 {
        if self.nr_running == 0 || self.load_weight == 0 {
            return CFS_TARGET_LATENCY;
        }
        (self.sched_latency() * weight / self.load_weight).max(CFS_MIN_GRANULARITY)
    }

    /// Insert into the timeline at the sorted position; equal vruntimes
    /// keep arrival order.
    fn insert_task(&mut self, idx: usize) {
        let vruntime = match self.pool.get(idx) {
            Some(t) => t.vruntime,
            None => return,
        };

        let mut prev = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            let cv = match self.pool.get(c) {
                Some(t) => t.vruntime,
                None => break,
            };
            if cv <= vruntime {
                prev = Some(c);
                cur = self.pool.get(c).and_then(|t| t.next);
            } else {
                break;
            }
        }

        if let Some(t) = self.pool.get_mut(idx) {
            t.on_rq = true;
            t.prev = prev;
            t.next = cur;
        }
        match prev {
            None => {
                self.head = Some(idx);
                self.leftmost = Some(idx);
            }
            Some(p) => {
                if let Some(t) = self.pool.get_mut(p) {
                    t.next = Some(idx);
                }
            }
        }
        if let Some(c) = cur {
            if let Some(t) = self.pool.get_mut(c) {
                t.prev = Some(idx);
            }
        }
    }

    fn remove_task(&mut self, idx: usize) {
        let (next, prev, on_rq) = match self.pool.get(idx) {
            Some(t) => (t.next, t.prev, t.on_rq),
            None => return,
        };
        if !on_rq {
            return;
        }

        match prev {
            None => {
                self.head = next;
                self.leftmost = next;
            }
            Some(p) => {
                if let Some(t) = self.pool.get_mut(p) {
                    t.next = next;
                }
            }
        }
        if let Some(n) = next {
            if let Some(t) = self.pool.get_mut(n) {
                t.prev = prev;
            }
        }

        if let Some(t) = self.pool.get_mut(idx) {
            t.on_rq = false;
            t.next = None;
            t.prev = None;
        }
    }

    /// Charge the running task for real time elapsed since `exec_start`.
    fn update_current(&mut self) {
        let idx = match self.curr {
            Some(i) => i,
            None => return,
        };
        let clock = self.clock;
        let delta = {
            let task = match self.pool.get_mut(idx) {
                Some(t) => t,
                None => return,
            };
            let delta = clock.saturating_sub(task.exec_start);
            if delta == 0 {
                return;
            }
            task.vruntime += calc_delta(delta, task.weight);
            task.sum_exec += delta;
            task.exec_start = clock;
            delta
        };
        self.stats.total_runtime += delta;
        self.update_min_vruntime();
    }

    /// min_vruntime chases min(curr, leftmost) but never moves backward.
    fn update_min_vruntime(&mut self) {
        let mut vruntime = self.min_vruntime;

        let curr_vr = self.curr.and_then(|i| self.pool.get(i)).map(|t| t.vruntime);
        let left_vr = self.leftmost.and_then(|i| self.pool.get(i)).map(|t| t.vruntime);

        match (curr_vr, left_vr) {
            (Some(c), Some(l)) => vruntime = c.min(l),
            (Some(c), None) => vruntime = c,
            (None, Some(l)) => vruntime = l,
            (None, None) => {}
        }

        self.min_vruntime = self.min_vruntime.max(vruntime);
    }

    /// Place a task's vruntime relative to the pack. A brand-new task
    /// starts half a period behind so it cannot starve incumbents; a
    /// waking task just lands on the floor.
    fn place_task(&mut self, idx: usize, initial: bool) {
        let mut target = self.min_vruntime;
        if initial {
            let latency = self.sched_latency();
            let weight = self.pool.get(idx).map(|t| t.weight).unwrap_or(CFS_WEIGHT_NICE0);
            target += calc_delta(latency / 2, weight);
        }
        if let Some(t) = self.pool.get_mut(idx) {
            t.vruntime = t.vruntime.max(target);
        }
    }

    /// Vruntime credit for a sleeper: half its virtual sleep time, capped
    /// at half a latency period.
    fn sleeper_credit(&self, weight: u64, sleep_time: u64) -> u64 {
        let max_credit = calc_delta(self.sched_latency() / 2, weight);
        (calc_delta(sleep_time, weight) / 2).min(max_credit)
    }

    /// Take a task off the runnable set without destroying it, so its
    /// nice value and vruntime survive the sleep.
    pub fn sleep(&mut self, pid: Pid) {
        let idx = match self.find(pid) {
            Some(i) => i,
            None => return,
        };

        let clock = self.clock;
        if self.curr == Some(idx) {
            self.update_current();
            self.curr = None;
            let weight = self.pool.get(idx).map(|t| t.weight).unwrap_or(0);
            self.nr_running -= 1;
            self.load_weight -= weight;
        } else if self.pool.get(idx).map(|t| t.on_rq).unwrap_or(false) {
            let weight = self.pool.get(idx).map(|t| t.weight).unwrap_or(0);
            self.remove_task(idx);
            self.nr_running -= 1;
            self.load_weight -= weight;
        }

        if let Some(t) = self.pool.get_mut(idx) {
            t.sleep_start = clock;
        }
        self.update_min_vruntime();
    }

    /// Change a task's nice value; the weight change takes effect at its
    /// current queue position. Returns the old nice value.
    pub fn set_nice(&mut self, pid: Pid, nice: i32) -> Option<i32> {
        let idx = self.find(pid)?;
        let nice = nice.clamp(CFS_NICE_MIN, CFS_NICE_MAX);

        let (old_nice, old_weight, on_rq) = {
            let t = self.pool.get(idx)?;
            (t.nice, t.weight, t.on_rq)
        };
        let new_weight = nice_to_weight(nice);

        if let Some(t) = self.pool.get_mut(idx) {
            t.nice = nice;
            t.weight = new_weight;
        }

        if on_rq || self.curr == Some(idx) {
            self.load_weight = self.load_weight - old_weight + new_weight;
        }
        if on_rq {
            self.remove_task(idx);
            self.insert_task(idx);
        }

        Some(old_nice)
    }

    pub fn get_nice(&self, pid: Pid) -> Option<i32> {
        self.find(pid).and_then(|i| self.pool.get(i)).map(|t| t.nice)
    }

    pub fn vruntime_of(&self, pid: Pid) -> Option<u64> {
        self.find(pid).and_then(|i| self.pool.get(i)).map(|t| t.vruntime)
    }

    pub fn sum_exec_of(&self, pid: Pid) -> Option<u64> {
        self.find(pid).and_then(|i| self.pool.get(i)).map(|t| t.sum_exec)
    }

    pub fn min_vruntime(&self) -> u64 {
        self.min_vruntime
    }

    pub fn nr_running(&self) -> u32 {
        self.nr_running
    }
}

impl Default for CfsPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedPolicy for CfsPolicy {
    fn name(&self) -> &'static str {
        "cfs"
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Cfs
    }

    fn caps(&self) -> PolicyCaps {
        PolicyCaps::SCHEDULE
            | PolicyCaps::YIELD
            | PolicyCaps::PREEMPT
            | PolicyCaps::ENQUEUE
            | PolicyCaps::DEQUEUE
            | PolicyCaps::PICK_NEXT
            | PolicyCaps::TICK
            | PolicyCaps::STATS
    }

    fn shutdown(&mut self, _ctx: &mut dyn KernelCtx) {
        self.pool.clear();
        self.head = None;
        self.leftmost = None;
        self.curr = None;
        self.nr_running = 0;
        self.load_weight = 0;
    }

    fn schedule(&mut self, ctx: &mut dyn KernelCtx) -> bool {
        self.update_current();

        // Outgoing task rejoins the timeline and competes immediately.
        if let Some(prev) = self.curr.take() {
            self.insert_task(prev);
        }

        let next_idx = match self.leftmost {
            Some(i) => i,
            None => return false,
        };
        let next_pid = match self.pool.get(next_idx) {
            Some(t) => t.pid,
            None => return false,
        };

        self.remove_task(next_idx);
        let clock = self.clock;
        if let Some(t) = self.pool.get_mut(next_idx) {
            t.exec_start = clock;
        }
        self.curr = Some(next_idx);

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

        self.stats.switches += 1;
        ctx.context_switch(old, next_pid);
        true
    }

    fn yield_cpu(&mut self, ctx: &mut dyn KernelCtx) {
        self.update_current();

        // The yielder gives up its lead: its vruntime rises to at least
        // the leftmost's, so somebody else gets a turn.
        if let (Some(curr), Some(left)) = (self.curr, self.leftmost) {
            let left_vr = self.pool.get(left).map(|t| t.vruntime);
            if let (Some(lv), Some(t)) = (left_vr, self.pool.get_mut(curr)) {
                t.vruntime = t.vruntime.max(lv);
            }
        }

        self.schedule(ctx);
    }

    fn preempt(&mut self, ctx: &mut dyn KernelCtx) {
        self.schedule(ctx);
    }

    fn enqueue(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() {
            return;
        }

        if let Some(idx) = self.find(pid) {
            // Already runnable (queued or running): nothing to do.
            if self.curr == Some(idx) || self.pool.get(idx).map(|t| t.on_rq).unwrap_or(false) {
                return;
            }

            // Waking from sleep: land on the floor, then take the sleeper
            // credit, never underflowing.
            let clock = self.clock;
            let (weight, sleep_start) = match self.pool.get(idx) {
                Some(t) => (t.weight, t.sleep_start),
                None => return,
            };
            let sleep_time = clock.saturating_sub(sleep_start);
            self.stats.sleep_time += sleep_time;

            self.place_task(idx, false);
            if CFS_SLEEPER_BONUS && sleep_time > 0 {
                let credit = self.sleeper_credit(weight, sleep_time);
                if let Some(t) = self.pool.get_mut(idx) {
                    if t.vruntime > credit {
                        t.vruntime -= credit;
                    }
                    t.sleep_start = 0;
                }
            }

            self.insert_task(idx);
            self.nr_running += 1;
            self.load_weight += weight;
            return;
        }

        // Brand-new task.
        let weight = nice_to_weight(CFS_NICE_DEFAULT);
        let idx = match self.pool.alloc(CfsTask {
            pid,
            nice: CFS_NICE_DEFAULT,
            weight,
            vruntime: self.min_vruntime,
            exec_start: self.clock,
            sum_exec: 0,
            prev_sum_exec: 0,
            sleep_start: 0,
            on_rq: false,
            next: None,
            prev: None,
        }) {
            Some(idx) => idx,
            None => return,
        };

        self.place_task(idx, true);
        self.insert_task(idx);
        self.nr_running += 1;
        self.load_weight += weight;
    }

    fn dequeue(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        let idx = match self.find(pid) {
            Some(i) => i,
            None => return,
        };

        if self.curr == Some(idx) {
            self.update_current();
            self.curr = None;
            let weight = self.pool.get(idx).map(|t| t.weight).unwrap_or(0);
            self.nr_running -= 1;
            self.load_weight -= weight;
        } else if self.pool.get(idx).map(|t| t.on_rq).unwrap_or(false) {
            let weight = self.pool.get(idx).map(|t| t.weight).unwrap_or(0);
            self.remove_task(idx);
            self.nr_running -= 1;
            self.load_weight -= weight;
        }

        self.pool.free(idx);
        self.update_min_vruntime();
    }

    fn pick_next(&mut self, _ctx: &mut dyn KernelCtx) -> Option<Pid> {
        self.leftmost.and_then(|i| self.pool.get(i)).map(|t| t.pid)
    }

    fn tracks(&self, pid: Pid) -> bool {
        self.find(pid).is_some()
    }

    fn tick(&mut self, _ctx: &mut dyn KernelCtx) -> bool {
        self.clock += 1;

        let curr = match self.curr {
            Some(i) => i,
            None => return false,
        };

        self.update_current();

        let (weight, used) = match self.pool.get(curr) {
            Some(t) => (t.weight, t.sum_exec - t.prev_sum_exec),
            None => return false,
        };

        if used >= self.timeslice(weight) && self.nr_running > 1 {
            if let Some(t) = self.pool.get_mut(curr) {
                t.prev_sum_exec = t.sum_exec;
            }
            return true;
        }
        false
    }

    fn check_preempt(&mut self, _ctx: &mut dyn KernelCtx) -> bool {
        let left = match self.leftmost {
            Some(i) => i,
            None => return false,
        };
        let curr = match self.curr {
            Some(i) => i,
            None => return true,
        };

        let left_vr = match self.pool.get(left) {
            Some(t) => t.vruntime,
            None => return false,
        };
        let (curr_vr, curr_w) = match self.pool.get(curr) {
            Some(t) => (t.vruntime, t.weight),
            None => return false,
        };

        // Only worth preempting once the gap exceeds one granularity in
        // the runner's virtual time.
        let gran = calc_delta(CFS_MIN_GRANULARITY, curr_w);
        left_vr + gran < curr_vr
    }

    fn stats_snapshot(&self) -> PolicyStats {
        PolicyStats::Cfs(self.stats)
    }

    fn reset_stats(&mut self) {
        self.stats = CfsStats::default();
    }

    fn print_stats(&self) {
        log::info!("=== CFS Statistics ===");
        log::info!("context switches: {}", self.stats.switches);
        log::info!("total runtime: {} ticks", self.stats.total_runtime);
        log::info!("total sleep time: {} ticks", self.stats.sleep_time);
        log::info!("runnable: {}", self.nr_running);
        log::info!("load weight: {}", self.load_weight);
        log::info!("min vruntime: {}", self.min_vruntime);
        log::info!("latency period: {} ticks", self.sched_latency());
    }

    fn validate(&self, _ctx: &dyn KernelCtx) -> bool {
        let mut valid = true;
        let mut counted = 0u32;
        let mut counted_weight = 0u64;
        let mut prev_vr: Option<u64> = None;

        if self.head != self.leftmost {
            log::warn!("cfs: leftmost does not match timeline head");
            valid = false;
        }

        let mut cur = self.head;
        while let Some(idx) = cur {
            let task = match self.pool.get(idx) {
                Some(t) => t,
                None => {
                    log::warn!("cfs: dangling index {} in timeline", idx);
                    return false;
                }
            };
            counted += 1;
            counted_weight += task.weight;

            if let Some(pv) = prev_vr {
                if task.vruntime < pv {
                    log::warn!("cfs: timeline unsorted at pid {}", task.pid);
                    valid = false;
                }
            }
            prev_vr = Some(task.vruntime);

            if !task.on_rq {
                log::warn!("cfs: pid {} in timeline but not on_rq", task.pid);
                valid = false;
            }

            cur = task.next;
            if counted as usize > NPROC {
                log::warn!("cfs: timeline corrupted (too many nodes)");
                return false;
            }
        }

        let mut expected = counted;
        if let Some(curr) = self.curr {
            match self.pool.get(curr) {
                Some(t) => {
                    expected += 1;
                    counted_weight += t.weight;
                    if t.on_rq {
                        log::warn!("cfs: running pid {} still marked on_rq", t.pid);
                        valid = false;
                    }
                }
                None => {
                    log::warn!("cfs: curr is a dangling index");
                    valid = false;
                }
            }
        }

        if expected != self.nr_running {
            log::warn!("cfs: nr_running mismatch (counted={}, stored={})", expected, self.nr_running);
            valid = false;
        }
        if counted_weight != self.load_weight {
            log::warn!(
                "cfs: load_weight mismatch (counted={}, stored={})",
                counted_weight,
                self.load_weight
            );
            valid = false;
        }
        valid
    }

    fn dump(&self, _ctx: &dyn KernelCtx) {
        log::info!("=== CFS Run Queue ===");
        log::info!(
            "nr_running: {}, load: {}, min_vruntime: {}, clock: {}",
            self.nr_running,
            self.load_weight,
            self.min_vruntime,
            self.clock
        );

        let mut cur = self.head;
        while let Some(idx) = cur {
            match self.pool.get(idx) {
                Some(t) => {
                    let marker = if self.leftmost == Some(idx) { '*' } else { ' ' };
                    log::info!(
                        "{}pid {:>3}  nice {:>3}  weight {:>5}  vruntime {:>8}  exec {}",
                        marker,
                        t.pid,
                        t.nice,
                        t.weight,
                        t.vruntime,
                        t.sum_exec
                    );
                    cur = t.next;
                }
                None => break,
            }
        }

        if let Some(curr) = self.curr.and_then(|i| self.pool.get(i)) {
            log::info!("current: pid {} (vruntime {})", curr.pid, curr.vruntime);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimKernel;

    fn setup(pids: &[usize]) -> (CfsPolicy, SimKernel) {
        let mut sim = SimKernel::new();
        let mut cfs = CfsPolicy::new();
        for &p in pids {
            sim.spawn(Pid(p), 50);
            cfs.enqueue(&mut sim, Pid(p));
        }
        (cfs, sim)
    }

    #[test]
    fn weight_table_anchors() {
        assert_eq!(nice_to_weight(0), 1024);
        assert_eq!(nice_to_weight(-20), 88761);
        assert_eq!(nice_to_weight(19), 15);
        assert_eq!(nice_to_weight(5), 335);
        // Clamped outside the table.
        assert_eq!(nice_to_weight(-25), 88761);
        assert_eq!(nice_to_weight(40), 15);
        assert_eq!(nice_to_wmult(0), 4194304);
    }

    #[test]
    fn calc_delta_scales_inversely_with_weight() {
        assert_eq!(calc_delta(10, 1024), 10);
        assert_eq!(calc_delta(10, 512), 20);
        assert_eq!(calc_delta(10, 2048), 5);
        assert_eq!(calc_delta(7, 0), 7);
    }

    #[test]
    fn latency_stretches_with_load() {
        let (mut cfs, mut sim) = setup(&[]);
        assert_eq!(cfs.sched_latency(), CFS_TARGET_LATENCY);
        for p in 0..10 {
            sim.spawn(Pid(p), 50);
            cfs.enqueue(&mut sim, Pid(p));
        }
        assert_eq!(cfs.sched_latency(), CFS_MIN_GRANULARITY * 10);
    }

    #[test]
    fn timeline_stays_sorted() {
        let (mut cfs, mut sim) = setup(&[1, 2, 3, 4]);
        assert!(cfs.validate(&sim));
        cfs.schedule(&mut sim);
        for _ in 0..50 {
            if cfs.tick(&mut sim) {
                cfs.schedule(&mut sim);
            }
            assert!(cfs.validate(&sim));
        }
    }

    #[test]
    fn leftmost_runs_first() {
        let (mut cfs, mut sim) = setup(&[1, 2]);
        let first = cfs.pick_next(&mut sim).unwrap();
        cfs.schedule(&mut sim);
        assert_eq!(sim.current(), Some(first));
    }

    #[test]
    fn min_vruntime_never_regresses() {
        let (mut cfs, mut sim) = setup(&[1, 2, 3]);
        cfs.schedule(&mut sim);
        let mut last = cfs.min_vruntime();
        for _ in 0..200 {
            if cfs.tick(&mut sim) {
                cfs.schedule(&mut sim);
            }
            assert!(cfs.min_vruntime() >= last);
            last = cfs.min_vruntime();
        }
    }

    #[test]
    fn new_task_starts_behind_the_pack() {
        let (mut cfs, mut sim) = setup(&[1]);
        // The placement penalty is half a latency period in virtual time.
        let vr = cfs.vruntime_of(Pid(1)).unwrap();
        assert_eq!(vr, calc_delta(CFS_TARGET_LATENCY / 2, 1024));
        let _ = &mut sim;
    }

    #[test]
    fn yield_surrenders_the_lead() {
        let (mut cfs, mut sim) = setup(&[1, 2]);
        cfs.schedule(&mut sim);
        let runner = sim.current().unwrap();
        cfs.yield_cpu(&mut sim);
        assert_ne!(sim.current(), Some(runner));
    }

    #[test]
    fn proportional_share_follows_weights() {
        let (mut cfs, mut sim) = setup(&[1, 2]);
        cfs.set_nice(Pid(2), 5);
        cfs.schedule(&mut sim);

        for _ in 0..2000 {
            if cfs.tick(&mut sim) {
                cfs.schedule(&mut sim);
            }
        }

        let a = cfs.sum_exec_of(Pid(1)).unwrap() as f64;
        let b = cfs.sum_exec_of(Pid(2)).unwrap() as f64;
        let ratio = a / b;
        let ideal = 1024.0 / 335.0;
        assert!(
            (ratio - ideal).abs() / ideal < 0.10,
            "ratio {} vs ideal {}",
            ratio,
            ideal
        );
    }

    #[test]
    fn sleeper_gets_credit_but_not_the_bank() {
        let (mut cfs, mut sim) = setup(&[1, 2]);
        cfs.schedule(&mut sim);
        // Run long enough for vruntimes to advance.
        for _ in 0..100 {
            if cfs.tick(&mut sim) {
                cfs.schedule(&mut sim);
            }
        }

        cfs.sleep(Pid(2));
        let floor = cfs.min_vruntime();
        for _ in 0..50 {
            if cfs.tick(&mut sim) {
                cfs.schedule(&mut sim);
            }
        }

        cfs.enqueue(&mut sim, Pid(2));
        let woken = cfs.vruntime_of(Pid(2)).unwrap();
        let max_credit = calc_delta(cfs.sched_latency() / 2, nice_to_weight(0));
        // Credit is bounded: the sleeper rejoins within half a period of
        // the floor it was placed on, and never underflows it by more.
        assert!(woken + max_credit >= floor, "woken {} floor {}", woken, floor);
        assert!(cfs.validate(&sim));
    }

    #[test]
    fn dequeue_of_runner_clears_curr() {
        let (mut cfs, mut sim) = setup(&[1, 2]);
        cfs.schedule(&mut sim);
        let runner = sim.current().unwrap();
        cfs.dequeue(&mut sim, runner);
        assert_eq!(cfs.sum_exec_of(runner), None);
        assert!(!cfs.tick(&mut sim) || cfs.nr_running() > 0);
        assert!(cfs.validate(&sim));
    }

    #[test]
    fn set_nice_adjusts_load() {
        let (mut cfs, mut sim) = setup(&[1, 2]);
        let old = cfs.set_nice(Pid(1), 5).unwrap();
        assert_eq!(old, 0);
        assert_eq!(cfs.get_nice(Pid(1)), Some(5));
        assert!(cfs.validate(&sim));
        let _ = &mut sim;
    }

    #[test]
    fn check_preempt_needs_a_full_granularity_gap() {
        let (mut cfs, mut sim) = setup(&[1, 2]);
        cfs.schedule(&mut sim);
        // Fresh start: the gap to the waiter is below one granularity.
        assert!(!cfs.check_preempt(&mut sim));

        // Let the runner pull far ahead of the queued task.
        for _ in 0..100 {
            cfs.tick(&mut sim);
        }
        assert!(cfs.check_preempt(&mut sim));
    }
}
