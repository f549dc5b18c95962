/*
 * Real-Time Scheduling Policy
 *
 * Periodic task model: every task declares {period, deadline, wcet, phase}
 * and is re-released each period with a fresh absolute deadline and budget.
 * Four selection keys share one ready list: EDF (earliest absolute
 * deadline), RMS (static priority by period), DMS (static priority by
 * relative deadline), and LLF (least laxity, recomputed every tick with a
 * full re-sort). A deadline overrun is routed to the task's own miss
 * policy rather than treated as a scheduler error.
 */

use heapless::Vec as BoundedVec;

use crate::config::{
    RT_DEFAULT_DEADLINE, RT_DEFAULT_PERIOD, RT_DEFAULT_WCET, RT_MAX_TASKS,
};
use crate::pool::SlotPool;
use crate::stats::{PolicyStats, RtStats};
use crate::traits::{KernelCtx, PolicyCaps, SchedPolicy};
use crate::types::{Pid, PolicyKind, ProcState, RtAlgorithm, RtMissPolicy, RtTaskState, SchedError};

/// Static description of a periodic task.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RtTaskParams {
    pub period: u32,
    pub deadline: u32,
    pub wcet: u32,
    pub phase: u32,
    pub miss_policy: RtMissPolicy,
}

impl Default for RtTaskParams {
    fn default() -> Self {
        Self {
            period: RT_DEFAULT_PERIOD,
            deadline: RT_DEFAULT_DEADLINE,
            wcet: RT_DEFAULT_WCET,
            phase: 0,
            miss_policy: RtMissPolicy::Notify,
        }
    }
}

struct RtTask {
    pid: Pid,
    params: RtTaskParams,
    state: RtTaskState,
    release_time: u64,
    absolute_deadline: u64,
    remaining_time: u64,
    start_time: u64,
    instances: u64,
    completions: u64,
    deadline_misses: u64,
    total_response_time: u64,
    worst_response_time: u64,
    total_exec_time: u64,
    rms_priority: u32,
    laxity: i64,
    /// One miss report per instance; reset at release.
    miss_latched: bool,
    next_all: Option<usize>,
    next_ready: Option<usize>,
}

pub struct RealtimePolicy {
    pool: SlotPool<RtTask>,
    all_head: Option<usize>,
    ready_head: Option<usize>,
    current: Option<usize>,
    task_count: u32,
    algo: RtAlgorithm,
    system_time: u64,
    total_releases: u64,
    total_completions: u64,
    total_deadline_misses: u64,
    preemptions: u64,
    context_switches: u64,
}

fn ceil_div(a: u64, b: u64) -> u64 {
    if b == 0 {
        return 0;
    }
    (a + b - 1) / b
}

impl RealtimePolicy {
    pub fn new() -> Self {
        Self {
            pool: SlotPool::new(RT_MAX_TASKS),
            all_head: None,
            ready_head: None,
            current: None,
            task_count: 0,
            algo: RtAlgorithm::Edf,
            system_time: 0,
            total_releases: 0,
            total_completions: 0,
            total_deadline_misses: 0,
            preemptions: 0,
            context_switches: 0,
        }
    }

    fn find(&self, pid: Pid) -> Option<usize> {
        let mut cur = self.all_head;
        while let Some(idx) = cur {
            let task = self.pool.get(idx)?;
            if task.pid == pid {
                return Some(idx);
            }
            cur = task.next_all;
        }
        None
    }

    /// True when `a` outranks `b` under the active selection key.
    fn outranks(&self, a: usize, b: usize) -> bool {
        let (ta, tb) = match (self.pool.get(a), self.pool.get(b)) {
            (Some(ta), Some(tb)) => (ta, tb),
            _ => return false,
        };
        match self.algo {
            RtAlgorithm::Edf => ta.absolute_deadline < tb.absolute_deadline,
            RtAlgorithm::Rms | RtAlgorithm::Dms => ta.rms_priority > tb.rms_priority,
            RtAlgorithm::Llf => ta.laxity < tb.laxity,
        }
    }

    fn insert_ready(&mut self, idx: usize) {
        if let Some(t) = self.pool.get_mut(idx) {
            t.state = RtTaskState::Ready;
        }

        let mut prev = None;
        let mut cur = self.ready_head;
        while let Some(c) = cur {
            if self.outranks(idx, c) {
                break;
            }
            prev = Some(c);
            cur = self.pool.get(c).and_then(|t| t.next_ready);
        }

        if let Some(t) = self.pool.get_mut(idx) {
            t.next_ready = cur;
        }
        match prev {
            None => self.ready_head = Some(idx),
            Some(p) => {
                if let Some(t) = self.pool.get_mut(p) {
                    t.next_ready = Some(idx);
                }
            }
        }
    }

    fn remove_ready(&mut self, idx: usize) {
        let mut prev: Option<usize> = None;
        let mut cur = self.ready_head;
        while let Some(c) = cur {
            if c == idx {
                let next = self.pool.get(c).and_then(|t| t.next_ready);
                match prev {
                    None => self.ready_head = next,
                    Some(p) => {
                        if let Some(t) = self.pool.get_mut(p) {
                            t.next_ready = next;
                        }
                    }
                }
                if let Some(t) = self.pool.get_mut(c) {
                    t.next_ready = None;
                }
                return;
            }
            prev = Some(c);
            cur = self.pool.get(c).and_then(|t| t.next_ready);
        }
    }

    /// Register a periodic task. The first release happens at the task's
    /// phase (immediately for phase 0) once it is enqueued or the release
    /// sweep reaches it.
    pub fn create_task(&mut self, pid: Pid, params: RtTaskParams) -> Result<(), SchedError> {
        if !pid.is_valid() {
            return Err(SchedError::InvalidPid);
        }
        if self.find(pid).is_some() {
            return Err(SchedError::TaskExists);
        }

        let all_head = self.all_head;
        let idx = self
            .pool
            .alloc(RtTask {
                pid,
                params,
                state: RtTaskState::Inactive,
                release_time: 0,
                absolute_deadline: 0,
                remaining_time: params.wcet as u64,
                start_time: 0,
                instances: 0,
                completions: 0,
                deadline_misses: 0,
                total_response_time: 0,
                worst_response_time: 0,
                total_exec_time: 0,
                rms_priority: 1,
                laxity: 0,
                miss_latched: false,
                next_all: all_head,
                next_ready: None,
            })
            .ok_or(SchedError::PoolExhausted)?;

        self.all_head = Some(idx);
        self.task_count += 1;

        match self.algo {
            RtAlgorithm::Rms => self.assign_priorities_by_period(),
            RtAlgorithm::Dms => self.assign_priorities_by_deadline(),
            _ => {}
        }
        Ok(())
    }

    pub fn set_params(&mut self, pid: Pid, params: RtTaskParams) -> Result<(), SchedError> {
        let idx = self.find(pid).ok_or(SchedError::NoSuchTask)?;
        if let Some(t) = self.pool.get_mut(idx) {
            t.params = params;
        }
        match self.algo {
            RtAlgorithm::Rms => self.assign_priorities_by_period(),
            RtAlgorithm::Dms => self.assign_priorities_by_deadline(),
            _ => {}
        }
        Ok(())
    }

    pub fn get_params(&self, pid: Pid) -> Option<RtTaskParams> {
        self.find(pid).and_then(|i| self.pool.get(i)).map(|t| t.params)
    }

    /// Release a new instance: fresh deadline, fresh budget, ready to run.
    fn release(&mut self, idx: usize) {
        let now = self.system_time;
        if let Some(t) = self.pool.get_mut(idx) {
            t.release_time = now;
            t.absolute_deadline = now + t.params.deadline as u64;
            t.remaining_time = t.params.wcet as u64;
            t.instances += 1;
            t.miss_latched = false;
            t.laxity = t.params.deadline as i64 - t.params.wcet as i64;
        }
        self.insert_ready(idx);
        self.total_releases += 1;
    }

    fn complete(&mut self, idx: usize) {
        let now = self.system_time;
        if let Some(t) = self.pool.get_mut(idx) {
            let response = now.saturating_sub(t.release_time);
            t.total_response_time += response;
            if response > t.worst_response_time {
                t.worst_response_time = response;
            }
            t.total_exec_time += t.params.wcet as u64 - t.remaining_time;
            t.state = RtTaskState::Completed;
            t.completions += 1;
        }
        self.total_completions += 1;

        if self.current == Some(idx) {
            self.current = None;
        }
        self.remove_ready(idx);
    }

    fn handle_miss(&mut self, idx: usize) {
        let (pid, policy) = match self.pool.get_mut(idx) {
            Some(t) => {
                t.deadline_misses += 1;
                t.miss_latched = true;
                (t.pid, t.params.miss_policy)
            }
            None => return,
        };
        self.total_deadline_misses += 1;

        match policy {
            RtMissPolicy::Skip => {
                if let Some(t) = self.pool.get_mut(idx) {
                    t.state = RtTaskState::Missed;
                }
                self.remove_ready(idx);
                if self.current == Some(idx) {
                    self.current = None;
                }
            }
            RtMissPolicy::Abort => {
                if let Some(t) = self.pool.get_mut(idx) {
                    t.state = RtTaskState::Missed;
                }
                self.remove_ready(idx);
                if self.current == Some(idx) {
                    self.current = None;
                }
            }
            RtMissPolicy::Continue => {}
            RtMissPolicy::Notify => {
                log::warn!(
                    "rt: deadline miss for pid {} at time {}",
                    pid,
                    self.system_time
                );
            }
        }
    }

    fn check_deadlines(&mut self) {
        let now = self.system_time;
        let mut cur = self.all_head;
        while let Some(idx) = cur {
            let (state, deadline, latched, next) = match self.pool.get(idx) {
                Some(t) => (t.state, t.absolute_deadline, t.miss_latched, t.next_all),
                None => break,
            };
            if matches!(state, RtTaskState::Ready | RtTaskState::Running)
                && !latched
                && now > deadline
            {
                self.handle_miss(idx);
            }
            cur = next;
        }
    }

    fn check_releases(&mut self) {
        let now = self.system_time;
        let mut cur = self.all_head;
        while let Some(idx) = cur {
            let (state, due, next) = match self.pool.get(idx) {
                Some(t) => {
                    let due = if t.instances == 0 {
                        t.params.phase as u64
                    } else {
                        t.release_time + t.params.period as u64
                    };
                    (t.state, due, t.next_all)
                }
                None => break,
            };
            if matches!(
                state,
                RtTaskState::Completed | RtTaskState::Missed | RtTaskState::Inactive
            ) && now >= due
            {
                self.release(idx);
            }
            cur = next;
        }
    }

    /// Recompute every live instance's laxity from the current time.
    fn update_laxities(&mut self) {
        let now = self.system_time as i64;
        let mut cur = self.all_head;
        while let Some(idx) = cur {
            let next = match self.pool.get_mut(idx) {
                Some(t) => {
                    if matches!(t.state, RtTaskState::Ready | RtTaskState::Running) {
                        t.laxity = t.absolute_deadline as i64 - now - t.remaining_time as i64;
                    }
                    t.next_all
                }
                None => None,
            };
            cur = next;
        }
    }

    /// Drain and re-insert the whole ready list under the active key.
    fn rebuild_ready(&mut self) {
        let mut drained: BoundedVec<usize, RT_MAX_TASKS> = BoundedVec::new();
        while let Some(idx) = self.ready_head {
            self.ready_head = self.pool.get(idx).and_then(|t| t.next_ready);
            if let Some(t) = self.pool.get_mut(idx) {
                t.next_ready = None;
            }
            let _ = drained.push(idx);
        }
        for idx in drained {
            self.insert_ready(idx);
        }
    }

    fn assign_priorities_by_period(&mut self) {
        self.assign_priorities(|t| t.params.period);
    }

    fn assign_priorities_by_deadline(&mut self) {
        self.assign_priorities(|t| t.params.deadline);
    }

    /// Sort tasks ascending by `key` and number priorities N..1, so the
    /// smallest key gets the highest priority.
    fn assign_priorities<F: Fn(&RtTask) -> u32>(&mut self, key: F) {
        let mut order: BoundedVec<usize, RT_MAX_TASKS> = BoundedVec::new();
        let mut cur = self.all_head;
        while let Some(idx) = cur {
            let next = self.pool.get(idx).and_then(|t| t.next_all);
            let _ = order.push(idx);
            cur = next;
        }

        order.sort_unstable_by_key(|&i| self.pool.get(i).map(&key).unwrap_or(u32::MAX));

        let count = order.len() as u32;
        for (i, idx) in order.iter().enumerate() {
            if let Some(t) = self.pool.get_mut(*idx) {
                t.rms_priority = count - i as u32;
            }
        }
    }

    /// Swap the selection algorithm; priorities or laxities are recomputed
    /// and the ready list rebuilt under the new key.
    pub fn set_algorithm(&mut self, algo: RtAlgorithm) {
        if algo == self.algo {
            return;
        }
        self.algo = algo;

        match algo {
            RtAlgorithm::Rms => self.assign_priorities_by_period(),
            RtAlgorithm::Dms => self.assign_priorities_by_deadline(),
            RtAlgorithm::Llf => self.update_laxities(),
            RtAlgorithm::Edf => {}
        }
        self.rebuild_ready();
    }

    pub fn algorithm(&self) -> RtAlgorithm {
        self.algo
    }

    fn pick(&mut self) -> Option<usize> {
        match self.algo {
            RtAlgorithm::Llf => {
                self.update_laxities();
                let mut best: Option<(usize, i64)> = None;
                let mut cur = self.ready_head;
                while let Some(idx) = cur {
                    let t = self.pool.get(idx)?;
                    if t.state == RtTaskState::Ready {
                        match best {
                            Some((_, l)) if t.laxity >= l => {}
                            _ => best = Some((idx, t.laxity)),
                        }
                    }
                    cur = t.next_ready;
                }
                best.map(|(i, _)| i)
            }
            _ => self.ready_head,
        }
    }

    /// Total utilization `sum(wcet / period)`.
    pub fn utilization(&self) -> f64 {
        let mut util = 0.0;
        let mut cur = self.all_head;
        while let Some(idx) = cur {
            match self.pool.get(idx) {
                Some(t) => {
                    if t.params.period > 0 {
                        util += t.params.wcet as f64 / t.params.period as f64;
                    }
                    cur = t.next_all;
                }
                None => break,
            }
        }
        util
    }

    /// Liu-Layland bound `n * (2^(1/n) - 1)`.
    pub fn rms_utilization_bound(n: u32) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        n * (libm::pow(2.0, 1.0 / n) - 1.0)
    }

    /// Advisory schedulability test for the active algorithm. EDF uses the
    /// exact utilization bound; RMS uses Liu-Layland; DMS and LLF fall
    /// back to the EDF test.
    pub fn is_schedulable(&self) -> bool {
        match self.algo {
            RtAlgorithm::Rms => self.utilization() <= Self::rms_utilization_bound(self.task_count),
            _ => self.utilization() <= 1.0,
        }
    }

    /// Fixed-point response-time analysis
    /// `R = wcet + sum(ceil(R / T_j) * wcet_j)` over higher-priority
    /// tasks. Converges or stops once `R` exceeds the deadline.
    pub fn response_time(&self, pid: Pid) -> Option<u64> {
        let idx = self.find(pid)?;
        let (wcet, deadline, my_prio) = {
            let t = self.pool.get(idx)?;
            (t.params.wcet as u64, t.params.deadline as u64, t.rms_priority)
        };

        let mut r = wcet;
        for _ in 0..1000 {
            let mut interference = 0u64;
            let mut cur = self.all_head;
            while let Some(j) = cur {
                let t = self.pool.get(j)?;
                if j != idx && t.rms_priority > my_prio && t.params.period > 0 {
                    interference += ceil_div(r, t.params.period as u64) * t.params.wcet as u64;
                }
                cur = t.next_all;
            }
            let r_next = wcet + interference;
            if r_next == r {
                break;
            }
            r = r_next;
            if r > deadline {
                break;
            }
        }
        Some(r)
    }

    /// Whether the response-time analysis stays within the deadline.
    pub fn rta_feasible(&self, pid: Pid) -> Option<bool> {
        let idx = self.find(pid)?;
        let deadline = self.pool.get(idx)?.params.deadline as u64;
        self.response_time(pid).map(|r| r <= deadline)
    }

    pub fn deadline_misses(&self, pid: Pid) -> Option<u64> {
        self.find(pid)
            .and_then(|i| self.pool.get(i))
            .map(|t| t.deadline_misses)
    }

    pub fn completions(&self, pid: Pid) -> Option<u64> {
        self.find(pid)
            .and_then(|i| self.pool.get(i))
            .map(|t| t.completions)
    }

    pub fn total_deadline_misses(&self) -> u64 {
        self.total_deadline_misses
    }

    pub fn system_time(&self) -> u64 {
        self.system_time
    }

    pub fn task_count(&self) -> u32 {
        self.task_count
    }

    #[cfg(test)]
    fn rms_priority_of(&self, pid: Pid) -> Option<u32> {
        self.find(pid).and_then(|i| self.pool.get(i)).map(|t| t.rms_priority)
    }

    #[cfg(test)]
    fn state_of(&self, pid: Pid) -> Option<RtTaskState> {
        self.find(pid).and_then(|i| self.pool.get(i)).map(|t| t.state)
    }
}

impl Default for RealtimePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedPolicy for RealtimePolicy {
    fn name(&self) -> &'static str {
        "realtime"
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Realtime
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
        self.all_head = None;
        self.ready_head = None;
        self.current = None;
        self.task_count = 0;
    }

    fn schedule(&mut self, ctx: &mut dyn KernelCtx) -> bool {
        let next_idx = match self.pick() {
            Some(idx) => idx,
            None => return false,
        };
        if self.current == Some(next_idx) {
            return false;
        }

        // A running instance that still outranks the ready head keeps the
        // CPU; switching would violate the selection key.
        if let Some(curr) = self.current {
            let running = self
                .pool
                .get(curr)
                .map(|t| t.state == RtTaskState::Running)
                .unwrap_or(false);
            if running && !self.outranks(next_idx, curr) {
                return false;
            }
        }

        self.remove_ready(next_idx);

        // Preempted instance goes back into the ready list; its budget
        // was already charged tick by tick.
        if let Some(prev) = self.current {
            let was_running = self
                .pool
                .get(prev)
                .map(|t| t.state == RtTaskState::Running)
                .unwrap_or(false);
            if was_running {
                self.insert_ready(prev);
                self.preemptions += 1;
            }
        }

        let now = self.system_time;
        let next_pid = match self.pool.get_mut(next_idx) {
            Some(t) => {
                t.state = RtTaskState::Running;
                t.start_time = now;
                t.pid
            }
            None => return false,
        };
        self.current = Some(next_idx);

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

        self.context_switches += 1;
        ctx.context_switch(old, next_pid);
        true
    }

    fn yield_cpu(&mut self, ctx: &mut dyn KernelCtx) {
        if let Some(curr) = self.current.take() {
            self.insert_ready(curr);
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

        if self.find(pid).is_none() {
            // Unknown pid: admit it with default periodic parameters.
            if self.create_task(pid, RtTaskParams::default()).is_err() {
                return;
            }
        }

        let idx = match self.find(pid) {
            Some(idx) => idx,
            None => return,
        };
        let (state, phase, instances) = match self.pool.get(idx) {
            Some(t) => (t.state, t.params.phase as u64, t.instances),
            None => return,
        };

        if matches!(state, RtTaskState::Ready | RtTaskState::Running) {
            return;
        }
        if instances == 0 && phase > self.system_time {
            // First release waits for the task's phase offset.
            return;
        }
        self.release(idx);
    }

    fn dequeue(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        let idx = match self.find(pid) {
            Some(idx) => idx,
            None => return,
        };

        self.remove_ready(idx);

        // Unlink from the registry.
        let mut prev: Option<usize> = None;
        let mut cur = self.all_head;
        while let Some(c) = cur {
            if c == idx {
                let next = self.pool.get(c).and_then(|t| t.next_all);
                match prev {
                    None => self.all_head = next,
                    Some(p) => {
                        if let Some(t) = self.pool.get_mut(p) {
                            t.next_all = next;
                        }
                    }
                }
                break;
            }
            prev = Some(c);
            cur = self.pool.get(c).and_then(|t| t.next_all);
        }

        if self.current == Some(idx) {
            self.current = None;
        }
        self.task_count -= 1;
        self.pool.free(idx);
    }

    fn pick_next(&mut self, _ctx: &mut dyn KernelCtx) -> Option<Pid> {
        let idx = self.pick()?;
        self.pool.get(idx).map(|t| t.pid)
    }

    fn tracks(&self, pid: Pid) -> bool {
        self.find(pid).is_some()
    }

    fn tick(&mut self, _ctx: &mut dyn KernelCtx) -> bool {
        self.system_time += 1;
        let mut need_resched = false;

        // Charge the running instance; completion frees the CPU.
        if let Some(curr) = self.current {
            let finished = match self.pool.get_mut(curr) {
                Some(t) if t.state == RtTaskState::Running => {
                    if t.remaining_time > 0 {
                        t.remaining_time -= 1;
                    }
                    t.remaining_time == 0
                }
                _ => false,
            };
            if finished {
                self.complete(curr);
                need_resched = true;
            }
        }

        self.check_deadlines();
        self.check_releases();

        if self.algo == RtAlgorithm::Llf {
            self.update_laxities();
            self.rebuild_ready();
        }

        if self.check_preempt_inner() {
            need_resched = true;
        }
        need_resched
    }

    fn check_preempt(&mut self, _ctx: &mut dyn KernelCtx) -> bool {
        self.check_preempt_inner()
    }

    fn stats_snapshot(&self) -> PolicyStats {
        let bound = match self.algo {
            RtAlgorithm::Rms => Self::rms_utilization_bound(self.task_count),
            _ => 1.0,
        };
        PolicyStats::Realtime(RtStats {
            total_releases: self.total_releases,
            total_completions: self.total_completions,
            total_deadline_misses: self.total_deadline_misses,
            preemptions: self.preemptions,
            context_switches: self.context_switches,
            utilization: self.utilization(),
            schedulability_bound: bound,
            schedulable: self.is_schedulable(),
        })
    }

    fn reset_stats(&mut self) {
        self.total_releases = 0;
        self.total_completions = 0;
        self.total_deadline_misses = 0;
        self.preemptions = 0;
        self.context_switches = 0;

        let mut cur = self.all_head;
        while let Some(idx) = cur {
            let next = match self.pool.get_mut(idx) {
                Some(t) => {
                    t.instances = 0;
                    t.completions = 0;
                    t.deadline_misses = 0;
                    t.total_response_time = 0;
                    t.worst_response_time = 0;
                    t.total_exec_time = 0;
                    t.next_all
                }
                None => None,
            };
            cur = next;
        }
    }

    fn print_stats(&self) {
        log::info!("=== Real-Time Statistics ===");
        log::info!("algorithm: {}", self.algo.name());
        log::info!("system time: {} ticks", self.system_time);
        log::info!("tasks: {}", self.task_count);
        log::info!("utilization: {:.2}%", self.utilization() * 100.0);
        if self.algo == RtAlgorithm::Rms {
            log::info!(
                "rms bound: {:.2}% (n={})",
                Self::rms_utilization_bound(self.task_count) * 100.0,
                self.task_count
            );
        }
        log::info!("schedulable: {}", if self.is_schedulable() { "yes" } else { "no" });
        log::info!("releases: {}", self.total_releases);
        log::info!("completions: {}", self.total_completions);
        log::info!("deadline misses: {}", self.total_deadline_misses);
        log::info!("preemptions: {}", self.preemptions);
        log::info!("context switches: {}", self.context_switches);
    }

    fn validate(&self, _ctx: &dyn KernelCtx) -> bool {
        let mut valid = true;
        let mut prev: Option<usize> = None;
        let mut traversed = 0usize;

        let mut cur = self.ready_head;
        while let Some(idx) = cur {
            let task = match self.pool.get(idx) {
                Some(t) => t,
                None => {
                    log::warn!("rt: dangling index {} in ready list", idx);
                    return false;
                }
            };
            traversed += 1;

            if task.state != RtTaskState::Ready {
                log::warn!(
                    "rt: pid {} in ready list but state {}",
                    task.pid,
                    task.state.tag()
                );
                valid = false;
            }
            if let Some(p) = prev {
                if self.outranks(idx, p) {
                    log::warn!("rt: {} order violated at pid {}", self.algo.name(), task.pid);
                    valid = false;
                }
            }

            prev = Some(idx);
            cur = task.next_ready;
            if traversed > RT_MAX_TASKS {
                log::warn!("rt: ready list corrupted (too many nodes)");
                return false;
            }
        }
        valid
    }

    fn dump(&self, _ctx: &dyn KernelCtx) {
        log::info!("=== Real-Time Tasks ({}) ===", self.algo.name());
        let mut cur = self.all_head;
        while let Some(idx) = cur {
            match self.pool.get(idx) {
                Some(t) => {
                    log::info!(
                        "pid {} [{}]: period={} deadline={} wcet={} prio={} remaining={} \
                         abs-deadline={} laxity={} inst={} done={} missed={}",
                        t.pid,
                        t.state.tag(),
                        t.params.period,
                        t.params.deadline,
                        t.params.wcet,
                        t.rms_priority,
                        t.remaining_time,
                        t.absolute_deadline,
                        t.laxity,
                        t.instances,
                        t.completions,
                        t.deadline_misses
                    );
                    if t.completions > 0 {
                        log::info!(
                            "  started @{}, exec total {}, avg response {:.2}, worst {}",
                            t.start_time,
                            t.total_exec_time,
                            t.total_response_time as f64 / t.completions as f64,
                            t.worst_response_time
                        );
                    }
                    cur = t.next_all;
                }
                None => break,
            }
        }
    }
}

impl RealtimePolicy {
    fn check_preempt_inner(&mut self) -> bool {
        if self.algo == RtAlgorithm::Llf {
            self.update_laxities();
        }
        let head = match self.ready_head {
            Some(idx) => idx,
            None => return false,
        };
        match self.current {
            None => true,
            Some(curr) => {
                let running = self
                    .pool
                    .get(curr)
                    .map(|t| t.state == RtTaskState::Running)
                    .unwrap_or(false);
                if !running {
                    return true;
                }
                self.outranks(head, curr)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimKernel;

    fn params(period: u32, deadline: u32, wcet: u32) -> RtTaskParams {
        RtTaskParams {
            period,
            deadline,
            wcet,
            phase: 0,
            miss_policy: RtMissPolicy::Notify,
        }
    }

    fn admit(rt: &mut RealtimePolicy, sim: &mut SimKernel, pid: usize, p: RtTaskParams) {
        sim.spawn(Pid(pid), 99);
        rt.create_task(Pid(pid), p).unwrap();
        rt.enqueue(sim, Pid(pid));
    }

    #[test]
    fn edf_orders_by_absolute_deadline() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        admit(&mut rt, &mut sim, 1, params(100, 50, 5));
        admit(&mut rt, &mut sim, 2, params(100, 20, 5));
        admit(&mut rt, &mut sim, 3, params(100, 80, 5));

        assert_eq!(rt.pick_next(&mut sim), Some(Pid(2)));
        assert!(rt.validate(&sim));
    }

    #[test]
    fn rms_priorities_follow_period() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        admit(&mut rt, &mut sim, 1, params(50, 50, 5));
        admit(&mut rt, &mut sim, 2, params(10, 10, 2));
        admit(&mut rt, &mut sim, 3, params(30, 30, 5));
        rt.set_algorithm(RtAlgorithm::Rms);

        // Shortest period outranks everyone.
        assert_eq!(rt.rms_priority_of(Pid(2)), Some(3));
        assert_eq!(rt.rms_priority_of(Pid(3)), Some(2));
        assert_eq!(rt.rms_priority_of(Pid(1)), Some(1));
        assert_eq!(rt.pick_next(&mut sim), Some(Pid(2)));
        assert!(rt.validate(&sim));
    }

    #[test]
    fn dms_orders_by_relative_deadline() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        admit(&mut rt, &mut sim, 1, params(50, 40, 5));
        admit(&mut rt, &mut sim, 2, params(50, 15, 5));
        rt.set_algorithm(RtAlgorithm::Dms);
        assert_eq!(rt.pick_next(&mut sim), Some(Pid(2)));
    }

    #[test]
    fn llf_picks_least_laxity_and_tracks_execution() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        admit(&mut rt, &mut sim, 1, params(100, 100, 30));
        admit(&mut rt, &mut sim, 2, params(100, 40, 10));
        rt.set_algorithm(RtAlgorithm::Llf);

        // Laxities: pid1 = 100-30 = 70, pid2 = 40-10 = 30.
        assert_eq!(rt.pick_next(&mut sim), Some(Pid(2)));
        assert!(rt.validate(&sim));
    }

    #[test]
    fn utilization_and_rms_bound() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        admit(&mut rt, &mut sim, 1, params(10, 10, 3));
        admit(&mut rt, &mut sim, 2, params(20, 20, 4));
        let util = rt.utilization();
        assert!((util - 0.5).abs() < 1e-9);

        let bound = RealtimePolicy::rms_utilization_bound(2);
        assert!((bound - 0.8284).abs() < 1e-3);
        assert!(RealtimePolicy::rms_utilization_bound(0) == 0.0);
    }

    #[test]
    fn edf_schedulable_iff_utilization_below_one() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        admit(&mut rt, &mut sim, 1, params(10, 10, 3));
        admit(&mut rt, &mut sim, 2, params(15, 15, 5));
        admit(&mut rt, &mut sim, 3, params(20, 20, 4));
        assert!(rt.is_schedulable());

        rt.set_params(Pid(3), params(20, 20, 10)).unwrap();
        assert!(!rt.is_schedulable());
    }

    #[test]
    fn completed_instances_rerelease_periodically() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        admit(&mut rt, &mut sim, 1, params(10, 10, 2));
        rt.schedule(&mut sim);

        for _ in 0..10 {
            if rt.tick(&mut sim) {
                rt.schedule(&mut sim);
            }
        }
        // One instance completed at t=2; re-release at t=10.
        assert_eq!(rt.completions(Pid(1)), Some(1));
        assert!(matches!(
            rt.state_of(Pid(1)),
            Some(RtTaskState::Ready) | Some(RtTaskState::Running)
        ));
    }

    #[test]
    fn skip_policy_removes_until_next_release() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        let mut p = params(50, 5, 30);
        p.miss_policy = RtMissPolicy::Skip;
        admit(&mut rt, &mut sim, 1, p);
        rt.schedule(&mut sim);

        for _ in 0..10 {
            if rt.tick(&mut sim) {
                rt.schedule(&mut sim);
            }
        }
        assert_eq!(rt.deadline_misses(Pid(1)), Some(1));
        assert_eq!(rt.state_of(Pid(1)), Some(RtTaskState::Missed));

        // Next period brings it back.
        for _ in 0..45 {
            if rt.tick(&mut sim) {
                rt.schedule(&mut sim);
            }
        }
        assert!(matches!(
            rt.state_of(Pid(1)),
            Some(RtTaskState::Ready) | Some(RtTaskState::Running)
        ));
    }

    #[test]
    fn notify_policy_keeps_running_and_counts_once_per_instance() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        admit(&mut rt, &mut sim, 1, params(100, 5, 20));
        rt.schedule(&mut sim);

        for _ in 0..15 {
            if rt.tick(&mut sim) {
                rt.schedule(&mut sim);
            }
        }
        // Miss latched exactly once for the overrun instance, and the
        // instance kept executing past its deadline.
        assert_eq!(rt.deadline_misses(Pid(1)), Some(1));
        assert_eq!(rt.state_of(Pid(1)), Some(RtTaskState::Running));
    }

    #[test]
    fn response_time_analysis_classic_set() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        admit(&mut rt, &mut sim, 1, params(50, 50, 12));
        admit(&mut rt, &mut sim, 2, params(40, 40, 10));
        admit(&mut rt, &mut sim, 3, params(30, 30, 10));
        rt.set_algorithm(RtAlgorithm::Rms);

        assert_eq!(rt.response_time(Pid(3)), Some(10));
        assert_eq!(rt.response_time(Pid(2)), Some(20));
        // Lowest-priority task diverges past its deadline.
        assert_eq!(rt.rta_feasible(Pid(3)), Some(true));
        assert_eq!(rt.rta_feasible(Pid(2)), Some(true));
        assert_eq!(rt.rta_feasible(Pid(1)), Some(false));
    }

    #[test]
    fn phase_delays_first_release() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        sim.spawn(Pid(1), 99);
        let mut p = params(20, 20, 2);
        p.phase = 5;
        rt.create_task(Pid(1), p).unwrap();
        rt.enqueue(&mut sim, Pid(1));
        assert_eq!(rt.state_of(Pid(1)), Some(RtTaskState::Inactive));

        for _ in 0..5 {
            rt.tick(&mut sim);
        }
        assert_eq!(rt.state_of(Pid(1)), Some(RtTaskState::Ready));
    }

    #[test]
    fn dequeue_forgets_the_task() {
        let mut sim = SimKernel::new();
        let mut rt = RealtimePolicy::new();
        admit(&mut rt, &mut sim, 1, params(10, 10, 2));
        admit(&mut rt, &mut sim, 2, params(20, 20, 2));
        rt.dequeue(&mut sim, Pid(1));
        assert_eq!(rt.get_params(Pid(1)), None);
        assert_eq!(rt.task_count(), 1);
        assert!(rt.validate(&sim));
    }
}
