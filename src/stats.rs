/*
 * Accounting Records
 *
 * Global framework counters, per-process counters, and one record per
 * policy. All counters are monotone between resets; nothing here wraps
 * before 2^63.
 */

use crate::config::MLFQ_NUM_LEVELS;

/// Framework-wide counters. Persist across policy switches so cumulative
/// history is preserved.
#[derive(Debug, Copy, Clone, Default)]
pub struct SchedStats {
    pub total_schedules: u64,
    pub context_switches: u64,
    pub idle_time: u64,
    pub busy_time: u64,
    pub runnable_count: u32,
    pub blocked_count: u32,
    pub max_runnable: u32,
    pub preemptions: u32,
    pub voluntary_yields: u32,
    pub quantum_expirations: u64,
}

/// Per-process counters, indexed by pid. Reset when the pid is recycled
/// through `sched_new_process`.
#[derive(Debug, Copy, Clone, Default)]
pub struct ProcStats {
    pub total_runtime: u64,
    pub total_waittime: u64,
    pub total_sleeptime: u64,
    pub context_switches: u32,
    pub voluntary_switches: u32,
    pub involuntary_switches: u32,
    pub time_slices: u32,
    pub times_scheduled: u32,
    pub last_scheduled: u64,
    pub last_runtime: u64,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct RrStats {
    pub total_processes: u32,
    pub total_context_switches: u64,
    pub total_quantum_expires: u64,
    pub current_queue_length: u32,
    pub max_queue_length: u32,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct PrioStats {
    pub total_schedules: u64,
    pub context_switches: u64,
    pub priority_changes: u32,
    pub aging_boosts: u32,
    pub starvation_boosts: u32,
    pub preemptions: u32,
    pub current_queue_length: u32,
    pub avg_wait_time: u64,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct MlfqStats {
    pub total_schedules: u64,
    pub context_switches: u64,
    pub promotions: u32,
    pub demotions: u32,
    pub priority_boosts: u32,
    pub io_bonuses: u32,
    pub per_level_count: [u32; MLFQ_NUM_LEVELS],
    pub per_level_time: [u64; MLFQ_NUM_LEVELS],
}

#[derive(Debug, Copy, Clone, Default)]
pub struct LotteryStats {
    pub total_lotteries: u64,
    pub total_tickets: u32,
    pub participant_count: u32,
    pub tickets_transferred: u32,
    pub compensation_given: u32,
    pub fairness_index: f64,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct CfsStats {
    pub switches: u64,
    pub total_runtime: u64,
    pub sleep_time: u64,
}

#[derive(Debug, Copy, Clone, Default)]
pub struct RtStats {
    pub total_releases: u64,
    pub total_completions: u64,
    pub total_deadline_misses: u64,
    pub preemptions: u64,
    pub context_switches: u64,
    pub utilization: f64,
    pub schedulability_bound: f64,
    pub schedulable: bool,
}

/// Typed snapshot of the active policy's counters, one variant per policy.
#[derive(Debug, Copy, Clone)]
pub enum PolicyStats {
    RoundRobin(RrStats),
    Priority(PrioStats),
    Mlfq(MlfqStats),
    Lottery(LotteryStats),
    Cfs(CfsStats),
    Realtime(RtStats),
}
