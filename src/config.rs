/*
 * Compile-Time Configuration
 *
 * Every tunable the scheduler recognizes lives here with its default value
 * and clamp range. Policies read these at init; runtime setters exist for
 * the knobs that are meant to move while the system is up (aging interval,
 * boost interval, compensation toggle, per-level quanta, RT algorithm).
 */

/// Upper bound on process ids. Pids are `0..NPROC`; every per-policy node
/// pool is sized to this (or the policy-specific maximum below).
pub const NPROC: usize = 64;

/// Initial time quantum, in ticks, for the generic ready queue and for any
/// policy that does not manage its own quantum.
pub const DEFAULT_QUANTUM: u32 = 10;

/// Framework quantum clamp range.
pub const MIN_QUANTUM: u32 = 1;
pub const MAX_QUANTUM: u32 = 1000;

// Priority bands. All priorities are clamped to [PRIORITY_MIN, PRIORITY_MAX];
// the named bands are the conventional entry points.
pub const PRIORITY_MIN: u32 = 0;
pub const PRIORITY_MAX: u32 = 99;
pub const PRIORITY_IDLE: u32 = 0;
pub const PRIORITY_LOW: u32 = 25;
pub const PRIORITY_NORMAL: u32 = 50;
pub const PRIORITY_HIGH: u32 = 75;
pub const PRIORITY_REALTIME: u32 = 99;
pub const PRIORITY_DEFAULT: u32 = PRIORITY_NORMAL;

// Round-robin. The RR quantum has a tighter clamp than the framework's.
pub const RR_DEFAULT_QUANTUM: u32 = 10;
pub const RR_MIN_QUANTUM: u32 = 1;
pub const RR_MAX_QUANTUM: u32 = 100;

// Priority-with-aging tunables.
pub const PRIO_AGING_ENABLED: bool = true;
pub const PRIO_AGING_INTERVAL: u32 = 100;
pub const PRIO_AGING_AMOUNT: u32 = 1;
/// Queued ticks after which the starvation guard fires.
pub const PRIO_STARVATION_THRESHOLD: u64 = 1000;
pub const PRIO_STARVATION_BOOST: u32 = 10;

// Multi-level feedback queue.
pub const MLFQ_NUM_LEVELS: usize = 8;
/// Quantum for level k is `2 * 2^k` ticks; allotment is twice the quantum.
pub const MLFQ_LEVEL_QUANTA: [u32; MLFQ_NUM_LEVELS] = [2, 4, 8, 16, 32, 64, 128, 256];
pub const MLFQ_BOOST_INTERVAL: u32 = 1000;
pub const MLFQ_IO_BONUS_LEVELS: usize = 2;
/// I/O completions before a task earns the promotion bonus.
pub const MLFQ_IO_PROMOTE_COUNT: u32 = 3;
/// Voluntary yields before a task earns a one-level promotion.
pub const MLFQ_YIELD_PROMOTE_COUNT: u32 = 5;

// Lottery.
pub const LOTTERY_DEFAULT_TICKETS: u32 = 100;
pub const LOTTERY_MIN_TICKETS: u32 = 1;
pub const LOTTERY_MAX_TICKETS: u32 = 10_000;
pub const LOTTERY_LOW_TICKETS: u32 = 25;
pub const LOTTERY_NORMAL_TICKETS: u32 = 100;
pub const LOTTERY_HIGH_TICKETS: u32 = 400;
pub const LOTTERY_REALTIME_TICKETS: u32 = 1600;
pub const LOTTERY_COMPENSATION_ENABLED: bool = true;

// Completely-fair scheduling. Times are in ticks, vruntime in weighted ticks.
pub const CFS_TARGET_LATENCY: u64 = 20;
pub const CFS_MIN_GRANULARITY: u64 = 4;
pub const CFS_NICE_MIN: i32 = -20;
pub const CFS_NICE_MAX: i32 = 19;
pub const CFS_NICE_DEFAULT: i32 = 0;
pub const CFS_NICE_LEVELS: usize = 40;
pub const CFS_WEIGHT_NICE0: u64 = 1024;
pub const CFS_SLEEPER_BONUS: bool = true;

// Real-time.
pub const RT_MAX_TASKS: usize = 64;
pub const RT_DEFAULT_PERIOD: u32 = 100;
pub const RT_DEFAULT_DEADLINE: u32 = 100;
pub const RT_DEFAULT_WCET: u32 = 10;
