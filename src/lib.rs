/*
 * ksched - Pluggable CPU Scheduling Framework
 *
 * One active policy decides, at every scheduling point, which process
 * runs next and for how long. Six policies are interchangeable behind a
 * uniform capability record:
 *
 * - Round-robin: circular FIFO, equal quantum
 * - Priority: sorted list with aging and a starvation guard
 * - MLFQ: eight feedback levels, geometric quanta, periodic boost
 * - Lottery: weighted-random draw with transfers and compensation
 * - CFS: vruntime timeline with weight table and sleeper credit
 * - Real-time: periodic tasks under EDF / RMS / DMS / LLF
 *
 * The framework (SchedCore) owns the active policy, global accounting,
 * the need_resched flag and a generic ready-queue fallback; SchedManager
 * wraps one SchedCore in a global singleton for the kernel-facing API.
 * The surrounding kernel is abstracted behind two small traits: KernelCtx
 * (process table, current pid, context switch) and IntrOps (interrupt
 * mask). sim::SimKernel implements both ends for hosted use and tests.
 *
 * Concurrency model: a single logical CPU; the only concurrency is
 * between mainline code and the timer tick, handled by masking
 * interrupts for the scope of each mutating operation. The global
 * singleton additionally serializes cross-policy transitions behind a
 * spin mutex.
 */

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod manager;
pub mod policies;
pub mod pool;
pub mod sched_core;
pub mod sim;
pub mod stats;
pub mod traits;
pub mod types;

pub use manager::SchedManager;
pub use policies::{
    make_policy, CfsPolicy, LotteryPolicy, MlfqPolicy, PriorityPolicy, RealtimePolicy,
    RoundRobinPolicy, RtTaskParams,
};
pub use sched_core::SchedCore;
pub use stats::{PolicyStats, ProcStats, SchedStats};
pub use traits::{IntrGuard, IntrOps, KernelCtx, NoIntr, PolicyCaps, SchedPolicy};
pub use types::{
    Pid, PolicyKind, ProcState, RtAlgorithm, RtMissPolicy, RtTaskState, SchedError,
};
