/*
 * Scheduler Manager
 *
 * SchedManager is a zero-sized type that namespaces the kernel-facing
 * control surface over a global SchedCore singleton. The singleton lives
 * behind a spin mutex (the cross-policy serialization point); every
 * operation additionally holds the environment's interrupt mask for its
 * whole scope, so the timer tick can never observe a half-updated
 * structure.
 */

use spin::Mutex;

use crate::sched_core::SchedCore;
use crate::stats::{PolicyStats, ProcStats, SchedStats};
use crate::traits::{IntrGuard, IntrOps, KernelCtx, NoIntr};
use crate::types::{Pid, PolicyKind, SchedError};

static NOINTR: NoIntr = NoIntr;

/// Global scheduler instance.
static SCHED: Mutex<Option<SchedCore>> = Mutex::new(None);

/// Registered interrupt controller; a no-op until the environment
/// provides the real one.
static INTR: Mutex<&'static (dyn IntrOps)> = Mutex::new(&NOINTR);

fn with_core<R>(f: impl FnOnce(&mut SchedCore) -> R) -> Result<R, SchedError> {
    let ops: &'static dyn IntrOps = *INTR.lock();
    let _mask = IntrGuard::new(ops);
    let mut guard = SCHED.lock();
    match guard.as_mut() {
        Some(core) => Ok(f(core)),
        None => Err(SchedError::NotInitialized),
    }
}

/// Namespaced control surface for the global scheduler.
pub struct SchedManager;

impl SchedManager {
    /// Register the environment's interrupt-disable/restore primitive.
    /// Call once at boot, before `init`.
    pub fn set_intr_ops(ops: &'static dyn IntrOps) {
        *INTR.lock() = ops;
    }

    /// Bring the scheduler up under the given policy.
    pub fn init(kind: PolicyKind) {
        let ops: &'static dyn IntrOps = *INTR.lock();
        let _mask = IntrGuard::new(ops);
        *SCHED.lock() = Some(SchedCore::new(kind));
    }

    /// Bring the scheduler up from a raw policy selector. An unknown
    /// selector falls back to the priority policy.
    pub fn init_raw(raw: u32) -> PolicyKind {
        let kind = PolicyKind::from_raw(raw).unwrap_or(PolicyKind::Priority);
        Self::init(kind);
        kind
    }

    /// Tear the scheduler down entirely.
    pub fn shutdown(ctx: &mut dyn KernelCtx) {
        let ops: &'static dyn IntrOps = *INTR.lock();
        let _mask = IntrGuard::new(ops);
        let mut guard = SCHED.lock();
        if let Some(core) = guard.as_mut() {
            core.shutdown(ctx);
        }
        *guard = None;
    }

    pub fn is_initialized() -> bool {
        SCHED.lock().is_some()
    }

    /// Swap the active policy. Queued processes are not migrated; the
    /// caller re-enqueues survivors through `ready`.
    pub fn switch_to(ctx: &mut dyn KernelCtx, kind: PolicyKind) -> Result<(), SchedError> {
        with_core(|core| core.switch_policy(ctx, kind))
    }

    /// Swap the active policy from a raw selector. Unknown selectors are
    /// an error and leave the current policy untouched.
    pub fn switch_raw(ctx: &mut dyn KernelCtx, raw: u32) -> Result<(), SchedError> {
        let kind = PolicyKind::from_raw(raw).ok_or(SchedError::UnknownPolicy)?;
        Self::switch_to(ctx, kind)
    }

    pub fn schedule(ctx: &mut dyn KernelCtx) {
        let _ = with_core(|core| core.schedule(ctx));
    }

    pub fn resched(ctx: &mut dyn KernelCtx) {
        let _ = with_core(|core| core.resched(ctx));
    }

    pub fn yield_cpu(ctx: &mut dyn KernelCtx) {
        let _ = with_core(|core| core.yield_cpu(ctx));
    }

    pub fn preempt(ctx: &mut dyn KernelCtx) {
        let _ = with_core(|core| core.preempt(ctx));
    }

    pub fn ready(ctx: &mut dyn KernelCtx, pid: Pid) {
        let _ = with_core(|core| core.sched_ready(ctx, pid));
    }

    pub fn block(ctx: &mut dyn KernelCtx, pid: Pid) {
        let _ = with_core(|core| core.sched_block(ctx, pid));
    }

    pub fn wakeup(ctx: &mut dyn KernelCtx, pid: Pid) {
        let _ = with_core(|core| core.sched_wakeup(ctx, pid));
    }

    pub fn new_process(pid: Pid) {
        let _ = with_core(|core| core.sched_new_process(pid));
    }

    pub fn exit(ctx: &mut dyn KernelCtx, pid: Pid) {
        let _ = with_core(|core| core.sched_exit(ctx, pid));
    }

    pub fn set_priority(
        ctx: &mut dyn KernelCtx,
        pid: Pid,
        priority: u32,
    ) -> Result<u32, SchedError> {
        with_core(|core| core.setpriority(ctx, pid, priority))?
    }

    pub fn get_priority(ctx: &mut dyn KernelCtx, pid: Pid) -> Result<u32, SchedError> {
        with_core(|core| core.getpriority(ctx, pid))?
    }

    pub fn nice(ctx: &mut dyn KernelCtx, increment: i32) -> Result<u32, SchedError> {
        with_core(|core| core.nice(ctx, increment))?
    }

    pub fn set_quantum(quantum: u32) {
        let _ = with_core(|core| core.set_quantum(quantum));
    }

    pub fn get_quantum() -> u32 {
        with_core(|core| core.get_quantum()).unwrap_or(0)
    }

    /// Timer interrupt entry point; call once per clock unit.
    pub fn tick(ctx: &mut dyn KernelCtx) {
        let _ = with_core(|core| core.sched_tick(ctx));
    }

    pub fn time() -> u64 {
        with_core(|core| core.time()).unwrap_or(0)
    }

    pub fn need_resched() -> bool {
        with_core(|core| core.need_resched()).unwrap_or(false)
    }

    pub fn stats() -> Result<SchedStats, SchedError> {
        with_core(|core| core.stats())
    }

    pub fn policy_stats() -> Result<PolicyStats, SchedError> {
        with_core(|core| core.policy_stats())
    }

    pub fn proc_stats(pid: Pid) -> Result<ProcStats, SchedError> {
        with_core(|core| core.proc_stats(pid))?
    }

    pub fn reset_stats() {
        let _ = with_core(|core| core.reset_stats());
    }

    pub fn policy_name() -> &'static str {
        with_core(|core| core.policy_name()).unwrap_or("none")
    }

    pub fn validate(ctx: &mut dyn KernelCtx) -> bool {
        with_core(|core| core.validate(ctx)).unwrap_or(false)
    }

    pub fn dump(ctx: &mut dyn KernelCtx) {
        let _ = with_core(|core| core.dump(ctx));
    }

    pub fn print_stats() {
        let _ = with_core(|core| core.print_stats());
    }

    pub fn print_ready_queue() {
        let _ = with_core(|core| core.print_ready_queue());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimKernel;

    // The manager wraps one global singleton; tests that touch it take
    // this lock so they cannot interleave.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn lifecycle_through_the_facade() {
        let _serial = TEST_LOCK.lock();
        let mut sim = SimKernel::new();

        SchedManager::init(PolicyKind::RoundRobin);
        assert!(SchedManager::is_initialized());
        assert_eq!(SchedManager::policy_name(), "round-robin");

        sim.spawn(Pid(1), 50);
        sim.spawn(Pid(2), 50);
        SchedManager::ready(&mut sim, Pid(1));
        SchedManager::ready(&mut sim, Pid(2));
        SchedManager::schedule(&mut sim);
        assert_eq!(sim.current(), Some(Pid(1)));

        for _ in 0..10 {
            SchedManager::tick(&mut sim);
        }
        assert!(SchedManager::need_resched());
        SchedManager::schedule(&mut sim);
        assert_eq!(sim.current(), Some(Pid(2)));
        assert!(!SchedManager::need_resched());

        assert_eq!(SchedManager::time(), 10);
        assert!(SchedManager::validate(&mut sim));

        SchedManager::shutdown(&mut sim);
        assert!(!SchedManager::is_initialized());
        assert!(matches!(
            SchedManager::stats(),
            Err(SchedError::NotInitialized)
        ));
    }

    #[test]
    fn raw_selectors_follow_fallback_rules() {
        let _serial = TEST_LOCK.lock();
        let mut sim = SimKernel::new();

        // Unknown selector at init falls back to priority.
        let kind = SchedManager::init_raw(99);
        assert_eq!(kind, PolicyKind::Priority);
        assert_eq!(SchedManager::policy_name(), "priority");

        // Unknown selector at switch is an error and changes nothing.
        assert_eq!(
            SchedManager::switch_raw(&mut sim, 42),
            Err(SchedError::UnknownPolicy)
        );
        assert_eq!(SchedManager::policy_name(), "priority");

        // Known selector switches.
        assert_eq!(SchedManager::switch_raw(&mut sim, 3), Ok(()));
        assert_eq!(SchedManager::policy_name(), "lottery");

        SchedManager::shutdown(&mut sim);
    }
}
