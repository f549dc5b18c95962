/*
 * End-to-end scheduling scenarios
 *
 * Each test drives a policy (or the whole framework) through the
 * simulated kernel and checks externally observable behavior: rotation
 * order, aging, demotion ladders, fairness of the lottery draw,
 * proportional CPU share, and deadline handling.
 */

use ksched::{
    CfsPolicy, KernelCtx, LotteryPolicy, MlfqPolicy, Pid, PolicyKind, PolicyStats,
    PriorityPolicy, ProcState, RealtimePolicy, RtAlgorithm, RtMissPolicy, RtTaskParams,
    SchedCore, SchedPolicy,
};
use ksched::sim::SimKernel;

fn rt_params(period: u32, deadline: u32, wcet: u32) -> RtTaskParams {
    RtTaskParams {
        period,
        deadline,
        wcet,
        phase: 0,
        miss_policy: RtMissPolicy::Notify,
    }
}

#[test]
fn round_robin_rotation() {
    let mut sim = SimKernel::new();
    let mut core = SchedCore::new(PolicyKind::RoundRobin);

    for p in 1..=3 {
        sim.spawn(Pid(p), 50);
        core.sched_ready(&mut sim, Pid(p));
    }

    // Dispatch the first process, then count switches from a clean slate.
    core.schedule(&mut sim);
    assert_eq!(sim.current(), Some(Pid(1)));
    core.reset_stats();

    for _ in 0..10 {
        core.sched_tick(&mut sim);
    }
    assert!(core.need_resched());
    core.schedule(&mut sim);
    assert_eq!(sim.current(), Some(Pid(2)));

    for _ in 0..10 {
        core.sched_tick(&mut sim);
    }
    core.schedule(&mut sim);
    assert_eq!(sim.current(), Some(Pid(3)));

    assert_eq!(core.stats().context_switches, 2);
    match core.policy_stats() {
        PolicyStats::RoundRobin(rr) => assert_eq!(rr.current_queue_length, 3),
        other => panic!("unexpected stats: {:?}", other),
    }
    assert!(core.validate(&sim));
}

#[test]
fn priority_aging_lets_the_starved_win() {
    let mut sim = SimKernel::new();
    let mut prio = PriorityPolicy::new();

    sim.spawn(Pid(1), 10);
    sim.spawn(Pid(2), 90);
    prio.enqueue(&mut sim, Pid(1));
    prio.enqueue(&mut sim, Pid(2));

    // Without aging the high-priority process always heads the queue.
    prio.set_aging_enabled(false);
    for _ in 0..5 {
        assert_eq!(prio.pick_next(&mut sim), Some(Pid(2)));
    }

    // Let pid 2 run and age pid 1 at one point per ten ticks.
    prio.schedule(&mut sim);
    assert_eq!(sim.current(), Some(Pid(2)));
    prio.set_aging_enabled(true);
    prio.set_aging_interval(10);
    prio.set_aging_amount(1);

    for _ in 0..800 {
        prio.tick(&mut sim);
    }

    assert_eq!(prio.get_priority(&sim, Pid(1)), Some(90));
    assert_eq!(prio.pick_next(&mut sim), Some(Pid(1)));
    assert!(prio.validate(&sim));
}

#[test]
fn mlfq_demotion_ladder_and_boost() {
    let mut sim = SimKernel::new();
    let mut mlfq = MlfqPolicy::new();

    sim.spawn(Pid(1), 75);
    mlfq.enqueue(&mut sim, Pid(1));
    assert_eq!(mlfq.level_of(Pid(1)), Some(0));
    mlfq.schedule(&mut sim);

    // A CPU hog burns its allotment at each level in turn:
    // 4 + 8 + 16 + 32 + 64 + 128 + 256 = 508 ticks to the bottom.
    let mut tick = 0u32;
    for _ in 0..4 {
        mlfq.tick(&mut sim);
        tick += 1;
    }
    assert_eq!(tick, 4);
    assert_eq!(mlfq.level_of(Pid(1)), Some(1));

    for _ in 0..8 {
        mlfq.tick(&mut sim);
        tick += 1;
    }
    assert_eq!(tick, 12);
    assert_eq!(mlfq.level_of(Pid(1)), Some(2));

    while tick < 508 {
        mlfq.tick(&mut sim);
        tick += 1;
    }
    assert_eq!(mlfq.level_of(Pid(1)), Some(7));

    // The periodic boost brings it home with fresh accounting.
    while tick < 1000 {
        mlfq.tick(&mut sim);
        tick += 1;
    }
    assert_eq!(mlfq.level_of(Pid(1)), Some(0));
    assert!(mlfq.validate(&sim));
}

#[test]
fn lottery_fairness_over_many_draws() {
    let mut sim = SimKernel::new();
    let mut lottery = LotteryPolicy::new();

    sim.spawn(Pid(1), 50);
    sim.spawn(Pid(2), 50);
    lottery.enqueue(&mut sim, Pid(1));
    lottery.enqueue(&mut sim, Pid(2));
    lottery.set_seed(1);
    lottery.set_tickets(Pid(1), 100);
    lottery.set_tickets(Pid(2), 300);

    for _ in 0..10_000 {
        lottery.draw();
    }

    let wins = lottery.wins(Pid(2)).unwrap();
    assert!(
        (7_300..=7_700).contains(&wins),
        "300-ticket holder won {} of 10000",
        wins
    );
    assert!(lottery.fairness_index() >= 0.95);
    assert!(lottery.validate(&sim));
}

#[test]
fn cfs_share_is_proportional_to_weight() {
    let mut sim = SimKernel::new();
    let mut cfs = CfsPolicy::new();

    sim.spawn(Pid(1), 50);
    sim.spawn(Pid(2), 50);
    cfs.enqueue(&mut sim, Pid(1));
    cfs.enqueue(&mut sim, Pid(2));
    cfs.set_nice(Pid(2), 5);
    cfs.schedule(&mut sim);

    let mut last_floor = cfs.min_vruntime();
    for _ in 0..2000 {
        if cfs.tick(&mut sim) {
            cfs.schedule(&mut sim);
        }
        assert!(cfs.min_vruntime() >= last_floor);
        last_floor = cfs.min_vruntime();
    }

    let a = cfs.sum_exec_of(Pid(1)).unwrap() as f64;
    let b = cfs.sum_exec_of(Pid(2)).unwrap() as f64;
    let ideal = 1024.0 / 335.0;
    let ratio = a / b;
    assert!(
        (ratio - ideal).abs() / ideal < 0.10,
        "share ratio {:.3} strays from {:.3}",
        ratio,
        ideal
    );
    assert!(cfs.validate(&sim));
}

#[test]
fn edf_meets_deadlines_when_feasible() {
    let mut sim = SimKernel::new();
    let mut rt = RealtimePolicy::new();

    for (pid, p) in [
        (1, rt_params(10, 10, 3)),
        (2, rt_params(15, 15, 5)),
        (3, rt_params(20, 20, 4)),
    ] {
        sim.spawn(Pid(pid), 99);
        rt.create_task(Pid(pid), p).unwrap();
        rt.enqueue(&mut sim, Pid(pid));
    }

    assert_eq!(rt.algorithm(), RtAlgorithm::Edf);
    assert!(rt.is_schedulable());

    rt.schedule(&mut sim);
    for _ in 0..600 {
        if rt.tick(&mut sim) {
            rt.schedule(&mut sim);
        }
    }
    assert_eq!(rt.total_deadline_misses(), 0);
    assert!(rt.validate(&sim));

    // Inflate task 3 past the feasible region; misses must accrue.
    rt.set_params(Pid(3), rt_params(20, 20, 10)).unwrap();
    assert!(!rt.is_schedulable());

    for _ in 0..600 {
        if rt.tick(&mut sim) {
            rt.schedule(&mut sim);
        }
    }
    assert!(rt.total_deadline_misses() > 0);
}

#[test]
fn enqueue_dequeue_roundtrip_is_identity() {
    for kind in [
        PolicyKind::RoundRobin,
        PolicyKind::Priority,
        PolicyKind::Mlfq,
        PolicyKind::Lottery,
        PolicyKind::Cfs,
        PolicyKind::Realtime,
    ] {
        let mut sim = SimKernel::new();
        let mut core = SchedCore::new(kind);
        for p in 1..=3 {
            sim.spawn(Pid(p), 50);
            core.sched_ready(&mut sim, Pid(p));
        }
        let head_before = core.policy_mut().pick_next(&mut sim);

        sim.spawn(Pid(9), 50);
        core.sched_ready(&mut sim, Pid(9));
        core.sched_exit(&mut sim, Pid(9));
        sim.reap(Pid(9));

        assert!(core.validate(&sim), "{:?} invalid after roundtrip", kind);
        let head_after = core.policy_mut().pick_next(&mut sim);
        assert_eq!(head_before, head_after, "{:?} head changed", kind);
    }
}

#[test]
fn validate_holds_through_mixed_operation_sequences() {
    for kind in [
        PolicyKind::RoundRobin,
        PolicyKind::Priority,
        PolicyKind::Mlfq,
        PolicyKind::Lottery,
        PolicyKind::Cfs,
        PolicyKind::Realtime,
    ] {
        let mut sim = SimKernel::new();
        let mut core = SchedCore::new(kind);

        for p in 0..8 {
            sim.spawn(Pid(p), (p as u32 * 13) % 100);
            core.sched_ready(&mut sim, Pid(p));
        }
        core.schedule(&mut sim);

        for step in 0..300u64 {
            core.sched_tick(&mut sim);
            if core.need_resched() {
                core.schedule(&mut sim);
            }
            match step % 7 {
                1 => {
                    let pid = Pid((step % 8) as usize);
                    let _ = core.setpriority(&mut sim, pid, (step % 100) as u32);
                }
                3 => core.yield_cpu(&mut sim),
                5 => {
                    let pid = Pid((step % 8) as usize);
                    if sim.proc_state(pid) == ProcState::Ready {
                        core.sched_block(&mut sim, pid);
                        sim.set_proc_state(pid, ProcState::Waiting);
                        core.sched_wakeup(&mut sim, pid);
                    }
                }
                _ => {}
            }
            assert!(
                core.validate(&sim),
                "{:?} invariants broken at step {}",
                kind,
                step
            );
        }
        assert!(core.time() >= 300);
    }
}

#[test]
fn policy_switch_preserves_cumulative_history() {
    let mut sim = SimKernel::new();
    let mut core = SchedCore::new(PolicyKind::RoundRobin);

    for p in 1..=4 {
        sim.spawn(Pid(p), 50);
        core.sched_ready(&mut sim, Pid(p));
    }
    core.schedule(&mut sim);
    for _ in 0..100 {
        core.sched_tick(&mut sim);
        if core.need_resched() {
            core.schedule(&mut sim);
        }
    }
    let ticks_before = core.time();
    let switches_before = core.stats().context_switches;
    let runtime_before = core.proc_stats(Pid(1)).unwrap().total_runtime;
    assert!(switches_before > 0);

    // Swap policies; nothing is migrated, so re-admit the survivors.
    core.switch_policy(&mut sim, PolicyKind::Mlfq);
    for p in 1..=4 {
        if sim.proc_state(Pid(p)) == ProcState::Ready {
            core.sched_ready(&mut sim, Pid(p));
        }
    }

    assert_eq!(core.time(), ticks_before);
    assert_eq!(core.stats().context_switches, switches_before);
    assert_eq!(core.proc_stats(Pid(1)).unwrap().total_runtime, runtime_before);

    for _ in 0..50 {
        core.sched_tick(&mut sim);
        if core.need_resched() {
            core.schedule(&mut sim);
        }
    }
    assert!(core.time() > ticks_before);
    assert!(core.validate(&sim));
}
