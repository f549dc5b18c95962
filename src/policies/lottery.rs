/*
 * Lottery Scheduling Policy
 *
 * Every participant holds tickets; each scheduling decision draws a random
 * ticket and the holder wins the CPU for one quantum. Expected CPU share
 * is proportional to ticket share. Tickets are a currency: they can be
 * transferred between processes, inflated globally, and topped up with
 * compensation tickets when a process yields early so that I/O-bound work
 * is not penalized for sleeping through its quantum.
 *
 * The generator is a fixed LCG so runs are reproducible from a seed.
 */

use crate::config::{
    DEFAULT_QUANTUM, LOTTERY_COMPENSATION_ENABLED, LOTTERY_DEFAULT_TICKETS, LOTTERY_MAX_TICKETS,
    LOTTERY_MIN_TICKETS, NPROC,
};
use crate::pool::SlotPool;
use crate::stats::{LotteryStats, PolicyStats};
use crate::traits::{KernelCtx, PolicyCaps, SchedPolicy};
use crate::types::{Pid, PolicyKind, ProcState};

struct LotteryEntry {
    pid: Pid,
    base_tickets: u32,
    current_tickets: u32,
    compensation: u32,
    wins: u64,
    cumulative_tickets: u64,
    next: Option<usize>,
}

pub struct LotteryPolicy {
    pool: SlotPool<LotteryEntry>,
    head: Option<usize>,
    total_tickets: u32,
    participant_count: u32,
    compensation_enabled: bool,
    current: Option<Pid>,
    time_remaining: u32,
    quantum: u32,
    rng_state: u32,
    total_lotteries: u64,
    tickets_transferred: u32,
    compensation_given: u32,
}

impl LotteryPolicy {
    pub fn new() -> Self {
        Self {
            pool: SlotPool::new(NPROC),
            head: None,
            total_tickets: 0,
            participant_count: 0,
            compensation_enabled: LOTTERY_COMPENSATION_ENABLED,
            current: None,
            time_remaining: 0,
            quantum: DEFAULT_QUANTUM,
            rng_state: 1,
            total_lotteries: 0,
            tickets_transferred: 0,
            compensation_given: 0,
        }
    }

    /// Reseed the generator for a reproducible run.
    pub fn set_seed(&mut self, seed: u32) {
        self.rng_state = seed;
    }

    fn rng_next(&mut self) -> u32 {
        self.rng_state = self.rng_state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (self.rng_state >> 16) & 0x7FFF
    }

    fn rng_range(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.rng_next() % max
    }

    fn find(&self, pid: Pid) -> Option<usize> {
        let mut cur = self.head;
        while let Some(idx) = cur {
            let entry = self.pool.get(idx)?;
            if entry.pid == pid {
                return Some(idx);
            }
            cur = entry.next;
        }
        None
    }

    /// Hold a lottery: accumulate ticket counts until the running sum
    /// strictly exceeds the drawn ticket.
    pub fn draw(&mut self) -> Option<Pid> {
        if self.head.is_none() || self.total_tickets == 0 {
            return None;
        }

        let winning = self.rng_range(self.total_tickets);

        let mut counter = 0u32;
        let mut cur = self.head;
        while let Some(idx) = cur {
            let (pid, tickets, next) = match self.pool.get(idx) {
                Some(e) => (e.pid, e.current_tickets, e.next),
                None => break,
            };
            counter += tickets;
            if counter > winning {
                if let Some(e) = self.pool.get_mut(idx) {
                    e.wins += 1;
                }
                self.total_lotteries += 1;
                return Some(pid);
            }
            cur = next;
        }

        // Rounding fallback: hand the win to the first entry.
        let head = self.head?;
        let pid = self.pool.get(head).map(|e| e.pid)?;
        if let Some(e) = self.pool.get_mut(head) {
            e.wins += 1;
        }
        self.total_lotteries += 1;
        Some(pid)
    }

    pub fn is_participant(&self, pid: Pid) -> bool {
        self.find(pid).is_some()
    }

    /// Set a process's base ticket count, clamped to the legal range.
    /// Returns the previous base count.
    pub fn set_tickets(&mut self, pid: Pid, tickets: u32) -> Option<u32> {
        let idx = self.find(pid)?;
        let tickets = tickets.clamp(LOTTERY_MIN_TICKETS, LOTTERY_MAX_TICKETS);

        let entry = self.pool.get_mut(idx)?;
        let old = entry.base_tickets;

        self.total_tickets -= entry.current_tickets;
        entry.base_tickets = tickets;
        entry.current_tickets = tickets + entry.compensation;
        self.total_tickets += entry.current_tickets;

        Some(old)
    }

    pub fn get_tickets(&self, pid: Pid) -> Option<u32> {
        self.find(pid)
            .and_then(|i| self.pool.get(i))
            .map(|e| e.current_tickets)
    }

    pub fn add_tickets(&mut self, pid: Pid, tickets: u32) {
        if let Some(idx) = self.find(pid) {
            let base = match self.pool.get(idx) {
                Some(e) => e.base_tickets,
                None => return,
            };
            let new = base.saturating_add(tickets).min(LOTTERY_MAX_TICKETS);
            self.set_tickets(pid, new);
        }
    }

    pub fn remove_tickets(&mut self, pid: Pid, tickets: u32) {
        if let Some(idx) = self.find(pid) {
            let base = match self.pool.get(idx) {
                Some(e) => e.base_tickets,
                None => return,
            };
            let new = if tickets >= base {
                LOTTERY_MIN_TICKETS
            } else {
                base - tickets
            };
            self.set_tickets(pid, new);
        }
    }

    /// Transfer tickets between participants, clamped so neither endpoint
    /// leaves the legal range. Returns the amount actually moved.
    pub fn transfer(&mut self, from: Pid, to: Pid, tickets: u32) -> u32 {
        let from_base = match self.find(from).and_then(|i| self.pool.get(i)) {
            Some(e) => e.base_tickets,
            None => return 0,
        };
        let to_base = match self.find(to).and_then(|i| self.pool.get(i)) {
            Some(e) => e.base_tickets,
            None => return 0,
        };

        let available = from_base - LOTTERY_MIN_TICKETS;
        let space = LOTTERY_MAX_TICKETS - to_base;
        let moved = tickets.min(available).min(space);
        if moved == 0 {
            return 0;
        }

        self.set_tickets(from, from_base - moved);
        self.set_tickets(to, to_base + moved);
        self.tickets_transferred += moved;
        moved
    }

    /// Award compensation tickets to a process that used only a fraction
    /// of its quantum: `base * (1/fraction - 1)`. A full quantum (or an
    /// out-of-range fraction) clears any standing compensation.
    pub fn compensate(&mut self, pid: Pid, fraction_used: f32) {
        if !self.compensation_enabled {
            return;
        }
        let idx = match self.find(pid) {
            Some(idx) => idx,
            None => return,
        };

        let entry = match self.pool.get_mut(idx) {
            Some(e) => e,
            None => return,
        };

        self.total_tickets -= entry.current_tickets;
        if fraction_used <= 0.0 || fraction_used >= 1.0 {
            entry.compensation = 0;
            entry.current_tickets = entry.base_tickets;
        } else {
            let comp = (entry.base_tickets as f32 * (1.0 / fraction_used - 1.0)) as u32;
            entry.compensation = comp;
            entry.current_tickets = entry.base_tickets + comp;
            self.compensation_given += comp;
        }
        self.total_tickets += entry.current_tickets;
    }

    /// Globally enable or disable compensation. Disabling strips every
    /// standing compensation ticket.
    pub fn set_compensation_enabled(&mut self, enabled: bool) {
        self.compensation_enabled = enabled;
        if enabled {
            return;
        }
        let mut cur = self.head;
        while let Some(idx) = cur {
            let next = match self.pool.get_mut(idx) {
                Some(entry) => {
                    self.total_tickets -= entry.compensation;
                    entry.compensation = 0;
                    entry.current_tickets = entry.base_tickets;
                    entry.next
                }
                None => None,
            };
            cur = next;
        }
    }

    /// Convert a process-local ticket amount into global currency by the
    /// holder's current share of the pool.
    pub fn local_to_global(&self, pid: Pid, local_tickets: u32) -> u32 {
        let entry = match self.find(pid).and_then(|i| self.pool.get(i)) {
            Some(e) => e,
            None => return local_tickets,
        };
        if self.total_tickets == 0 {
            return local_tickets;
        }
        let share = entry.current_tickets as f64 / self.total_tickets as f64;
        (local_tickets as f64 * share) as u32
    }

    /// Scale every base ticket count by `factor`, clamping each result,
    /// then recompute the cached totals from scratch.
    pub fn inflate(&mut self, factor: f32) {
        if factor <= 0.0 {
            return;
        }

        let mut cur = self.head;
        while let Some(idx) = cur {
            let next = match self.pool.get_mut(idx) {
                Some(entry) => {
                    let scaled = (entry.base_tickets as f32 * factor) as u32;
                    entry.base_tickets = scaled.clamp(LOTTERY_MIN_TICKETS, LOTTERY_MAX_TICKETS);
                    entry.current_tickets = entry.base_tickets + entry.compensation;
                    entry.next
                }
                None => None,
            };
            cur = next;
        }

        self.recalculate_totals();
    }

    fn recalculate_totals(&mut self) {
        let mut total = 0u32;
        let mut count = 0u32;
        let mut cur = self.head;
        while let Some(idx) = cur {
            match self.pool.get(idx) {
                Some(e) => {
                    total += e.current_tickets;
                    count += 1;
                    cur = e.next;
                }
                None => break,
            }
        }
        self.total_tickets = total;
        self.participant_count = count;
    }

    /// Jain's fairness index over the ratios of observed win rate to
    /// expected ticket share. 1.0 when there is nothing to compare.
    pub fn fairness_index(&self) -> f64 {
        if self.participant_count < 2 || self.total_lotteries == 0 {
            return 1.0;
        }

        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;

        let mut cur = self.head;
        while let Some(idx) = cur {
            let entry = match self.pool.get(idx) {
                Some(e) => e,
                None => break,
            };
            let expected = entry.current_tickets as f64 / self.total_tickets as f64;
            let actual = entry.wins as f64 / self.total_lotteries as f64;
            let ratio = if expected > 0.0 { actual / expected } else { 0.0 };
            sum += ratio;
            sum_sq += ratio * ratio;
            cur = entry.next;
        }

        if sum_sq == 0.0 {
            return 1.0;
        }
        (sum * sum) / (self.participant_count as f64 * sum_sq)
    }

    pub fn total_tickets(&self) -> u32 {
        self.total_tickets
    }

    pub fn participant_count(&self) -> u32 {
        self.participant_count
    }

    pub fn wins(&self, pid: Pid) -> Option<u64> {
        self.find(pid).and_then(|i| self.pool.get(i)).map(|e| e.wins)
    }
}

impl Default for LotteryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedPolicy for LotteryPolicy {
    fn name(&self) -> &'static str {
        "lottery"
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::Lottery
    }

    fn caps(&self) -> PolicyCaps {
        PolicyCaps::SCHEDULE
            | PolicyCaps::YIELD
            | PolicyCaps::PREEMPT
            | PolicyCaps::ENQUEUE
            | PolicyCaps::DEQUEUE
            | PolicyCaps::TICK
            | PolicyCaps::STATS
    }

    fn shutdown(&mut self, _ctx: &mut dyn KernelCtx) {
        self.pool.clear();
        self.head = None;
        self.total_tickets = 0;
        self.participant_count = 0;
        self.current = None;
        self.time_remaining = 0;
    }

    fn schedule(&mut self, ctx: &mut dyn KernelCtx) -> bool {
        // Run-to-quantum: an incumbent with slice left is not preempted.
        if let Some(curr) = self.current {
            if self.time_remaining > 0 && self.find(curr).is_some() {
                return false;
            }
        }

        let winner = match self.draw() {
            Some(pid) => pid,
            None => return false,
        };

        if self.current == Some(winner) {
            self.time_remaining = self.quantum;
            return false;
        }

        let old = ctx.current();
        self.current = Some(winner);
        self.time_remaining = self.quantum;

        if old == Some(winner) {
            return false;
        }
        if let Some(old_pid) = old {
            if ctx.proc_state(old_pid) == ProcState::Running {
                ctx.set_proc_state(old_pid, ProcState::Ready);
            }
        }
        ctx.set_proc_state(winner, ProcState::Running);
        ctx.context_switch(old, winner);
        true
    }

    fn yield_cpu(&mut self, ctx: &mut dyn KernelCtx) {
        if let Some(curr) = self.current {
            if self.compensation_enabled {
                let fraction = 1.0 - self.time_remaining as f32 / self.quantum as f32;
                self.compensate(curr, fraction);
            }
        }
        self.time_remaining = 0;
        self.schedule(ctx);
    }

    fn preempt(&mut self, ctx: &mut dyn KernelCtx) {
        self.time_remaining = 0;
        self.schedule(ctx);
    }

    fn enqueue(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        if !pid.is_valid() || self.find(pid).is_some() {
            return;
        }

        let head = self.head;
        let idx = match self.pool.alloc(LotteryEntry {
            pid,
            base_tickets: LOTTERY_DEFAULT_TICKETS,
            current_tickets: LOTTERY_DEFAULT_TICKETS,
            compensation: 0,
            wins: 0,
            cumulative_tickets: 0,
            next: head,
        }) {
            Some(idx) => idx,
            None => return,
        };

        self.head = Some(idx);
        self.total_tickets += LOTTERY_DEFAULT_TICKETS;
        self.participant_count += 1;
    }

    fn dequeue(&mut self, _ctx: &mut dyn KernelCtx, pid: Pid) {
        let mut prev: Option<usize> = None;
        let mut cur = self.head;
        while let Some(idx) = cur {
            let (epid, tickets, next) = match self.pool.get(idx) {
                Some(e) => (e.pid, e.current_tickets, e.next),
                None => return,
            };
            if epid == pid {
                match prev {
                    None => self.head = next,
                    Some(p) => {
                        if let Some(pe) = self.pool.get_mut(p) {
                            pe.next = next;
                        }
                    }
                }
                self.total_tickets -= tickets;
                self.participant_count -= 1;
                self.pool.free(idx);

                if self.current == Some(pid) {
                    self.current = None;
                    self.time_remaining = 0;
                }
                return;
            }
            prev = Some(idx);
            cur = next;
        }
    }

    fn tracks(&self, pid: Pid) -> bool {
        self.find(pid).is_some()
    }

    fn tick(&mut self, _ctx: &mut dyn KernelCtx) -> bool {
        if self.time_remaining > 0 {
            self.time_remaining -= 1;

            // Track ticket-ticks held while on the CPU.
            if let Some(curr) = self.current {
                if let Some(idx) = self.find(curr) {
                    if let Some(entry) = self.pool.get_mut(idx) {
                        entry.cumulative_tickets += entry.current_tickets as u64;
                    }
                }
            }
        }

        self.time_remaining == 0
    }

    fn stats_snapshot(&self) -> PolicyStats {
        PolicyStats::Lottery(LotteryStats {
            total_lotteries: self.total_lotteries,
            total_tickets: self.total_tickets,
            participant_count: self.participant_count,
            tickets_transferred: self.tickets_transferred,
            compensation_given: self.compensation_given,
            fairness_index: self.fairness_index(),
        })
    }

    fn reset_stats(&mut self) {
        self.total_lotteries = 0;
        self.tickets_transferred = 0;
        self.compensation_given = 0;

        let mut cur = self.head;
        while let Some(idx) = cur {
            let next = match self.pool.get_mut(idx) {
                Some(entry) => {
                    entry.wins = 0;
                    entry.cumulative_tickets = 0;
                    entry.next
                }
                None => None,
            };
            cur = next;
        }
    }

    fn print_stats(&self) {
        log::info!("=== Lottery Statistics ===");
        log::info!("lotteries held: {}", self.total_lotteries);
        log::info!("tickets in pool: {}", self.total_tickets);
        log::info!("participants: {}", self.participant_count);
        log::info!("tickets transferred: {}", self.tickets_transferred);
        log::info!("compensation given: {}", self.compensation_given);
        log::info!(
            "compensation: {}",
            if self.compensation_enabled { "enabled" } else { "disabled" }
        );
        log::info!("fairness index: {:.4}", self.fairness_index());

        let mut cur = self.head;
        while let Some(idx) = cur {
            match self.pool.get(idx) {
                Some(e) => {
                    let expected = if self.total_tickets > 0 {
                        e.current_tickets as f64 / self.total_tickets as f64 * 100.0
                    } else {
                        0.0
                    };
                    let actual = if self.total_lotteries > 0 {
                        e.wins as f64 / self.total_lotteries as f64 * 100.0
                    } else {
                        0.0
                    };
                    log::info!(
                        "pid {}: {} tickets ({} base + {} comp), {} wins, expected {:.1}%, actual {:.1}%",
                        e.pid,
                        e.current_tickets,
                        e.base_tickets,
                        e.compensation,
                        e.wins,
                        expected,
                        actual
                    );
                    cur = e.next;
                }
                None => break,
            }
        }
    }

    fn validate(&self, _ctx: &dyn KernelCtx) -> bool {
        let mut valid = true;
        let mut counted_tickets = 0u32;
        let mut counted_participants = 0u32;

        let mut cur = self.head;
        while let Some(idx) = cur {
            let entry = match self.pool.get(idx) {
                Some(e) => e,
                None => {
                    log::warn!("lottery: dangling index {}", idx);
                    return false;
                }
            };
            counted_tickets += entry.current_tickets;
            counted_participants += 1;

            if entry.base_tickets < LOTTERY_MIN_TICKETS
                || entry.base_tickets > LOTTERY_MAX_TICKETS
            {
                log::warn!(
                    "lottery: pid {} has invalid base tickets {}",
                    entry.pid,
                    entry.base_tickets
                );
                valid = false;
            }
            if entry.current_tickets != entry.base_tickets + entry.compensation {
                log::warn!(
                    "lottery: pid {} inconsistent tickets (current={}, base={}, comp={})",
                    entry.pid,
                    entry.current_tickets,
                    entry.base_tickets,
                    entry.compensation
                );
                valid = false;
            }
            cur = entry.next;

            if counted_participants as usize > NPROC {
                log::warn!("lottery: pool corrupted (too many entries)");
                return false;
            }
        }

        if counted_tickets != self.total_tickets {
            log::warn!(
                "lottery: ticket cache mismatch (counted={}, stored={})",
                counted_tickets,
                self.total_tickets
            );
            valid = false;
        }
        if counted_participants != self.participant_count {
            log::warn!(
                "lottery: participant cache mismatch (counted={}, stored={})",
                counted_participants,
                self.participant_count
            );
            valid = false;
        }
        valid
    }

    fn dump(&self, _ctx: &dyn KernelCtx) {
        log::info!("=== Lottery Pool ===");
        log::info!(
            "total tickets: {}, participants: {}",
            self.total_tickets,
            self.participant_count
        );

        let mut running = 0u32;
        let mut cur = self.head;
        while let Some(idx) = cur {
            match self.pool.get(idx) {
                Some(e) => {
                    running += e.current_tickets;
                    let percent = if self.total_tickets > 0 {
                        e.current_tickets as f64 / self.total_tickets as f64 * 100.0
                    } else {
                        0.0
                    };
                    log::info!(
                        "pid {}: {} tickets ({:.2}%), range [{}-{}], held {} ticket-ticks",
                        e.pid,
                        e.current_tickets,
                        percent,
                        running - e.current_tickets,
                        running.saturating_sub(1),
                        e.cumulative_tickets
                    );
                    cur = e.next;
                }
                None => break,
            }
        }

        if let Some(curr) = self.current {
            log::info!("running: pid {}, quantum remaining {}", curr, self.time_remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimKernel;

    fn setup(pids: &[usize]) -> (LotteryPolicy, SimKernel) {
        let mut sim = SimKernel::new();
        let mut lottery = LotteryPolicy::new();
        for &p in pids {
            sim.spawn(Pid(p), 50);
            lottery.enqueue(&mut sim, Pid(p));
        }
        (lottery, sim)
    }

    #[test]
    fn generator_matches_reference_sequence() {
        let mut lottery = LotteryPolicy::new();
        lottery.set_seed(1);
        assert_eq!(lottery.rng_next(), 16838);
        assert_eq!(lottery.rng_next(), 5758);
        assert_eq!(lottery.rng_next(), 10113);
    }

    #[test]
    fn totals_track_membership() {
        let (mut lottery, mut sim) = setup(&[1, 2, 3]);
        assert_eq!(lottery.total_tickets(), 300);
        assert_eq!(lottery.participant_count(), 3);

        lottery.dequeue(&mut sim, Pid(2));
        assert_eq!(lottery.total_tickets(), 200);
        assert_eq!(lottery.participant_count(), 2);
        assert!(lottery.validate(&sim));
    }

    #[test]
    fn set_tickets_clamps_and_returns_old() {
        let (mut lottery, sim) = setup(&[1]);
        assert_eq!(lottery.set_tickets(Pid(1), 50_000), Some(100));
        assert_eq!(lottery.get_tickets(Pid(1)), Some(LOTTERY_MAX_TICKETS));
        assert_eq!(lottery.set_tickets(Pid(1), 0), Some(LOTTERY_MAX_TICKETS));
        assert_eq!(lottery.get_tickets(Pid(1)), Some(LOTTERY_MIN_TICKETS));
        assert!(lottery.validate(&sim));
    }

    #[test]
    fn transfer_clamps_both_endpoints() {
        let (mut lottery, sim) = setup(&[1, 2]);
        lottery.set_tickets(Pid(1), 100);
        lottery.set_tickets(Pid(2), 9_950);

        // Donor can spare 99; recipient only has room for 50.
        let moved = lottery.transfer(Pid(1), Pid(2), 500);
        assert_eq!(moved, 50);
        assert_eq!(lottery.get_tickets(Pid(1)), Some(50));
        assert_eq!(lottery.get_tickets(Pid(2)), Some(LOTTERY_MAX_TICKETS));
        assert!(lottery.validate(&sim));
    }

    #[test]
    fn transfer_to_stranger_moves_nothing() {
        let (mut lottery, _sim) = setup(&[1]);
        assert_eq!(lottery.transfer(Pid(1), Pid(9), 10), 0);
        assert_eq!(lottery.get_tickets(Pid(1)), Some(100));
    }

    #[test]
    fn half_quantum_yield_doubles_tickets() {
        let (mut lottery, sim) = setup(&[1]);
        lottery.compensate(Pid(1), 0.5);
        // base * (1/0.5 - 1) == base
        assert_eq!(lottery.get_tickets(Pid(1)), Some(200));
        assert!(lottery.validate(&sim));

        lottery.compensate(Pid(1), 1.0);
        assert_eq!(lottery.get_tickets(Pid(1)), Some(100));
        assert!(lottery.validate(&sim));
    }

    #[test]
    fn disabling_compensation_strips_it() {
        let (mut lottery, sim) = setup(&[1, 2]);
        lottery.compensate(Pid(1), 0.25);
        assert_eq!(lottery.get_tickets(Pid(1)), Some(400));
        lottery.set_compensation_enabled(false);
        assert_eq!(lottery.get_tickets(Pid(1)), Some(100));
        assert_eq!(lottery.total_tickets(), 200);
        assert!(lottery.validate(&sim));
    }

    #[test]
    fn inflation_scales_and_recounts() {
        let (mut lottery, sim) = setup(&[1, 2]);
        lottery.set_tickets(Pid(1), 100);
        lottery.set_tickets(Pid(2), 300);
        lottery.inflate(2.0);
        assert_eq!(lottery.get_tickets(Pid(1)), Some(200));
        assert_eq!(lottery.get_tickets(Pid(2)), Some(600));
        assert_eq!(lottery.total_tickets(), 800);
        assert!(lottery.validate(&sim));

        lottery.inflate(-1.0);
        assert_eq!(lottery.total_tickets(), 800);
    }

    #[test]
    fn draw_is_proportional_over_many_rounds() {
        let (mut lottery, _sim) = setup(&[2, 1]);
        lottery.set_seed(1);
        lottery.set_tickets(Pid(1), 100);
        lottery.set_tickets(Pid(2), 300);

        for _ in 0..1000 {
            lottery.draw();
        }
        let wins2 = lottery.wins(Pid(2)).unwrap();
        assert!(wins2 > 650 && wins2 < 850, "wins2 = {}", wins2);
        assert!(lottery.fairness_index() > 0.9);
    }

    #[test]
    fn run_to_quantum_blocks_preemption() {
        let (mut lottery, mut sim) = setup(&[1, 2]);
        lottery.set_seed(1);
        assert!(lottery.schedule(&mut sim));
        let first = sim.current().unwrap();

        // Slice untouched: repeated schedule calls must not switch.
        for _ in 0..5 {
            assert!(!lottery.schedule(&mut sim));
        }
        assert_eq!(sim.current(), Some(first));
    }

    #[test]
    fn quantum_exhaustion_requests_new_lottery() {
        let (mut lottery, mut sim) = setup(&[1, 2]);
        lottery.set_seed(7);
        lottery.schedule(&mut sim);
        let mut need = false;
        for _ in 0..DEFAULT_QUANTUM {
            need = lottery.tick(&mut sim);
        }
        assert!(need);
    }

    #[test]
    fn local_to_global_scales_by_share() {
        let (mut lottery, _sim) = setup(&[1, 2]);
        lottery.set_tickets(Pid(1), 100);
        lottery.set_tickets(Pid(2), 300);
        // pid 1 holds a quarter of the pool.
        assert_eq!(lottery.local_to_global(Pid(1), 400), 100);
        assert_eq!(lottery.local_to_global(Pid(9), 400), 400);
    }
}
