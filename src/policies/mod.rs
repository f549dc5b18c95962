/*
 * Scheduling Policies
 *
 * The closed set of interchangeable policies. Each one implements the
 * SchedPolicy capability record; make_policy maps a PolicyKind to a fresh
 * instance for SchedCore to own.
 */

pub mod cfs;
pub mod lottery;
pub mod mlfq;
pub mod priority;
pub mod realtime;
pub mod round_robin;

pub use cfs::CfsPolicy;
pub use lottery::LotteryPolicy;
pub use mlfq::MlfqPolicy;
pub use priority::PriorityPolicy;
pub use realtime::{RealtimePolicy, RtTaskParams};
pub use round_robin::RoundRobinPolicy;

use alloc::boxed::Box;

use crate::traits::SchedPolicy;
use crate::types::PolicyKind;

/// Build a freshly initialized policy of the given kind.
pub fn make_policy(kind: PolicyKind) -> Box<dyn SchedPolicy> {
    match kind {
        PolicyKind::RoundRobin => Box::new(RoundRobinPolicy::new()),
        PolicyKind::Priority => Box::new(PriorityPolicy::new()),
        PolicyKind::Mlfq => Box::new(MlfqPolicy::new()),
        PolicyKind::Lottery => Box::new(LotteryPolicy::new()),
        PolicyKind::Cfs => Box::new(CfsPolicy::new()),
        PolicyKind::Realtime => Box::new(RealtimePolicy::new()),
    }
}
