//! Admission policies: FIFO baseline and the SIRQ preemptive auction.
//!
//! Policies only plan. They see an immutable snapshot of the queue and the
//! chargers and return an [`AdmissionPlan`]; the station applies it.

use std::cmp::Ordering;

use crate::agents::Profile;

use super::types::{AgentId, PolicyKind};

/// Snapshot of one agent as seen by a policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub id: AgentId,
    pub bid: f64,
    pub profile: Profile,
}

/// One eviction: `victim` leaves and `challenger` takes its charger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preemption {
    pub victim: AgentId,
    pub challenger: AgentId,
}

/// Decisions for one tick, in the order they are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionPlan {
    /// Queued agents promoted into free chargers.
    pub promote: Vec<AgentId>,
    /// At most one eviction per tick.
    pub preemption: Option<Preemption>,
}

/// Decides which queued agents start charging this tick.
pub trait AdmissionPolicy {
    /// Plans admissions given the queue, the agents charging at tick start,
    /// and the number of free chargers.
    fn plan(&self, queue: &[Candidate], charging: &[Candidate], free_slots: usize)
    -> AdmissionPlan;
}

/// Strict arrival order. Never preempts.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fifo;

impl AdmissionPolicy for Fifo {
    fn plan(&self, queue: &[Candidate], _charging: &[Candidate], free_slots: usize) -> AdmissionPlan {
        let mut order: Vec<&Candidate> = queue.iter().collect();
        order.sort_by_key(|c| c.id);
        AdmissionPlan {
            promote: order.iter().take(free_slots).map(|c| c.id).collect(),
            preemption: None,
        }
    }
}

/// Highest bid first, with premium-gated eviction of the lowest bidder.
#[derive(Debug, Clone, Copy)]
pub struct Sirq {
    /// A challenger must bid strictly more than `victim.bid * premium`.
    pub premium: f64,
}

/// Highest bid first; equal bids go to the earlier arrival.
fn by_bid_desc(a: &Candidate, b: &Candidate) -> Ordering {
    b.bid.total_cmp(&a.bid).then(a.id.cmp(&b.id))
}

impl AdmissionPolicy for Sirq {
    fn plan(&self, queue: &[Candidate], charging: &[Candidate], free_slots: usize) -> AdmissionPlan {
        let mut order: Vec<&Candidate> = queue.iter().collect();
        order.sort_by(|a, b| by_bid_desc(a, b));

        let admitted = free_slots.min(order.len());
        let promote: Vec<AgentId> = order[..admitted].iter().map(|c| c.id).collect();

        let preemption = if admitted == free_slots {
            let challenger = order.get(admitted);
            // Lowest bid; among equals the most recent arrival goes first.
            let victim = charging
                .iter()
                .min_by(|a, b| a.bid.total_cmp(&b.bid).then(b.id.cmp(&a.id)));
            match (challenger, victim) {
                (Some(c), Some(v))
                    if c.bid > v.bid * self.premium && !v.profile.is_protected() =>
                {
                    Some(Preemption {
                        victim: v.id,
                        challenger: c.id,
                    })
                }
                _ => None,
            }
        } else {
            None
        };

        AdmissionPlan {
            promote,
            preemption,
        }
    }
}

/// Runtime-selected policy.
#[derive(Debug, Clone, Copy)]
pub enum Admission {
    Fifo(Fifo),
    Sirq(Sirq),
}

impl Admission {
    pub fn new(kind: PolicyKind, preemption_premium: f64) -> Self {
        match kind {
            PolicyKind::Fifo => Admission::Fifo(Fifo),
            PolicyKind::Sirq => Admission::Sirq(Sirq {
                premium: preemption_premium,
            }),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Admission::Fifo(_) => PolicyKind::Fifo,
            Admission::Sirq(_) => PolicyKind::Sirq,
        }
    }
}

impl AdmissionPolicy for Admission {
    fn plan(&self, queue: &[Candidate], charging: &[Candidate], free_slots: usize) -> AdmissionPlan {
        match self {
            Admission::Fifo(p) => p.plan(queue, charging, free_slots),
            Admission::Sirq(p) => p.plan(queue, charging, free_slots),
        }
    }
}
