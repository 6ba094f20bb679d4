use crate::sim::types::{AgentId, AgentStatus, AgentView};

use super::profile::Profile;

/// State of charge (%) at which a truck leaves satisfied.
pub const TARGET_SOC: f64 = 85.0;

/// Ticks of waiting between panic re-bids.
pub const PANIC_INTERVAL_TICKS: u32 = 30;

/// Assumed service minutes ahead of a newcomer, per queued truck.
const SERVICE_MINUTES_PER_QUEUED: f64 = 15.0;

/// Floor on the self-estimated wait so an empty queue still yields a bid.
const MIN_WAIT_ESTIMATE_HOURS: f64 = 0.1;

/// One truck competing for a charger.
///
/// Agents are plain values owned by the station and addressed by `id`.
/// They never reference the station; every mutation is applied by the
/// station's tick pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub profile: Profile,
    /// Sampled value of time ($/hour).
    pub value_of_time: f64,
    /// Current bid ($). Never decreases.
    pub bid: f64,
    /// State of charge (%).
    pub soc: f64,
    pub target_soc: f64,
    /// Ticks spent queuing. Frozen once the agent starts charging.
    pub wait_time: u32,
    pub status: AgentStatus,
    pub arrival_tick: usize,
}

/// Result of one queuing tick, computed without mutating the agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueStep {
    pub wait_time: u32,
    pub bid: f64,
    /// Wait exceeded effective patience; the agent leaves this tick.
    pub impatient: bool,
}

impl Agent {
    /// Creates a queuing agent.
    pub fn new(
        id: AgentId,
        profile: Profile,
        value_of_time: f64,
        bid: f64,
        soc: f64,
        arrival_tick: usize,
    ) -> Self {
        Self {
            id,
            profile,
            value_of_time,
            bid,
            soc,
            target_soc: TARGET_SOC,
            wait_time: 0,
            status: AgentStatus::Queuing,
            arrival_tick,
        }
    }

    /// Advances the wait counter, applies panic escalation, and checks patience.
    pub fn queue_step(&self) -> QueueStep {
        let wait_time = self.wait_time + 1;
        let params = self.profile.params();

        let mut bid = self.bid;
        if params.bid_aggressiveness > 0.0 && wait_time % PANIC_INTERVAL_TICKS == 0 {
            bid = round_cents(bid + self.value_of_time * params.bid_aggressiveness);
        }

        QueueStep {
            wait_time,
            bid,
            impatient: f64::from(wait_time) > self.profile.effective_patience(),
        }
    }

    pub fn is_charged(&self) -> bool {
        self.soc >= self.target_soc
    }

    pub fn view(&self) -> AgentView {
        AgentView {
            id: self.id,
            profile: self.profile,
            bid: self.bid,
            status: self.status,
            soc: self.soc,
            wait_time: self.wait_time,
        }
    }
}

/// Expected wait (hours) a newcomer infers from the queue it sees.
pub fn estimated_wait_hours(queue_len: usize) -> f64 {
    (queue_len as f64 * SERVICE_MINUTES_PER_QUEUED / 60.0).max(MIN_WAIT_ESTIMATE_HOURS)
}

/// Opening bid: entry fee plus the expected opportunity cost of waiting,
/// scaled by the agent's self-estimation `noise`.
pub fn initial_bid(base_service_fee: f64, value_of_time: f64, queue_len: usize, noise: f64) -> f64 {
    round_cents(base_service_fee + value_of_time * estimated_wait_hours(queue_len) * noise)
}

fn round_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(profile: Profile) -> Agent {
        Agent::new(1, profile, 200.0, 50.0, 20.0, 0)
    }

    #[test]
    fn empty_queue_uses_wait_floor() {
        assert_eq!(estimated_wait_hours(0), 0.1);
        assert_eq!(estimated_wait_hours(4), 1.0);
    }

    #[test]
    fn initial_bid_reflects_queue() {
        // 10 + 40 * 0.5h * 1.0
        assert_eq!(initial_bid(10.0, 40.0, 2, 1.0), 30.0);
        // empty queue: 10 + 40 * 0.1 * 1.1
        assert!((initial_bid(10.0, 40.0, 0, 1.1) - 14.4).abs() < 1e-9);
    }

    #[test]
    fn critical_panics_every_thirty_ticks() {
        let mut a = agent(Profile::Critical);
        a.wait_time = 29;
        let step = a.queue_step();
        assert_eq!(step.wait_time, 30);
        assert_eq!(step.bid, 100.0);

        a.wait_time = 30;
        assert_eq!(a.queue_step().bid, 50.0);
    }

    #[test]
    fn non_critical_bids_stay_flat() {
        for p in [Profile::Standard, Profile::Economy] {
            let mut a = agent(p);
            a.wait_time = 29;
            assert_eq!(a.queue_step().bid, 50.0, "{p}");
        }
    }

    #[test]
    fn impatience_triggers_just_past_limit() {
        let mut a = agent(Profile::Economy);
        let limit = Profile::Economy.effective_patience();
        a.wait_time = limit.floor() as u32 - 1;
        assert!(!a.queue_step().impatient);
        a.wait_time = limit.floor() as u32;
        let step = a.queue_step();
        assert!(step.impatient);
        assert!(f64::from(step.wait_time) <= limit + 1.0);
    }

    #[test]
    fn new_agent_targets_85() {
        let a = agent(Profile::Standard);
        assert_eq!(a.target_soc, 85.0);
        assert_eq!(a.status, AgentStatus::Queuing);
        assert!(!a.is_charged());
    }
}
