//! The station aggregate and its fixed per-tick pipeline.

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, trace};

use crate::agents::truck::initial_bid;
use crate::agents::{Agent, Profile, QueueStep};
use crate::config::{ScenarioConfig, StationConfig, TICKS_PER_DAY};
use crate::error::{ConfigError, RunFault};

use super::arrivals::{draw_arrival, sample_profile};
use super::clock::Clock;
use super::physics::{ChargeStep, charge_step};
use super::policy::{Admission, AdmissionPlan, AdmissionPolicy, Candidate};
use super::pricing::PricingEngine;
use super::types::{
    AgentId, AgentStatus, AgentView, DepartureReason, DepartureRecord, PolicyKind, TickSnapshot,
};

/// Initial state-of-charge range (%) of arriving trucks.
const ARRIVAL_SOC_RANGE: std::ops::Range<f64> = 10.0..30.0;

/// Multiplicative noise on an agent's own wait estimate.
const BID_NOISE_RANGE: std::ops::Range<f64> = 0.9..1.1;

/// Outcome of a prospective arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    Joined(AgentId),
    /// Posted price exceeded the profile's tolerance; no agent was created.
    Balked,
}

/// Per-agent transition computed in the first phase of a tick.
enum Advance {
    Charge(ChargeStep),
    Wait(QueueStep),
}

/// One charging station under one admission policy for one run.
///
/// Owns every live agent in an id-ordered arena, the single seeded RNG,
/// the cumulative counters, and the two append-only output tables.
#[derive(Debug, Clone)]
pub struct Station {
    capacity: usize,
    free_slots: usize,
    seed: u64,
    config: StationConfig,
    profile_weights: [(Profile, f64); 3],
    admission: Admission,
    pricing: PricingEngine,
    rng: StdRng,
    clock: Clock,
    /// Tick in progress, or the next tick between steps.
    now: usize,
    /// Live agents (Queuing or Charging), sorted by id.
    agents: Vec<Agent>,
    next_id: AgentId,
    clearing_price: f64,
    revenue: f64,
    energy_sold_kwh: f64,
    preemptions: u64,
    critical_failures: u64,
    balked: u64,
    departures: Vec<DepartureRecord>,
    timeline: Vec<TickSnapshot>,
}

impl Station {
    /// Creates a station that runs for one simulated day.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` if `capacity < 1` or `config` fails validation.
    pub fn new(
        capacity: usize,
        policy: PolicyKind,
        seed: u64,
        config: StationConfig,
    ) -> Result<Self, ConfigError> {
        if capacity < 1 {
            return Err(ConfigError::new("run.capacity", "must be >= 1"));
        }
        if let Some(err) = config.validate().into_iter().next() {
            return Err(err);
        }

        let pricing = PricingEngine::new(&config);
        Ok(Self {
            capacity,
            free_slots: capacity,
            seed,
            profile_weights: config.profile_weights(),
            admission: Admission::new(policy, config.preemption_premium),
            clearing_price: pricing.clearing_price(0, 0, capacity),
            pricing,
            config,
            rng: StdRng::seed_from_u64(seed),
            clock: Clock::day(),
            now: 0,
            agents: Vec::new(),
            next_id: 1,
            revenue: 0.0,
            energy_sold_kwh: 0.0,
            preemptions: 0,
            critical_failures: 0,
            balked: 0,
            departures: Vec::new(),
            timeline: Vec::with_capacity(TICKS_PER_DAY),
        })
    }

    /// Creates a station from a full scenario, honoring `run.ticks`.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` reported by validation.
    pub fn from_scenario(scenario: &ScenarioConfig) -> Result<Self, ConfigError> {
        let policy = scenario.policy()?;
        let station = Self::new(
            scenario.run.capacity,
            policy,
            scenario.run.seed,
            scenario.station.clone(),
        )?;
        Ok(station.with_horizon(scenario.run.ticks))
    }

    /// Overrides the run length in ticks.
    pub fn with_horizon(mut self, ticks: usize) -> Self {
        self.clock = Clock::new(ticks);
        self
    }

    /// Runs every remaining tick of the horizon.
    ///
    /// # Errors
    ///
    /// Returns a `RunFault` if an internal invariant breaks.
    pub fn run(&mut self) -> Result<(), RunFault> {
        while !self.clock.is_finished() {
            self.step()?;
        }
        Ok(())
    }

    /// Ends the run early.
    pub fn stop(&mut self) {
        self.clock.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.clock.is_finished()
    }

    /// Advances exactly one tick: price, arrival, admission, physics and
    /// patience, snapshot.
    ///
    /// # Errors
    ///
    /// Returns a `RunFault` if the horizon was already reached or an
    /// internal invariant breaks.
    pub fn step(&mut self) -> Result<(), RunFault> {
        let Some(tick) = self.clock.tick() else {
            return Err(self.fault("step called after the run horizon"));
        };
        self.now = tick;

        self.clearing_price =
            self.pricing
                .clearing_price(self.charging_count(), self.queue_len(), self.capacity);

        if draw_arrival(&mut self.rng, tick, self.config.traffic_multiplier) {
            let profile = sample_profile(&mut self.rng, &self.profile_weights);
            self.arrive(profile);
        }

        let plan = self.plan_admission();
        self.apply_admission(&plan)?;
        self.advance_agents();
        self.check_slots()?;

        let snapshot = TickSnapshot {
            tick,
            active_chargers: self.charging_count(),
            queue_length: self.queue_len(),
            cumulative_revenue: self.revenue,
            clearing_price: self.clearing_price,
            balked_count: self.balked,
            strategy: self.policy(),
        };
        trace!(%snapshot, "tick");
        self.timeline.push(snapshot);
        self.now = tick + 1;
        Ok(())
    }

    /// Handles a prospective arrival of `profile` at the current price.
    ///
    /// With smart pricing on, a truck whose tolerance is below the clearing
    /// price balks and no agent is created. Otherwise the agent samples its
    /// value of time and state of charge, forms its opening bid, and queues.
    pub fn arrive(&mut self, profile: Profile) -> Arrival {
        let params = profile.params();
        if self.pricing.is_smart() && self.clearing_price > params.price_tolerance {
            self.balked += 1;
            debug!(
                tick = self.now,
                %profile,
                price = self.clearing_price,
                tolerance = params.price_tolerance,
                "arrival balked"
            );
            return Arrival::Balked;
        }

        let (vot_min, vot_max) = params.vot_range;
        let value_of_time = self.rng.random_range(vot_min..vot_max);
        let soc = self.rng.random_range(ARRIVAL_SOC_RANGE);
        let noise = self.rng.random_range(BID_NOISE_RANGE);
        let bid = initial_bid(
            self.config.base_service_fee,
            value_of_time,
            self.queue_len(),
            noise,
        );
        Arrival::Joined(self.enqueue(profile, value_of_time, bid, soc))
    }

    /// Places an agent with fully specified state in the queue, bypassing
    /// sampling and balking. Returns its id.
    pub fn enqueue(&mut self, profile: Profile, value_of_time: f64, bid: f64, soc: f64) -> AgentId {
        let id = self.next_id;
        self.next_id += 1;
        self.agents
            .push(Agent::new(id, profile, value_of_time, bid, soc, self.now));
        id
    }

    fn plan_admission(&self) -> AdmissionPlan {
        let candidates = |status: AgentStatus| -> Vec<Candidate> {
            self.agents
                .iter()
                .filter(|a| a.status == status)
                .map(|a| Candidate {
                    id: a.id,
                    bid: a.bid,
                    profile: a.profile,
                })
                .collect()
        };
        self.admission.plan(
            &candidates(AgentStatus::Queuing),
            &candidates(AgentStatus::Charging),
            self.free_slots,
        )
    }

    fn apply_admission(&mut self, plan: &AdmissionPlan) -> Result<(), RunFault> {
        for &id in &plan.promote {
            self.promote(id)?;
        }

        if let Some(p) = plan.preemption {
            let idx = self
                .index_of(p.victim)
                .ok_or_else(|| self.fault(format!("preemption victim {} not found", p.victim)))?;
            let victim = self.agents.remove(idx);
            self.free_slots += 1;
            self.preemptions += 1;
            if victim.profile.is_protected() {
                self.critical_failures += 1;
            }
            debug!(
                tick = self.now,
                victim = victim.id,
                victim_bid = victim.bid,
                challenger = p.challenger,
                "preempted"
            );
            self.record_departure(&victim, DepartureReason::Preempted);
            self.promote(p.challenger)?;
        }
        Ok(())
    }

    fn promote(&mut self, id: AgentId) -> Result<(), RunFault> {
        let Some(free) = self.free_slots.checked_sub(1) else {
            return Err(self.fault(format!("no free charger to promote agent {id}")));
        };
        let idx = self
            .index_of(id)
            .ok_or_else(|| self.fault(format!("promoted agent {id} not found")))?;
        if self.agents[idx].status != AgentStatus::Queuing {
            return Err(self.fault(format!("promoted agent {id} is not queuing")));
        }
        self.agents[idx].status = AgentStatus::Charging;
        self.free_slots = free;
        Ok(())
    }

    /// Two-phase physics and patience update: every transition is computed
    /// from the pre-update agents, then applied in one pass.
    fn advance_agents(&mut self) {
        let updates: Vec<Advance> = self
            .agents
            .iter()
            .map(|a| match a.status {
                AgentStatus::Charging => Advance::Charge(charge_step(
                    a.soc,
                    self.config.charger_power_kw,
                    self.config.battery_capacity_kwh,
                )),
                _ => Advance::Wait(a.queue_step()),
            })
            .collect();

        let agents = std::mem::take(&mut self.agents);
        let mut survivors = Vec::with_capacity(agents.len());
        for (mut agent, update) in agents.into_iter().zip(updates) {
            match update {
                Advance::Charge(step) => {
                    agent.soc = step.soc;
                    self.energy_sold_kwh += step.energy_kwh;
                    self.revenue += step.energy_kwh * self.clearing_price;
                    if agent.is_charged() {
                        self.free_slots += 1;
                        self.record_departure(&agent, DepartureReason::Completed);
                        continue;
                    }
                }
                Advance::Wait(step) => {
                    agent.wait_time = step.wait_time;
                    agent.bid = step.bid;
                    if step.impatient {
                        if agent.profile.is_protected() {
                            self.critical_failures += 1;
                        }
                        debug!(
                            tick = self.now,
                            id = agent.id,
                            profile = %agent.profile,
                            wait = agent.wait_time,
                            "left impatient"
                        );
                        self.record_departure(&agent, DepartureReason::LeftImpatient);
                        continue;
                    }
                }
            }
            survivors.push(agent);
        }
        self.agents = survivors;
    }

    fn check_slots(&self) -> Result<(), RunFault> {
        let charging = self.charging_count();
        if self.free_slots + charging != self.capacity {
            return Err(self.fault(format!(
                "slot invariant broken: free={} charging={} capacity={}",
                self.free_slots, charging, self.capacity
            )));
        }
        Ok(())
    }

    fn record_departure(&mut self, agent: &Agent, reason: DepartureReason) {
        self.departures.push(DepartureRecord {
            id: agent.id,
            profile: agent.profile,
            value_of_time: agent.value_of_time,
            bid: agent.bid,
            outcome: reason,
            wait_time: agent.wait_time,
            strategy: self.policy(),
        });
    }

    fn index_of(&self, id: AgentId) -> Option<usize> {
        self.agents.binary_search_by_key(&id, |a| a.id).ok()
    }

    fn fault(&self, message: impl Into<String>) -> RunFault {
        RunFault {
            tick: self.now,
            message: message.into(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_slots(&self) -> usize {
        self.free_slots
    }

    pub fn policy(&self) -> PolicyKind {
        self.admission.kind()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    /// Ticks completed so far.
    pub fn ticks_elapsed(&self) -> usize {
        self.clock.elapsed()
    }

    pub fn charging_count(&self) -> usize {
        self.count(AgentStatus::Charging)
    }

    pub fn queue_len(&self) -> usize {
        self.count(AgentStatus::Queuing)
    }

    fn count(&self, status: AgentStatus) -> usize {
        self.agents.iter().filter(|a| a.status == status).count()
    }

    /// Cumulative revenue ($).
    pub fn revenue(&self) -> f64 {
        self.revenue
    }

    /// Cumulative energy sold (kWh).
    pub fn energy_sold_kwh(&self) -> f64 {
        self.energy_sold_kwh
    }

    pub fn preemptions(&self) -> u64 {
        self.preemptions
    }

    pub fn critical_failures(&self) -> u64 {
        self.critical_failures
    }

    pub fn balked(&self) -> u64 {
        self.balked
    }

    /// Clearing price of the current (or last completed) tick ($/kWh).
    pub fn clearing_price(&self) -> f64 {
        self.clearing_price
    }

    /// Live agent by id.
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.index_of(id).map(|i| &self.agents[i])
    }

    /// Read-only view of every live agent, in id order.
    pub fn live_agents(&self) -> Vec<AgentView> {
        self.agents.iter().map(Agent::view).collect()
    }

    pub fn departures(&self) -> &[DepartureRecord] {
        &self.departures
    }

    pub fn timeline(&self) -> &[TickSnapshot] {
        &self.timeline
    }

    /// Consumes the station and returns `(departures, timeline)`.
    pub fn into_tables(self) -> (Vec<DepartureRecord>, Vec<TickSnapshot>) {
        (self.departures, self.timeline)
    }
}
