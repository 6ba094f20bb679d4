//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use sirq_sim::config::StationConfig;
use sirq_sim::sim::types::{AgentId, AgentStatus};
use sirq_sim::{PolicyKind, Station};

/// Station config with random arrivals switched off, so tests control
/// every agent through `Station::enqueue`.
pub fn quiet_config() -> StationConfig {
    StationConfig {
        traffic_multiplier: 0.0,
        ..StationConfig::default()
    }
}

/// Quiet single-charger station.
pub fn single_charger(policy: PolicyKind) -> Station {
    Station::new(1, policy, 42, quiet_config()).expect("quiet config is valid")
}

/// Default-config station with live random arrivals.
pub fn busy_station(capacity: usize, policy: PolicyKind, seed: u64) -> Station {
    let config = StationConfig {
        traffic_multiplier: 2.0,
        ..StationConfig::default()
    };
    Station::new(capacity, policy, seed, config).expect("default config is valid")
}

pub fn status_of(station: &Station, id: AgentId) -> Option<AgentStatus> {
    station.agent(id).map(|a| a.status)
}
