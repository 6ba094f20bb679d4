//! Core simulation types: policy tags, agent status, and the two output tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::agents::Profile;
use crate::error::ConfigError;

/// Stable agent identifier. Assigned in arrival order, never reused.
pub type AgentId = u64;

/// Admission policy tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyKind {
    /// Strict arrival order, no preemption.
    Fifo,
    /// Sealed-bid auction with premium-gated preemption.
    Sirq,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 2] = [PolicyKind::Fifo, PolicyKind::Sirq];

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Fifo => "FIFO",
            PolicyKind::Sirq => "SIRQ",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIFO" => Ok(PolicyKind::Fifo),
            "SIRQ" => Ok(PolicyKind::Sirq),
            _ => Err(ConfigError::new(
                "run.policy",
                format!("must be \"FIFO\" or \"SIRQ\", got \"{s}\""),
            )),
        }
    }
}

/// Lifecycle state of an agent still held by the station. Departed agents
/// leave the arena and survive only as a [`DepartureRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Queuing,
    Charging,
}

/// Why an agent left the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepartureReason {
    Completed,
    Preempted,
    LeftImpatient,
}

impl fmt::Display for DepartureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepartureReason::Completed => "Completed",
            DepartureReason::Preempted => "Preempted",
            DepartureReason::LeftImpatient => "LeftImpatient",
        };
        f.write_str(s)
    }
}

/// Terminal record appended when an agent departs.
///
/// Field order is the column order of the exported departure table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartureRecord {
    pub id: AgentId,
    pub profile: Profile,
    /// Value of time ($/hour).
    pub value_of_time: f64,
    /// Bid at the moment of departure ($).
    pub bid: f64,
    pub outcome: DepartureReason,
    /// Ticks spent queuing.
    pub wait_time: u32,
    pub strategy: PolicyKind,
}

/// Station state recorded at the end of every tick.
///
/// Field order is the column order of the exported timeline table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub tick: usize,
    pub active_chargers: usize,
    pub queue_length: usize,
    /// Cumulative revenue ($).
    pub cumulative_revenue: f64,
    /// Clearing price used during this tick ($/kWh).
    pub clearing_price: f64,
    /// Cumulative balked arrivals.
    pub balked_count: u64,
    pub strategy: PolicyKind,
}

/// Read-only view of one live agent, for visualization consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentView {
    pub id: AgentId,
    pub profile: Profile,
    pub bid: f64,
    pub status: AgentStatus,
    pub soc: f64,
    pub wait_time: u32,
}

impl fmt::Display for TickSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>4} [{}] | charging={:>2} queue={:>3} | price={:.3} $/kWh  revenue={:>9.2} $  balked={}",
            self.tick,
            self.strategy,
            self.active_chargers,
            self.queue_length,
            self.clearing_price,
            self.cumulative_revenue,
            self.balked_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("fifo".parse::<PolicyKind>(), Ok(PolicyKind::Fifo));
        assert_eq!(" SIRQ ".parse::<PolicyKind>(), Ok(PolicyKind::Sirq));
    }

    #[test]
    fn unknown_policy_is_config_error() {
        let err = "lottery".parse::<PolicyKind>().unwrap_err();
        assert_eq!(err.field, "run.policy");
        assert!(err.message.contains("lottery"));
    }

    #[test]
    fn snapshot_display_does_not_panic() {
        let s = TickSnapshot {
            tick: 12,
            active_chargers: 4,
            queue_length: 3,
            cumulative_revenue: 120.5,
            clearing_price: 0.75,
            balked_count: 1,
            strategy: PolicyKind::Sirq,
        };
        assert!(format!("{s}").contains("SIRQ"));
    }
}
