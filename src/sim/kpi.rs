//! Post-hoc KPI computation from a run's output tables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agents::Profile;

use super::station::Station;
use super::types::{DepartureReason, DepartureRecord, PolicyKind, TickSnapshot};

/// Aggregate key performance indicators of one run.
///
/// Computed from the departure and timeline tables so that KPIs of an
/// imported bundle match those of the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunKpis {
    pub strategy: Option<PolicyKind>,
    /// Final cumulative revenue ($).
    pub revenue: f64,
    /// Energy delivered (kWh). Only known when computed from a live station.
    #[serde(default)]
    pub energy_sold_kwh: Option<f64>,
    pub completed: usize,
    pub preempted: usize,
    pub left_impatient: usize,
    /// Impatient or preempted Critical trucks.
    pub critical_failures: usize,
    /// Final cumulative balked count.
    pub balked: u64,
    /// Mean ticks queued by departed Critical trucks (0 if none).
    pub avg_wait_critical: f64,
    pub avg_wait_standard: f64,
    pub avg_wait_economy: f64,
    pub peak_queue_length: usize,
    /// Mean clearing price over the run ($/kWh).
    pub avg_clearing_price: f64,
}

impl RunKpis {
    /// Computes all KPIs from the two output tables.
    pub fn from_tables(departures: &[DepartureRecord], timeline: &[TickSnapshot]) -> Self {
        let count = |reason: DepartureReason| departures.iter().filter(|d| d.outcome == reason).count();
        let critical_failures = departures
            .iter()
            .filter(|d| {
                d.profile.is_protected()
                    && matches!(
                        d.outcome,
                        DepartureReason::Preempted | DepartureReason::LeftImpatient
                    )
            })
            .count();

        let last = timeline.last();
        let avg_clearing_price = if timeline.is_empty() {
            0.0
        } else {
            timeline.iter().map(|t| t.clearing_price).sum::<f64>() / timeline.len() as f64
        };

        Self {
            strategy: last
                .map(|t| t.strategy)
                .or_else(|| departures.first().map(|d| d.strategy)),
            revenue: last.map_or(0.0, |t| t.cumulative_revenue),
            energy_sold_kwh: None,
            completed: count(DepartureReason::Completed),
            preempted: count(DepartureReason::Preempted),
            left_impatient: count(DepartureReason::LeftImpatient),
            critical_failures,
            balked: last.map_or(0, |t| t.balked_count),
            avg_wait_critical: mean_wait(departures, Profile::Critical),
            avg_wait_standard: mean_wait(departures, Profile::Standard),
            avg_wait_economy: mean_wait(departures, Profile::Economy),
            peak_queue_length: timeline.iter().map(|t| t.queue_length).max().unwrap_or(0),
            avg_clearing_price,
        }
    }

    pub fn from_station(station: &Station) -> Self {
        Self {
            energy_sold_kwh: Some(station.energy_sold_kwh()),
            ..Self::from_tables(station.departures(), station.timeline())
        }
    }

    /// Wait gap between Economy and Critical trucks; positive when Economy waits longer.
    pub fn equity_gap(&self) -> f64 {
        self.avg_wait_economy - self.avg_wait_critical
    }
}

fn mean_wait(departures: &[DepartureRecord], profile: Profile) -> f64 {
    let (sum, n) = departures
        .iter()
        .filter(|d| d.profile == profile)
        .fold((0u64, 0usize), |(s, n), d| (s + u64::from(d.wait_time), n + 1));
    if n == 0 { 0.0 } else { sum as f64 / n as f64 }
}

impl fmt::Display for RunKpis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = self.strategy.map_or("-", PolicyKind::as_str);
        writeln!(f, "--- KPI Report ({strategy}) ---")?;
        writeln!(f, "Revenue:               {:.2} $", self.revenue)?;
        if let Some(energy) = self.energy_sold_kwh {
            writeln!(f, "Energy sold:           {energy:.1} kWh")?;
        }
        writeln!(f, "Completed sessions:    {}", self.completed)?;
        writeln!(f, "Preemptions:           {}", self.preempted)?;
        writeln!(f, "Left impatient:        {}", self.left_impatient)?;
        writeln!(f, "Critical failures:     {}", self.critical_failures)?;
        writeln!(f, "Balked arrivals:       {}", self.balked)?;
        writeln!(
            f,
            "Avg wait (C/S/E):      {:.1} / {:.1} / {:.1} min",
            self.avg_wait_critical, self.avg_wait_standard, self.avg_wait_economy
        )?;
        writeln!(f, "Peak queue length:     {}", self.peak_queue_length)?;
        write!(f, "Avg clearing price:    {:.3} $/kWh", self.avg_clearing_price)
    }
}
