/// Time-of-day arrival schedule and profile sampling.
pub mod arrivals;
/// Simulation clock for tick management.
pub mod clock;
pub mod kpi;
/// Charging physics.
pub mod physics;
pub mod policy;
/// Congestion pricing.
pub mod pricing;
pub mod station;
pub mod types;
