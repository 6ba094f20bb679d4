//! Truck charging station simulator comparing FIFO admission with a
//! bid-based preemptive auction (SIRQ).

/// Economic agents: profile table and per-truck state.
pub mod agents;
pub mod batch;
pub mod config;
pub mod error;
/// Table export and experiment bundles.
pub mod io;
pub mod reporting;
/// Simulation engine: clock, arrivals, pricing, admission, physics.
pub mod sim;

pub use error::{ConfigError, ImportError, RunFault, SimError};
pub use sim::station::Station;
pub use sim::types::PolicyKind;
