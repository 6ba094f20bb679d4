//! Truck agents and their economic profiles.

/// Profile enumeration and parameter table.
pub mod profile;
/// Per-truck state, bid formation, and patience.
pub mod truck;

pub use profile::{Profile, ProfileParams};
pub use truck::{Agent, QueueStep, TARGET_SOC};
