//! Congestion-responsive clearing price.

use crate::config::StationConfig;

/// Computes the per-kWh clearing price from station occupancy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingEngine {
    base_price: f64,
    surge_sensitivity: f64,
    price_cap: f64,
    smart: bool,
}

impl PricingEngine {
    pub fn new(config: &StationConfig) -> Self {
        Self {
            base_price: config.base_price_per_kwh,
            surge_sensitivity: config.surge_sensitivity,
            price_cap: config.price_cap_per_kwh,
            smart: config.smart_pricing,
        }
    }

    /// Clearing price for the given occupancy.
    ///
    /// With smart pricing off this is always the base price. Otherwise
    /// `min(base * (1 + sensitivity * utilization), cap)` where
    /// utilization counts queued trucks too and may exceed 1.
    pub fn clearing_price(&self, charging: usize, queuing: usize, capacity: usize) -> f64 {
        if !self.smart {
            return self.base_price;
        }
        let utilization = (charging + queuing) as f64 / capacity as f64;
        (self.base_price * (1.0 + self.surge_sensitivity * utilization)).min(self.price_cap)
    }

    pub fn is_smart(&self) -> bool {
        self.smart
    }
}
