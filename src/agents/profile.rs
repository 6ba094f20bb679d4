//! Closed profile enumeration and its fixed parameter table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Economic class of a truck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Profile {
    /// Just-in-time and perishable freight. Protected from preemption.
    Critical,
    /// Scheduled fleet deliveries.
    Standard,
    /// Owner-operators and bulk haulage; highly price sensitive.
    Economy,
}

/// Behavioral parameters shared by every agent of one profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileParams {
    /// Value-of-time sampling range, `[min, max)` in $/hour.
    pub vot_range: (f64, f64),
    /// Base patience in ticks.
    pub patience_limit: u32,
    /// Multiplier on `patience_limit`.
    pub patience_factor: f64,
    /// Highest clearing price ($/kWh) the agent accepts before balking.
    pub price_tolerance: f64,
    /// Fraction of value-of-time added to the bid on each panic escalation.
    pub bid_aggressiveness: f64,
}

const CRITICAL: ProfileParams = ProfileParams {
    vot_range: (150.0, 300.0),
    patience_limit: 240,
    patience_factor: 1.90,
    price_tolerance: 5.00,
    bid_aggressiveness: 0.25,
};

const STANDARD: ProfileParams = ProfileParams {
    vot_range: (50.0, 80.0),
    patience_limit: 120,
    patience_factor: 1.55,
    price_tolerance: 1.50,
    bid_aggressiveness: 0.0,
};

const ECONOMY: ProfileParams = ProfileParams {
    vot_range: (15.0, 30.0),
    patience_limit: 45,
    patience_factor: 1.15,
    price_tolerance: 0.80,
    bid_aggressiveness: 0.0,
};

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Critical, Profile::Standard, Profile::Economy];

    /// Returns the fixed parameter row for this profile.
    pub fn params(self) -> &'static ProfileParams {
        match self {
            Profile::Critical => &CRITICAL,
            Profile::Standard => &STANDARD,
            Profile::Economy => &ECONOMY,
        }
    }

    /// Protected profiles are never evicted once charging, and their
    /// abandonment counts as a critical failure.
    pub fn is_protected(self) -> bool {
        matches!(self, Profile::Critical)
    }

    /// Wait in ticks the agent tolerates; it leaves once its wait exceeds this.
    pub fn effective_patience(self) -> f64 {
        let p = self.params();
        f64::from(p.patience_limit) * p.patience_factor
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Critical => "CRITICAL",
            Profile::Standard => "STANDARD",
            Profile::Economy => "ECONOMY",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_critical_is_protected() {
        assert!(Profile::Critical.is_protected());
        assert!(!Profile::Standard.is_protected());
        assert!(!Profile::Economy.is_protected());
    }

    #[test]
    fn only_critical_escalates() {
        for p in Profile::ALL {
            let escalates = p.params().bid_aggressiveness > 0.0;
            assert_eq!(escalates, p == Profile::Critical, "{p}");
        }
    }

    #[test]
    fn vot_ranges_are_ordered() {
        for p in Profile::ALL {
            let (lo, hi) = p.params().vot_range;
            assert!(lo < hi, "{p}");
        }
    }

    #[test]
    fn economy_tolerance_below_standard() {
        assert!(Profile::Economy.params().price_tolerance < Profile::Standard.params().price_tolerance);
    }
}
