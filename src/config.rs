//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agents::Profile;
use crate::error::ConfigError;
use crate::sim::types::PolicyKind;

/// Largest seed a scenario accepts; TOML integers are signed 64-bit.
pub const MAX_SEED: u64 = i64::MAX as u64;

/// Ticks in one simulated day (one tick = one minute).
pub const TICKS_PER_DAY: usize = 1440;

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run-level parameters: station size, policy, seed.
    #[serde(default)]
    pub run: RunConfig,
    /// Economic and physical parameters of the station.
    #[serde(default)]
    pub station: StationConfig,
}

/// Run-level parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Number of chargers (must be >= 1).
    pub capacity: usize,
    /// Admission policy tag: `"FIFO"` or `"SIRQ"`.
    pub policy: String,
    /// Master random seed.
    pub seed: u64,
    /// Ticks to simulate (one day by default).
    pub ticks: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            policy: "SIRQ".to_string(),
            seed: 42,
            ticks: TICKS_PER_DAY,
        }
    }
}

/// Immutable parameter set for one station run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationConfig {
    /// Charger output (kW).
    pub charger_power_kw: f64,
    /// Truck battery capacity (kWh).
    pub battery_capacity_kwh: f64,
    /// Grid price before surge ($/kWh).
    pub base_price_per_kwh: f64,
    /// Entry fee folded into every opening bid ($).
    pub base_service_fee: f64,
    /// Minimum outbid step ($). Recorded with results; admission uses the premium.
    pub auction_increment: f64,
    /// Factor a challenger must exceed over the incumbent's bid (> 1.0).
    pub preemption_premium: f64,
    /// Congestion-responsive pricing and price-driven balking.
    pub smart_pricing: bool,
    /// Relative price rise at 100% utilization.
    pub surge_sensitivity: f64,
    /// Regulatory price ceiling ($/kWh).
    pub price_cap_per_kwh: f64,
    /// Relative weight of Critical arrivals.
    pub prob_critical: f64,
    /// Relative weight of Standard arrivals.
    pub prob_standard: f64,
    /// Relative weight of Economy arrivals.
    pub prob_economy: f64,
    /// Scales the hourly arrival schedule (1.0 = normal traffic).
    pub traffic_multiplier: f64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            charger_power_kw: 150.0,
            battery_capacity_kwh: 500.0,
            base_price_per_kwh: 0.50,
            base_service_fee: 10.0,
            auction_increment: 5.0,
            preemption_premium: 1.2,
            smart_pricing: true,
            surge_sensitivity: 0.5,
            price_cap_per_kwh: 2.00,
            prob_critical: 0.20,
            prob_standard: 0.60,
            prob_economy: 0.20,
            traffic_multiplier: 1.0,
        }
    }
}

impl StationConfig {
    /// Profile weights normalized to sum to 1, in [`Profile::ALL`] order.
    ///
    /// The configured probabilities need not sum to 1. Call only on a
    /// validated config (non-negative weights with a positive sum).
    pub fn profile_weights(&self) -> [(Profile, f64); 3] {
        let raw = [self.prob_critical, self.prob_standard, self.prob_economy];
        let total: f64 = raw.iter().sum();
        [
            (Profile::Critical, raw[0] / total),
            (Profile::Standard, raw[1] / total),
            (Profile::Economy, raw[2] / total),
        ]
    }

    /// Validates station parameters and returns every violation found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut positive = |field: &str, value: f64| {
            if !(value.is_finite() && value > 0.0) {
                errors.push(ConfigError::new(format!("station.{field}"), "must be > 0"));
            }
        };
        positive("charger_power_kw", self.charger_power_kw);
        positive("battery_capacity_kwh", self.battery_capacity_kwh);

        let mut non_negative = |field: &str, value: f64| {
            if !(value.is_finite() && value >= 0.0) {
                errors.push(ConfigError::new(format!("station.{field}"), "must be >= 0"));
            }
        };
        non_negative("base_price_per_kwh", self.base_price_per_kwh);
        non_negative("base_service_fee", self.base_service_fee);
        non_negative("auction_increment", self.auction_increment);
        non_negative("surge_sensitivity", self.surge_sensitivity);
        non_negative("traffic_multiplier", self.traffic_multiplier);
        non_negative("prob_critical", self.prob_critical);
        non_negative("prob_standard", self.prob_standard);
        non_negative("prob_economy", self.prob_economy);

        if !(self.preemption_premium.is_finite() && self.preemption_premium > 1.0) {
            errors.push(ConfigError::new("station.preemption_premium", "must be > 1.0"));
        }
        if !(self.price_cap_per_kwh >= self.base_price_per_kwh) {
            errors.push(ConfigError::new(
                "station.price_cap_per_kwh",
                "must be >= station.base_price_per_kwh",
            ));
        }
        let mix = self.prob_critical + self.prob_standard + self.prob_economy;
        if !(mix.is_finite() && mix > 0.0) {
            errors.push(ConfigError::new(
                "station.prob_critical",
                "profile probabilities must have a positive sum",
            ));
        }

        errors
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario.
    pub fn baseline() -> Self {
        Self {
            run: RunConfig::default(),
            station: StationConfig::default(),
        }
    }

    /// Returns the rush-hour preset: 50% more traffic than baseline.
    pub fn rush_hour() -> Self {
        Self {
            run: RunConfig::default(),
            station: StationConfig {
                traffic_multiplier: 1.5,
                ..StationConfig::default()
            },
        }
    }

    /// Returns the flat-pricing preset: static price, no balking.
    pub fn flat_pricing() -> Self {
        Self {
            run: RunConfig::default(),
            station: StationConfig {
                smart_pricing: false,
                ..StationConfig::default()
            },
        }
    }

    /// Returns the VIP-heavy preset: half of all arrivals are Critical.
    pub fn vip_heavy() -> Self {
        Self {
            run: RunConfig::default(),
            station: StationConfig {
                prob_critical: 0.5,
                prob_standard: 0.4,
                prob_economy: 0.1,
                ..StationConfig::default()
            },
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "rush_hour", "flat_pricing", "vip_heavy"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "rush_hour" => Ok(Self::rush_hour()),
            "flat_pricing" => Ok(Self::flat_pricing()),
            "vip_heavy" => Ok(Self::vip_heavy()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Serializes the scenario as TOML key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parsed admission policy.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` on field `run.policy` for an unknown tag.
    pub fn policy(&self) -> Result<PolicyKind, ConfigError> {
        self.run.policy.parse()
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.run.capacity < 1 {
            errors.push(ConfigError::new("run.capacity", "must be >= 1"));
        }
        if let Err(e) = self.policy() {
            errors.push(e);
        }
        if self.run.seed > MAX_SEED {
            errors.push(ConfigError::new(
                "run.seed",
                format!("must be <= {MAX_SEED}"),
            ));
        }
        errors.extend(self.station.validate());
        errors
    }
}
