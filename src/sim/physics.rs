//! One-minute charging step with a CC-CV taper.

/// State of charge (%) above which charging slows to `TAPER_EFFICIENCY`.
pub const TAPER_SOC: f64 = 80.0;
pub const TAPER_EFFICIENCY: f64 = 0.5;

/// Energy delivered and resulting state of charge for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeStep {
    pub energy_kwh: f64,
    pub soc: f64,
}

/// Advances one truck by one minute on a charger of `charger_power_kw`.
pub fn charge_step(soc: f64, charger_power_kw: f64, battery_capacity_kwh: f64) -> ChargeStep {
    let efficiency = if soc < TAPER_SOC { 1.0 } else { TAPER_EFFICIENCY };
    let energy_kwh = charger_power_kw / 60.0 * efficiency;
    ChargeStep {
        energy_kwh,
        soc: soc + energy_kwh / battery_capacity_kwh * 100.0,
    }
}
