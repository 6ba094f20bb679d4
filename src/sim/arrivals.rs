//! Time-of-day arrival schedule and profile sampling.

use rand::Rng;

use crate::agents::Profile;

use super::clock::hour_of_day;

/// Hour-of-day traffic regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalBucket {
    Night,
    MorningPeak,
    Midday,
    EveningPeak,
    LateEvening,
}

impl ArrivalBucket {
    pub fn for_tick(tick: usize) -> Self {
        match hour_of_day(tick) {
            0..6 => ArrivalBucket::Night,
            6..10 => ArrivalBucket::MorningPeak,
            10..15 => ArrivalBucket::Midday,
            15..19 => ArrivalBucket::EveningPeak,
            _ => ArrivalBucket::LateEvening,
        }
    }

    /// Per-tick arrival probability at normal traffic.
    pub fn base_probability(self) -> f64 {
        match self {
            ArrivalBucket::Night => 0.010,
            ArrivalBucket::MorningPeak => 0.060,
            ArrivalBucket::Midday => 0.030,
            ArrivalBucket::EveningPeak => 0.050,
            ArrivalBucket::LateEvening => 0.020,
        }
    }
}

/// Arrival probability for `tick` scaled by `traffic_multiplier`, clamped to [0, 1].
pub fn arrival_probability(tick: usize, traffic_multiplier: f64) -> f64 {
    (ArrivalBucket::for_tick(tick).base_probability() * traffic_multiplier).clamp(0.0, 1.0)
}

/// Draws exactly one uniform and reports whether a truck arrives.
pub fn draw_arrival<R: Rng + ?Sized>(rng: &mut R, tick: usize, traffic_multiplier: f64) -> bool {
    rng.random::<f64>() < arrival_probability(tick, traffic_multiplier)
}

/// Samples a profile from normalized categorical weights.
pub fn sample_profile<R: Rng + ?Sized>(rng: &mut R, weights: &[(Profile, f64); 3]) -> Profile {
    let u: f64 = rng.random();
    let mut acc = 0.0;
    for &(profile, w) in weights {
        acc += w;
        if u < acc {
            return profile;
        }
    }
    // Rounding can leave `acc` a hair under 1.0; fall back to the last
    // profile that carries weight.
    weights
        .iter()
        .rev()
        .find(|(_, w)| *w > 0.0)
        .map_or(Profile::Standard, |(p, _)| *p)
}
