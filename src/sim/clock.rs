use crate::config::TICKS_PER_DAY;

/// A simulation clock that counts one-minute ticks over a fixed horizon.
///
/// # Examples
///
/// ```
/// use sirq_sim::sim::clock::Clock;
///
/// let mut clock = Clock::new(3);
/// let mut ticks = Vec::new();
///
/// while let Some(tick) = clock.tick() {
///     ticks.push(tick);
/// }
/// assert_eq!(ticks, vec![0, 1, 2]);
/// assert_eq!(clock.elapsed(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Next tick to hand out
    current: usize,
    /// Tick count at which the clock stops
    total: usize,
}

impl Clock {
    /// Creates a clock that runs for `total` ticks.
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    /// Creates a clock covering one simulated day.
    pub fn day() -> Self {
        Self::new(TICKS_PER_DAY)
    }

    /// Advances the clock by one tick.
    ///
    /// # Returns
    ///
    /// * `Some(tick)` - The tick index (starting from 0) before advancing
    /// * `None` - If the clock has reached its horizon or was stopped
    pub fn tick(&mut self) -> Option<usize> {
        if self.current < self.total {
            let tick = self.current;
            self.current += 1;
            Some(tick)
        } else {
            None
        }
    }

    /// Ends the run early; subsequent calls to [`Clock::tick`] return `None`.
    pub fn stop(&mut self) {
        self.total = self.current;
    }

    /// Ticks already handed out.
    pub fn elapsed(&self) -> usize {
        self.current
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.total
    }
}

/// Hour of day (0..24) for a tick, wrapping every simulated day.
pub fn hour_of_day(tick: usize) -> usize {
    (tick % TICKS_PER_DAY) / 60
}
