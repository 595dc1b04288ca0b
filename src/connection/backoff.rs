use std::time::Duration;

use rand::Rng;

/// Seconds added to the interval before jitter is applied, so that growth
/// starts even from a zero interval.
const GROWTH_BASE_SECS: f64 = 5.0;

/// Upper bound of the retry interval: ten years. Far beyond anything a user
/// waits for, yet small enough for `Instant` and `Duration` arithmetic.
pub const MAX_INTERVAL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Source of the multiplicative jitter applied on every failure.
/// Implementations should return values in `[0.5, 1.5)`.
pub trait JitterSource {
    fn jitter(&mut self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn jitter(&mut self) -> f64 {
        rand::thread_rng().gen_range(0.5..1.5)
    }
}

impl<F: FnMut() -> f64> JitterSource for F {
    fn jitter(&mut self) -> f64 {
        self()
    }
}

/// The interval that follows `current_secs` after one more failure,
/// capped at [`MAX_INTERVAL`].
pub fn next_interval(current_secs: f64, jitter: f64) -> f64 {
    let next = current_secs + (current_secs + GROWTH_BASE_SECS) * jitter;
    // `min` also turns NaN into the cap.
    next.min(MAX_INTERVAL.as_secs_f64())
}

/// Reconnect delay accumulator.
///
/// The first failure after a successful connection waits `0s`; every
/// further failure grows the interval geometrically with jitter.
#[derive(Debug, Clone)]
pub struct BackoffClock<J: JitterSource = ThreadRngJitter> {
    interval_secs: f64,
    jitter: J,
}

impl Default for BackoffClock {
    fn default() -> Self {
        Self::new(ThreadRngJitter)
    }
}

impl<J: JitterSource> BackoffClock<J> {
    pub fn new(jitter: J) -> Self {
        Self {
            interval_secs: 0.0,
            jitter,
        }
    }

    /// Delay the next retry has to wait.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or(MAX_INTERVAL)
    }

    /// Whether a failure happened since the last [`BackoffClock::reset`].
    pub fn has_failed(&self) -> bool {
        self.interval_secs > 0.0
    }

    /// Records a failure: returns the delay to wait now and grows the
    /// interval for the failure after it.
    pub fn fail(&mut self) -> Duration {
        let delay = self.interval();
        self.interval_secs = next_interval(self.interval_secs, self.jitter.jitter());
        delay
    }

    pub fn reset(&mut self) {
        self.interval_secs = 0.0;
    }
}
