use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::config::DelayConfig;

/// Supplies the random part of a retry delay.
pub trait JitterSource: Send + Sync {
    /// A sample drawn uniformly from `[0, 1)`.
    fn sample(&self) -> f64;
}

/// Thread-local RNG jitter.
#[derive(Debug, Default, Copy, Clone)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Always returns the same sample. Useful where delays must be predictable.
#[derive(Debug, Copy, Clone)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// `min(base * 2^attempt + jitter, max)` with `jitter = unit_jitter * base`.
///
/// `unit_jitter` is clamped to `[0, 1]`; overflow of the exponential term
/// saturates at `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration, unit_jitter: f64) -> Duration {
    let base_ms = base.as_secs_f64() * 1_000.0;
    let max_ms = max.as_secs_f64() * 1_000.0;

    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let exponential = base_ms * 2f64.powi(exponent);
    let jitter = unit_jitter.clamp(0.0, 1.0) * base_ms;

    // f64::min picks `max_ms` over a NaN operand.
    let delay_ms = (exponential + jitter).min(max_ms);
    Duration::from_secs_f64(delay_ms / 1_000.0)
}

/// Exponential backoff bound to a delay policy and a jitter source.
#[derive(Clone)]
pub struct Backoff {
    delay: DelayConfig,
    jitter: Arc<dyn JitterSource>,
}

impl std::fmt::Debug for Backoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backoff").field("delay", &self.delay).finish()
    }
}

impl Backoff {
    pub fn new(delay: DelayConfig, jitter: Arc<dyn JitterSource>) -> Self {
        Self { delay, jitter }
    }

    /// Delay before the retry that follows failed attempt number `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, self.sample())
    }

    /// Draws a unit jitter sample from the configured source.
    pub fn sample(&self) -> f64 {
        self.jitter.sample()
    }

    /// Like [`Backoff::delay`], with a jitter sample drawn beforehand.
    pub fn delay_with(&self, attempt: u32, unit_jitter: f64) -> Duration {
        backoff_delay(attempt, self.delay.base(), self.delay.max(), unit_jitter)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{Backoff, FixedJitter, JitterSource, RandomJitter, backoff_delay};
    use crate::config::DelayConfig;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn stays_within_exponential_band() {
        let base = SECOND;
        let max = Duration::from_secs(10_000);
        for attempt in 0..12u32 {
            for _ in 0..50 {
                let d = backoff_delay(attempt, base, max, RandomJitter.sample());
                let floor = base * 2u32.pow(attempt);
                assert!(d >= floor, "attempt {attempt}: {d:?} < {floor:?}");
                assert!(d <= floor + base, "attempt {attempt}: {d:?} > {:?}", floor + base);
                assert!(d <= max);
            }
        }
    }

    #[test]
    fn caps_at_max() {
        let max = Duration::from_secs(30);
        assert_eq!(backoff_delay(5, SECOND, max, 0.5), max);
        assert_eq!(backoff_delay(40, SECOND, max, 0.0), max);
        assert_eq!(backoff_delay(u32::MAX, SECOND, max, 0.9), max);
    }

    #[test]
    fn jitter_adds_fraction_of_base() {
        let max = Duration::from_secs(30);
        assert_eq!(backoff_delay(0, SECOND, max, 0.0), SECOND);
        assert_eq!(backoff_delay(2, SECOND, max, 0.0), 4 * SECOND);
        assert_eq!(
            backoff_delay(1, SECOND, max, 0.25),
            Duration::from_millis(2_250)
        );
    }

    #[test]
    fn random_jitter_is_unit_interval() {
        for _ in 0..1_000 {
            let s = RandomJitter.sample();
            assert!((0.0..1.0).contains(&s));
        }
    }

    #[test]
    fn backoff_uses_policy() {
        let backoff = Backoff::new(
            DelayConfig {
                base_ms: 500,
                max_ms: 3_000,
            },
            Arc::new(FixedJitter(0.0)),
        );
        assert_eq!(backoff.delay(0), Duration::from_millis(500));
        assert_eq!(backoff.delay(1), Duration::from_millis(1_000));
        assert_eq!(backoff.delay(3), Duration::from_millis(3_000));
    }

    #[test]
    fn presampled_jitter_matches_source() {
        let backoff = Backoff::new(DelayConfig::default(), Arc::new(FixedJitter(0.5)));
        let unit = backoff.sample();
        assert_eq!(unit, 0.5);
        assert_eq!(backoff.delay_with(1, unit), backoff.delay(1));
        assert_eq!(backoff.delay_with(1, unit), Duration::from_millis(2_500));
    }
}
