//! Frame-timing signal: the vsync equivalent that drives sampling.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::error::ScanError;

/// Default signal rate, matching a common display refresh.
pub const DEFAULT_CLOCK_RATE: f64 = 60.0;

/// Source of frame-timing signals.
///
/// Each call resolves at the next signal. Implementations must be cancel
/// safe: the scanner drops the pending call whenever another event wins.
#[async_trait]
pub trait FrameClock: Send {
    async fn next_frame(&mut self) -> Instant;
}

/// A fixed-rate clock on top of [`tokio::time::interval`].
///
/// Signals missed while the scanner was busy are skipped, never replayed
/// in a burst.
#[derive(Debug)]
pub struct IntervalClock {
    period: Duration,
    interval: Option<Interval>,
}

impl IntervalClock {
    /// `rate` is in signals per second.
    pub fn new(rate: f64) -> Result<Self, ScanError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ScanError::Configuration(format!(
                "clock rate must be a positive number, got {rate}"
            )));
        }
        Ok(Self::with_period(Duration::from_secs_f64(1.0 / rate)))
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for IntervalClock {
    fn default() -> Self {
        Self::with_period(Duration::from_secs_f64(1.0 / DEFAULT_CLOCK_RATE))
    }
}

#[async_trait]
impl FrameClock for IntervalClock {
    async fn next_frame(&mut self) -> Instant {
        // Created on first use so the timer belongs to the scanner's runtime.
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        interval.tick().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_rates() {
        assert!(IntervalClock::new(0.0).is_err());
        assert!(IntervalClock::new(-5.0).is_err());
        assert!(IntervalClock::new(f64::NAN).is_err());
        assert_eq!(
            IntervalClock::new(50.0).unwrap().period(),
            Duration::from_millis(20)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_fixed_period() {
        let mut clock = IntervalClock::with_period(Duration::from_millis(10));
        let first = clock.next_frame().await;
        let second = clock.next_frame().await;
        let third = clock.next_frame().await;
        assert_eq!(second - first, Duration::from_millis(10));
        assert_eq!(third - second, Duration::from_millis(10));
    }
}
