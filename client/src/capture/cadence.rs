use std::time::Duration;

use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed-period pacing for the send cycle.
///
/// Time spent between ticks counts against the period. A late tick fires
/// immediately and the schedule restarts from there, so a slow iteration
/// never causes a burst of catch-up frames.
pub struct Cadence {
    period: Duration,
    interval: Interval,
}

impl Cadence {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { period, interval }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await;
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_work_time_is_subtracted_from_period() {
        let mut cadence = Cadence::new(Duration::from_millis(100));
        let first = cadence.tick().await;

        sleep(Duration::from_millis(30)).await;
        let second = cadence.tick().await;
        assert_eq!(second - first, Duration::from_millis(100));

        sleep(Duration::from_millis(99)).await;
        let third = cadence.tick().await;
        assert_eq!(third - second, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_iteration_does_not_burst() {
        let mut cadence = Cadence::new(Duration::from_millis(100));
        let first = cadence.tick().await;

        sleep(Duration::from_millis(350)).await;
        let late = cadence.tick().await;
        assert_eq!(late - first, Duration::from_millis(350));

        let next = cadence.tick().await;
        assert_eq!(next - late, Duration::from_millis(100));
    }
}
