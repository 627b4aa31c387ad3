//! Time sources for the stream engine.

use std::sync::Arc;

use chrono::Utc;

/// A source of "now", in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // Clamped at the epoch; a clock set before 1970 behaves as if it were 1970
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// A clock anchored at a fixed epoch time that advances with tokio's clock.
///
/// Under a paused tokio runtime, time only moves when every task is idle, which
/// makes tick timing fully deterministic in tests.
#[derive(Debug, Clone)]
pub struct TokioClock {
    base_ms: u64,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(base_ms: u64) -> Self {
        Self {
            base_ms,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        let elapsed = self.started.elapsed().as_millis();
        self.base_ms
            .saturating_add(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_system_clock_is_after_2024() {
        // 2024-01-01T00:00:00Z
        assert!(SystemClock.now_ms() > 1_704_067_200_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_runtime_time() {
        let clock = TokioClock::starting_at(8_000);
        assert_eq!(clock.now_ms(), 8_000);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 9_500);

        // Auto-advance lands on the timer's deadline, rounded up to the next millisecond
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!((13_500..=13_501).contains(&clock.now_ms()));
    }
}
