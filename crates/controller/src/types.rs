//! Reconciliation outcomes and retry timing

use std::time::Duration;

/// Delay before looking at an unfinished run again
pub const DEFAULT_REQUEUE: Duration = Duration::from_secs(10);

/// What a reconciler wants after a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Converged; nothing to do until something changes
    Done,
    /// Progress is pending; look again after the delay
    RequeueAfter(Duration),
}

/// Exponential backoff between failed reconciliations of one identity
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Delay after the first failure
    pub base_delay: Duration,
    /// Multiplier per further failure
    pub factor: f64,
    /// Upper bound on any delay
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            factor: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl Backoff {
    /// Delay after the given number of prior failures (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let backoff = Backoff {
            base_delay: Duration::from_secs(10),
            factor: 2.0,
            max_delay: Duration::from_secs(60),
        };
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_secs(10));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(20));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(40));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(60));
        assert_eq!(backoff.delay_for_attempt(40), Duration::from_secs(60));
    }
}
