//! Poll intervals: fixed, or exponential with jitter.

use rand::Rng;
use std::time::Duration;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// How the wait between polls grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same interval every time.
    Fixed,
    /// Doubles from the base interval up to `max`.
    Exponential { max: Duration },
}

/// Bounded polling: at most `max_attempts` calls, separated per `backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl PollPolicy {
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff: Backoff::Fixed,
        }
    }

    /// Wait before poll number `attempt` (0-based; the first poll does not wait).
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { max } => calculate_backoff(
                attempt,
                self.interval.as_millis() as u64,
                max.as_millis() as u64,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000);
        assert!(max.as_millis() < 1100);
    }

    #[test]
    fn test_fixed_poll_delay() {
        let policy = PollPolicy::fixed(Duration::from_millis(500), 120);
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::from_millis(500));
        assert_eq!(policy.delay(119), Duration::from_millis(500));
    }

    #[test]
    fn test_exponential_poll_delay_is_capped() {
        let policy = PollPolicy {
            interval: Duration::from_millis(100),
            max_attempts: 60,
            backoff: Backoff::Exponential {
                max: Duration::from_millis(200),
            },
        };
        assert!(policy.delay(1) >= Duration::from_millis(100));
        assert!(policy.delay(8) >= Duration::from_millis(200));
        assert!(policy.delay(8) < Duration::from_millis(220));
    }
}
