//! Submission retry policy.
//!
//! # Responsibilities
//! - Decide, from a classified submission outcome alone, whether to retry
//! - Enforce the retry budget (N retries = at most N+1 submissions)
//! - Say when a retry needs a fresh connection
//!
//! # Design Decisions
//! - Pure function of `(outcome, attempt)`; no I/O, no clock
//! - `BUSY` retries on the same connection after a fixed delay
//! - Retryable unavailability reconnects before the next attempt
//! - Terminal prechecks and refused connections stop immediately

use std::time::Duration;

use crate::ledger::transport::TransportOutcome;

/// What to do after a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Return the outcome to the caller.
    Stop,
    /// Wait `delay`, optionally reopen the connection, then resend the same request.
    Retry { delay: Duration, reconnect: bool },
}

/// Bounded retry with fixed delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Wait after a `BUSY` precheck.
    pub busy_delay: Duration,
    /// Wait before resending over a fresh connection.
    pub reconnect_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 15,
            busy_delay: Duration::from_millis(200),
            reconnect_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Decide the next step after attempt number `attempt` (0-based) produced `outcome`.
    pub fn decide(&self, outcome: &TransportOutcome, attempt: u32) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision::Stop;
        }
        match outcome {
            TransportOutcome::Accepted | TransportOutcome::Fatal(_) => RetryDecision::Stop,
            TransportOutcome::Busy => RetryDecision::Retry {
                delay: self.busy_delay,
                reconnect: false,
            },
            TransportOutcome::Unavailable(reason) if reason.is_retryable() => RetryDecision::Retry {
                delay: self.reconnect_delay,
                reconnect: true,
            },
            TransportOutcome::Unavailable(_) => RetryDecision::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::transport::UnavailableReason;
    use crate::ledger::types::ResponseCode;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_accepted_and_fatal_stop() {
        let p = policy(15);
        assert_eq!(p.decide(&TransportOutcome::Accepted, 0), RetryDecision::Stop);
        assert_eq!(
            p.decide(&TransportOutcome::Fatal(ResponseCode::InsufficientTxFee), 0),
            RetryDecision::Stop
        );
    }

    #[test]
    fn test_busy_retries_until_budget() {
        let p = policy(2);
        let busy = TransportOutcome::Busy;
        assert!(matches!(p.decide(&busy, 0), RetryDecision::Retry { reconnect: false, .. }));
        assert!(matches!(p.decide(&busy, 1), RetryDecision::Retry { .. }));
        assert_eq!(p.decide(&busy, 2), RetryDecision::Stop);
    }

    #[test]
    fn test_budget_bounds_total_attempts() {
        // Simulate an always-busy endpoint and count attempts.
        for max_retries in [0, 1, 5, 15] {
            let p = policy(max_retries);
            let mut attempts = 0;
            loop {
                let attempt = attempts;
                attempts += 1;
                if p.decide(&TransportOutcome::Busy, attempt) == RetryDecision::Stop {
                    break;
                }
            }
            assert_eq!(attempts, max_retries + 1);
        }
    }

    #[test]
    fn test_unavailable_reconnects_unless_refused() {
        let p = policy(3);
        let decision = p.decide(&TransportOutcome::Unavailable(UnavailableReason::AgeOut), 0);
        assert_eq!(
            decision,
            RetryDecision::Retry {
                delay: p.reconnect_delay,
                reconnect: true
            }
        );
        assert!(matches!(
            p.decide(&TransportOutcome::Unavailable(UnavailableReason::Deadline), 1),
            RetryDecision::Retry { reconnect: true, .. }
        ));
        assert_eq!(
            p.decide(&TransportOutcome::Unavailable(UnavailableReason::Refused), 0),
            RetryDecision::Stop
        );
    }
}
