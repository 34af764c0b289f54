//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Submission:
//!     → transport call → TransportOutcome
//!     → retries.rs (pure decision: stop, or retry after a delay, maybe reconnecting)
//!
//! Receipt / record polling:
//!     → backoff.rs (fixed or capped exponential wait between bounded polls)
//! ```
//!
//! # Design Decisions
//! - Every wait is bounded; exhaustion returns the last status instead of failing
//! - Retry budgets and poll intervals are configuration, not constants

pub mod backoff;
pub mod retries;

pub use backoff::{Backoff, PollPolicy};
pub use retries::{RetryDecision, RetryPolicy};
