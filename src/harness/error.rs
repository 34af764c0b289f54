//! Harness error types.

use std::time::Duration;
use thiserror::Error;

use crate::ledger::builder::BuilderError;
use crate::ledger::client::ClientError;

/// Errors that end a throughput run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("setup failed: {0}")]
    Setup(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Build(#[from] BuilderError),

    /// The queue stayed empty for the whole stall window before every
    /// producer finished.
    #[error("queue stalled: empty for {idle:?} with {finished}/{expected} producers finished")]
    Stalled {
        idle: Duration,
        finished: usize,
        expected: usize,
    },

    #[error("no producer became ready")]
    NoProducerReady,

    #[error("{role} worker panicked")]
    WorkerPanicked { role: &'static str },

    #[error("{role} worker returned an unexpected output")]
    UnexpectedOutput { role: &'static str },
}

pub type HarnessResult<T> = Result<T, HarnessError>;
