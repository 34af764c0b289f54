//! Ledger throughput harness library.

pub mod config;
pub mod harness;
pub mod ledger;
pub mod observability;
pub mod resilience;

pub use config::schema::HarnessConfig;
pub use harness::{HarnessContext, HarnessError, Monitor, RunReport, RunSettings};
pub use ledger::{OperationBuilder, SubmissionClient};
