//! Throughput harness.
//!
//! # Data Flow
//! ```text
//! Monitor (setup, workload.prepare)
//!     → P × Producer (paced submits, gate.ready on first connect)
//!         → token queue (unbounded FIFO: Operation | EndOfStream)
//!     → Consumer (try_recv drain, receipt polling, stall detection)
//!     → RunReport (per-producer summaries + ThroughputReport)
//! ```
//!
//! # Accounting
//! Every iteration ends in exactly one bucket: completed, missing, receipt
//! error, rejected at submit, or producer error. The buckets sum to
//! `producers × iterations`.

pub mod consumer;
pub mod context;
pub mod error;
pub mod gate;
pub mod monitor;
pub mod pacing;
pub mod producer;
pub mod stats;
pub mod token;
pub mod worker;
pub mod workload;

pub use consumer::{Consumer, DrainSettings};
pub use context::HarnessContext;
pub use error::{HarnessError, HarnessResult};
pub use monitor::{Monitor, RunSettings};
pub use producer::Producer;
pub use stats::{ProducerSummary, RunReport, ThroughputReport};
pub use worker::{Worker, WorkerOutput};
pub use workload::Workload;
