//! Run statistics and reports.
//!
//! Counters are plain integers owned by the worker that updates them; the
//! monitor reads them only from the reports returned when workers are joined.

use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;
use uuid::Uuid;

use crate::ledger::types::Timestamp;

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Consumer-side tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThroughputCounters {
    /// Tokens whose receipt ended in `SUCCESS`.
    pub completed: u64,
    /// Tokens with any other final status, or still pending after polling.
    pub missing: u64,
    /// Tokens whose receipt could not be fetched.
    pub errors: u64,
    /// Distinct producers that sent their end marker.
    pub end_markers: u64,
}

/// What the consumer saw.
#[derive(Debug, Clone, Serialize)]
pub struct ThroughputReport {
    pub completed: u64,
    pub missing: u64,
    pub errors: u64,
    pub end_markers: u64,
    /// Wall-clock time of the first producer's ready signal.
    pub started_at: Timestamp,
    #[serde(rename = "elapsed_secs", with = "duration_secs")]
    pub elapsed: Duration,
    pub ops_per_sec: f64,
}

impl ThroughputReport {
    pub fn new(counters: ThroughputCounters, started_at: Timestamp, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let ops_per_sec = if secs > 0.0 {
            counters.completed as f64 / secs
        } else {
            0.0
        };
        Self {
            completed: counters.completed,
            missing: counters.missing,
            errors: counters.errors,
            end_markers: counters.end_markers,
            started_at,
            elapsed,
            ops_per_sec,
        }
    }

    /// Tokens resolved one way or another.
    pub fn resolved(&self) -> u64 {
        self.completed + self.missing + self.errors
    }
}

/// What one producer did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProducerSummary {
    pub producer: usize,
    /// Requests that reached a final submit outcome (accepted or not).
    pub submitted: u64,
    /// Accepted requests handed to the consumer.
    pub enqueued: u64,
    /// Requests that ended with any outcome other than accepted.
    pub rejected: u64,
    /// Iterations that failed before a submit outcome existed.
    pub errors: u64,
    #[serde(rename = "elapsed_secs", with = "duration_secs")]
    pub elapsed: Duration,
}

/// Everything a monitor run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub workload: String,
    pub producers: usize,
    pub iterations: u64,
    pub submitted: u64,
    pub rejected: u64,
    pub producer_errors: u64,
    pub throughput: ThroughputReport,
    #[serde(rename = "setup_elapsed_secs", with = "duration_secs")]
    pub setup_elapsed: Duration,
    pub per_producer: Vec<ProducerSummary>,
}

impl RunReport {
    pub fn new(
        run_id: Uuid,
        workload: impl Into<String>,
        iterations: u64,
        per_producer: Vec<ProducerSummary>,
        throughput: ThroughputReport,
        setup_elapsed: Duration,
    ) -> Self {
        Self {
            run_id,
            workload: workload.into(),
            producers: per_producer.len(),
            iterations,
            submitted: per_producer.iter().map(|p| p.submitted).sum(),
            rejected: per_producer.iter().map(|p| p.rejected).sum(),
            producer_errors: per_producer.iter().map(|p| p.errors).sum(),
            throughput,
            setup_elapsed,
            per_producer,
        }
    }

    /// Operations the run was asked to perform: producers × iterations.
    pub fn expected(&self) -> u64 {
        self.producers as u64 * self.iterations
    }

    /// Every iteration ended in exactly one bucket.
    pub fn is_balanced(&self) -> bool {
        self.throughput.resolved() + self.rejected + self.producer_errors == self.expected()
    }

    /// Human-readable multi-line summary.
    pub fn summary(&self) -> String {
        let t = &self.throughput;
        let mut out = String::new();
        let _ = writeln!(out, "run {} ({})", self.run_id, self.workload);
        let _ = writeln!(
            out,
            "  producers: {}  iterations: {}  expected: {}",
            self.producers,
            self.iterations,
            self.expected()
        );
        let _ = writeln!(
            out,
            "  submitted: {}  rejected: {}  producer errors: {}",
            self.submitted, self.rejected, self.producer_errors
        );
        let _ = writeln!(
            out,
            "  completed: {}  missing: {}  receipt errors: {}",
            t.completed, t.missing, t.errors
        );
        let _ = writeln!(
            out,
            "  elapsed: {:.2}s  throughput: {:.2} ops/s  setup: {:.2}s",
            t.elapsed.as_secs_f64(),
            t.ops_per_sec,
            self.setup_elapsed.as_secs_f64()
        );
        if !self.is_balanced() {
            let _ = writeln!(out, "  WARNING: accounting does not add up to {}", self.expected());
        }
        out
    }
}
