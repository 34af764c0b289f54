//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ledger_submissions_total` (counter): submission attempts by outcome
//! - `ledger_submit_retries_total` (counter): retries by reason
//! - `ledger_reconnects_total` (counter): connections reopened after unavailability
//! - `ledger_confirmations_total` (counter): finished receipt waits by result
//! - `ledger_confirmation_seconds` (histogram): time from first poll to result
//! - `ledger_record_queries_total` (counter): paid record queries by mode
//! - `harness_tokens_enqueued_total` (counter): pending tokens handed to the consumer
//! - `harness_throughput_ops` (gauge): operations/second of the last run
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Prometheus exposition is opt-in via `init_metrics`

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Serving metrics"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_submission(outcome: &'static str) {
    counter!("ledger_submissions_total", "outcome" => outcome).increment(1);
}

pub fn record_submit_retry(reason: &'static str) {
    counter!("ledger_submit_retries_total", "reason" => reason).increment(1);
}

pub fn record_reconnect() {
    counter!("ledger_reconnects_total").increment(1);
}

pub fn record_confirmation(result: &'static str, elapsed: Duration) {
    counter!("ledger_confirmations_total", "result" => result).increment(1);
    histogram!("ledger_confirmation_seconds").record(elapsed.as_secs_f64());
}

pub fn record_record_query(mode: &'static str) {
    counter!("ledger_record_queries_total", "mode" => mode).increment(1);
}

pub fn record_token_enqueued() {
    counter!("harness_tokens_enqueued_total").increment(1);
}

pub fn record_throughput(ops_per_sec: f64) {
    gauge!("harness_throughput_ops").set(ops_per_sec);
}
