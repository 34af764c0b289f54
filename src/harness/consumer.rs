//! Consumer worker: drain the queue and resolve every token to a receipt.
//!
//! The queue is polled without blocking. Each empty poll sleeps for
//! `min(1000 / drain_rate ms, 50 ms)` and bumps an idle counter that resets
//! whenever a token arrives. The run is declared stalled once the counter
//! covers the whole stall window while producers are still outstanding.

use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{sleep, Instant};

use crate::harness::error::{HarnessError, HarnessResult};
use crate::harness::stats::{ThroughputCounters, ThroughputReport};
use crate::harness::token::{PendingToken, TokenReceiver};
use crate::ledger::client::SubmissionClient;
use crate::ledger::types::{Confirmation, OperationId, Timestamp};

const MAX_IDLE_SLEEP: Duration = Duration::from_millis(50);

/// Drain tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSettings {
    /// Number of end markers that complete the drain.
    pub producers: usize,
    /// Operations per second the consumer expects to handle.
    pub drain_rate: u32,
    pub stall_window: Duration,
}

impl DrainSettings {
    /// Sleep after an empty poll.
    pub fn idle_sleep(&self) -> Duration {
        let per_op = Duration::from_millis(1000 / u64::from(self.drain_rate.max(1)));
        per_op.min(MAX_IDLE_SLEEP).max(Duration::from_millis(1))
    }

    /// Consecutive empty polls tolerated before the run is stalled.
    pub fn stall_threshold(&self) -> u64 {
        let sleep = self.idle_sleep().as_millis().max(1);
        ((self.stall_window.as_millis() / sleep) as u64).max(1)
    }
}

pub struct Consumer {
    client: SubmissionClient,
    queue: TokenReceiver,
    settings: DrainSettings,
    /// Logical start of the run (first producer ready).
    started_at: Instant,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Consumer {
    pub fn new(
        client: SubmissionClient,
        queue: TokenReceiver,
        settings: DrainSettings,
        started_at: Instant,
    ) -> Self {
        Self {
            client,
            queue,
            settings,
            started_at,
        }
    }

    pub async fn run(mut self) -> HarnessResult<ThroughputReport> {
        let wall_start = wall_clock_at(self.started_at);
        let idle_sleep = self.settings.idle_sleep();
        let threshold = self.settings.stall_threshold();

        let mut counters = ThroughputCounters::default();
        let mut finished: HashSet<usize> = HashSet::new();
        let mut empty_polls: u64 = 0;

        while finished.len() < self.settings.producers {
            match self.queue.try_recv() {
                Ok(PendingToken::Operation { id, seq, producer }) => {
                    empty_polls = 0;
                    match self.client.await_confirmation(&id).await {
                        Ok(confirmation) if confirmation.is_success() => counters.completed += 1,
                        Ok(confirmation) => {
                            counters.missing += 1;
                            log_missing(&id, seq, producer, &confirmation);
                        }
                        Err(e) => {
                            counters.errors += 1;
                            tracing::warn!(id = %id, seq = seq, producer = producer, error = %e, "Receipt lookup failed");
                        }
                    }
                }
                Ok(PendingToken::EndOfStream { producer, submitted }) => {
                    empty_polls = 0;
                    if finished.insert(producer) {
                        counters.end_markers += 1;
                        tracing::debug!(producer = producer, submitted = submitted, "End of stream");
                    } else {
                        tracing::debug!(producer = producer, "Duplicate end marker ignored");
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    empty_polls += 1;
                    if empty_polls > threshold {
                        tracing::error!(
                            finished = finished.len(),
                            expected = self.settings.producers,
                            "Queue stalled"
                        );
                        return Err(HarnessError::Stalled {
                            idle: self.settings.stall_window,
                            finished: finished.len(),
                            expected: self.settings.producers,
                        });
                    }
                    sleep(idle_sleep).await;
                }
            }
        }

        let report = ThroughputReport::new(counters, wall_start, self.started_at.elapsed());
        tracing::info!(
            completed = report.completed,
            missing = report.missing,
            errors = report.errors,
            elapsed_ms = report.elapsed.as_millis() as u64,
            ops_per_sec = report.ops_per_sec,
            "Queue drained"
        );
        Ok(report)
    }
}

fn log_missing(id: &OperationId, seq: u64, producer: usize, confirmation: &Confirmation) {
    tracing::warn!(
        id = %id,
        seq = seq,
        producer = producer,
        status = confirmation.label(),
        "Operation did not complete"
    );
}

/// Wall-clock time corresponding to a monotonic instant in the past.
fn wall_clock_at(instant: Instant) -> Timestamp {
    let now = Timestamp::now();
    let ago = instant.elapsed();
    let mut seconds = now.seconds - ago.as_secs() as i64;
    let mut nanos = now.nanos as i64 - ago.subsec_nanos() as i64;
    if nanos < 0 {
        seconds -= 1;
        nanos += 1_000_000_000;
    }
    Timestamp::new(seconds, nanos as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::token::token_queue;
    use crate::ledger::client::ClientPolicy;
    use crate::ledger::mock::test_support::{self, builder};
    use crate::ledger::mock::{MockConfig, MockLedger};
    use crate::ledger::transport::{LedgerTransport, TransportError, UnavailableReason};
    use crate::ledger::types::ResponseCode;
    use crate::ledger::OperationBuilder;
    use crate::resilience::PollPolicy;

    fn client(ledger: &MockLedger) -> SubmissionClient {
        let policy = ClientPolicy {
            receipt: PollPolicy::fixed(Duration::from_millis(100), 5),
            ..ClientPolicy::default()
        };
        test_support::client(ledger, policy)
    }

    fn settings(producers: usize) -> DrainSettings {
        DrainSettings {
            producers,
            drain_rate: 50,
            stall_window: Duration::from_secs(2),
        }
    }

    async fn submit_one(ledger: &MockLedger, b: &OperationBuilder) -> OperationId {
        let request = test_support::create_account(b, 1);
        ledger.submit(&request).await.unwrap();
        request.id()
    }

    #[test]
    fn test_idle_sleep_and_threshold() {
        let s = settings(1);
        assert_eq!(s.idle_sleep(), Duration::from_millis(20));
        assert_eq!(s.stall_threshold(), 100);

        let slow = DrainSettings {
            drain_rate: 2,
            ..settings(1)
        };
        assert_eq!(slow.idle_sleep(), Duration::from_millis(50));
        assert_eq!(slow.stall_threshold(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains_until_all_end_markers() {
        let ledger = MockLedger::default();
        let b = builder();
        let (tx, rx) = token_queue();

        for producer in 0..2 {
            for seq in 0..3 {
                let id = submit_one(&ledger, &b).await;
                tx.send(PendingToken::Operation { id, seq, producer }).unwrap();
            }
            tx.send(PendingToken::EndOfStream { producer, submitted: 3 }).unwrap();
        }
        // A late duplicate from producer 0 changes nothing.
        tx.send(PendingToken::EndOfStream { producer: 0, submitted: 3 }).unwrap();

        let consumer = Consumer::new(client(&ledger), rx, settings(2), Instant::now());
        let report = consumer.run().await.unwrap();
        assert_eq!(report.completed, 6);
        assert_eq!(report.end_markers, 2);
        assert_eq!(report.resolved(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsuccessful_receipts_count_as_missing() {
        let ledger = MockLedger::new(MockConfig {
            final_status: ResponseCode::ContractRevertExecuted,
            ..MockConfig::default()
        });
        let b = builder();
        let (tx, rx) = token_queue();

        let id = submit_one(&ledger, &b).await;
        tx.send(PendingToken::Operation { id, seq: 0, producer: 0 }).unwrap();
        let id = submit_one(&ledger, &b).await;
        tx.send(PendingToken::Operation { id, seq: 1, producer: 0 }).unwrap();
        tx.send(PendingToken::EndOfStream { producer: 0, submitted: 2 }).unwrap();

        let consumer = Consumer::new(client(&ledger), rx, settings(1), Instant::now());
        let report = consumer.run().await.unwrap();
        assert_eq!(report.missing, 2);
        assert_eq!(report.completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_lookup_counts_as_error() {
        let ledger = MockLedger::default();
        let b = builder();
        let (tx, rx) = token_queue();

        let id = submit_one(&ledger, &b).await;
        tx.send(PendingToken::Operation { id, seq: 0, producer: 0 }).unwrap();
        tx.send(PendingToken::EndOfStream { producer: 0, submitted: 1 }).unwrap();

        let consumer = Consumer::new(client(&ledger), rx, settings(1), Instant::now());
        ledger.script_failures([TransportError::Unavailable(UnavailableReason::Refused)]);
        let report = consumer.run().await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.resolved(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalls_without_end_marker() {
        let ledger = MockLedger::default();
        let (tx, rx) = token_queue();
        let consumer = Consumer::new(client(&ledger), rx, settings(2), Instant::now());

        tx.send(PendingToken::EndOfStream { producer: 0, submitted: 0 }).unwrap();
        let started = Instant::now();
        let err = consumer.run().await.unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Stalled {
                finished: 1,
                expected: 2,
                ..
            }
        ));
        assert!(started.elapsed() >= Duration::from_secs(2));
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ops_per_sec_uses_logical_start() {
        let ledger = MockLedger::default();
        let b = builder();
        let (tx, rx) = token_queue();
        let start = Instant::now();

        for seq in 0..4 {
            let id = submit_one(&ledger, &b).await;
            tx.send(PendingToken::Operation { id, seq, producer: 0 }).unwrap();
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        tx.send(PendingToken::EndOfStream { producer: 0, submitted: 4 }).unwrap();

        let report = Consumer::new(client(&ledger), rx, settings(1), start)
            .run()
            .await
            .unwrap();
        assert_eq!(report.completed, 4);
        assert!(report.elapsed >= Duration::from_secs(2));
        assert!(report.ops_per_sec <= 2.0);
    }
}
