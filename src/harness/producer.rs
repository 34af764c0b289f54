//! Producer worker: submit at a target rate, enqueue accepted operations.

use std::sync::Arc;
use tokio::time::Instant;

use crate::harness::context::HarnessContext;
use crate::harness::gate::StartGate;
use crate::harness::pacing::SecondPacer;
use crate::harness::stats::ProducerSummary;
use crate::harness::token::{PendingToken, TokenSender};
use crate::harness::workload::Workload;
use crate::ledger::client::SubmissionClient;
use crate::observability::metrics;

pub struct Producer {
    pub index: usize,
    pub iterations: u64,
    /// Submissions per second.
    pub rate: u32,
    context: HarnessContext,
    workload: Arc<dyn Workload>,
    queue: TokenSender,
    gate: Arc<StartGate>,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("index", &self.index)
            .field("iterations", &self.iterations)
            .field("rate", &self.rate)
            .finish_non_exhaustive()
    }
}

impl Producer {
    pub fn new(
        index: usize,
        iterations: u64,
        rate: u32,
        context: HarnessContext,
        workload: Arc<dyn Workload>,
        queue: TokenSender,
        gate: Arc<StartGate>,
    ) -> Self {
        Self {
            index,
            iterations,
            rate,
            context,
            workload,
            queue,
            gate,
        }
    }

    /// Run all iterations. Always ends with exactly one end-of-stream token.
    pub async fn run(self) -> ProducerSummary {
        let started = Instant::now();
        let mut summary = ProducerSummary {
            producer: self.index,
            ..ProducerSummary::default()
        };

        match self.context.client() {
            Ok(client) => {
                if self.gate.ready() {
                    tracing::info!(producer = self.index, "First producer ready, run started");
                }
                self.produce(client, &mut summary).await;
            }
            Err(e) => {
                tracing::error!(producer = self.index, error = %e, "Producer could not connect");
                summary.errors = self.iterations;
            }
        }

        summary.elapsed = started.elapsed();
        self.finish(&summary);
        summary
    }

    async fn produce(&self, mut client: SubmissionClient, summary: &mut ProducerSummary) {
        let builder = self.context.builder.as_ref();
        let mut pacer = SecondPacer::new(self.rate);

        for seq in 0..self.iterations {
            match self.workload.next_request(builder, self.index, seq) {
                Ok(request) => match client.submit(&request).await {
                    Ok(submission) if submission.is_accepted() => {
                        summary.submitted += 1;
                        let token = PendingToken::Operation {
                            id: submission.id,
                            seq,
                            producer: self.index,
                        };
                        match self.queue.send(token) {
                            Ok(()) => {
                                summary.enqueued += 1;
                                metrics::record_token_enqueued();
                            }
                            Err(_) => {
                                tracing::warn!(producer = self.index, seq = seq, "Queue closed, consumer gone");
                            }
                        }
                    }
                    Ok(submission) => {
                        summary.submitted += 1;
                        summary.rejected += 1;
                        tracing::warn!(
                            producer = self.index,
                            seq = seq,
                            id = %submission.id,
                            outcome = %submission.outcome,
                            attempts = submission.attempts,
                            "Operation rejected"
                        );
                    }
                    Err(e) => {
                        summary.errors += 1;
                        tracing::warn!(producer = self.index, seq = seq, error = %e, "Submission failed");
                    }
                },
                Err(e) => {
                    summary.errors += 1;
                    tracing::warn!(producer = self.index, seq = seq, error = %e, "Could not build request");
                }
            }

            pacer.tick().await;
        }

        pacer.settle().await;
    }

    fn finish(&self, summary: &ProducerSummary) {
        let marker = PendingToken::EndOfStream {
            producer: self.index,
            submitted: summary.enqueued,
        };
        if self.queue.send(marker).is_err() {
            tracing::warn!(producer = self.index, "Queue closed before end marker");
        }

        tracing::info!(
            producer = self.index,
            submitted = summary.submitted,
            enqueued = summary.enqueued,
            rejected = summary.rejected,
            errors = summary.errors,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Producer finished"
        );
    }
}
