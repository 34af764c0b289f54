//! Monitor: sets the run up, starts the workers and joins them.

use futures_util::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::schema::RunConfig;
use crate::harness::consumer::{Consumer, DrainSettings};
use crate::harness::context::HarnessContext;
use crate::harness::error::{HarnessError, HarnessResult};
use crate::harness::gate::start_gate;
use crate::harness::producer::Producer;
use crate::harness::stats::{ProducerSummary, RunReport, ThroughputReport};
use crate::harness::token::token_queue;
use crate::harness::worker::{self, Worker, WorkerOutput};
use crate::harness::workload::Workload;
use crate::observability::metrics;

/// Shape of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub iterations: u64,
    pub producers: usize,
    pub submit_rate: u32,
    pub drain_rate: u32,
    pub stall_window: Duration,
}

impl From<&RunConfig> for RunSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            iterations: config.iterations,
            producers: config.producers,
            submit_rate: config.submit_rate,
            drain_rate: config.drain_rate,
            stall_window: Duration::from_secs(config.stall_window_secs),
        }
    }
}

pub struct Monitor {
    context: HarnessContext,
    settings: RunSettings,
    workload: Box<dyn Workload>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("settings", &self.settings)
            .field("workload", &self.workload.name())
            .finish_non_exhaustive()
    }
}

impl Monitor {
    pub fn new(context: HarnessContext, settings: RunSettings, workload: Box<dyn Workload>) -> Self {
        Self {
            context,
            settings,
            workload,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run the whole measurement and return its report.
    pub async fn run(self) -> HarnessResult<RunReport> {
        let Monitor {
            context,
            settings,
            mut workload,
        } = self;
        let run_id = Uuid::new_v4();
        let name = workload.name();

        tracing::info!(
            run_id = %run_id,
            workload = name,
            producers = settings.producers,
            iterations = settings.iterations,
            submit_rate = settings.submit_rate,
            "Starting run"
        );

        let setup_started = Instant::now();
        let mut client = context.client()?;
        workload
            .prepare(&mut client, context.builder.as_ref())
            .await?;
        let setup_elapsed = setup_started.elapsed();
        tracing::info!(run_id = %run_id, elapsed_ms = setup_elapsed.as_millis() as u64, "Setup complete");

        let workload: Arc<dyn Workload> = Arc::from(workload);
        let (sender, receiver) = token_queue();
        let (gate, signal) = start_gate();
        let consumer_client = context.client()?;

        let producers: Vec<_> = (0..settings.producers)
            .map(|index| {
                Worker::Producer(Producer::new(
                    index,
                    settings.iterations,
                    settings.submit_rate,
                    context.clone(),
                    workload.clone(),
                    sender.clone(),
                    gate.clone(),
                ))
                .spawn()
            })
            .collect();
        // Only producers hold these now, so the signal can resolve to None.
        drop(gate);
        drop(sender);

        let Some(started_at) = signal.wait().await else {
            tracing::error!(run_id = %run_id, "No producer became ready");
            for handle in &producers {
                handle.abort();
            }
            return Err(HarnessError::NoProducerReady);
        };

        let consumer = Worker::Consumer(Consumer::new(
            consumer_client,
            receiver,
            DrainSettings {
                producers: settings.producers,
                drain_rate: settings.drain_rate,
                stall_window: settings.stall_window,
            },
            started_at,
        ))
        .spawn();

        let mut outstanding: Vec<AbortHandle> =
            producers.iter().map(JoinHandle::abort_handle).collect();
        outstanding.push(consumer.abort_handle());

        let (per_producer, throughput) = match join_workers(producers, consumer).await {
            Ok(joined) => joined,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Run aborted");
                for handle in &outstanding {
                    handle.abort();
                }
                return Err(e);
            }
        };

        metrics::record_throughput(throughput.ops_per_sec);
        let report = RunReport::new(
            run_id,
            name,
            settings.iterations,
            per_producer,
            throughput,
            setup_elapsed,
        );
        if report.is_balanced() {
            tracing::info!(
                run_id = %run_id,
                completed = report.throughput.completed,
                ops_per_sec = report.throughput.ops_per_sec,
                "Run finished"
            );
        } else {
            tracing::warn!(
                run_id = %run_id,
                expected = report.expected(),
                resolved = report.throughput.resolved(),
                rejected = report.rejected,
                producer_errors = report.producer_errors,
                "Run finished with unbalanced accounting"
            );
        }
        Ok(report)
    }
}

/// Join producers and consumer together. The first failure on either side
/// ends the wait, so a stalled consumer is seen while producers still hang.
async fn join_workers(
    producers: Vec<JoinHandle<HarnessResult<WorkerOutput>>>,
    consumer: JoinHandle<HarnessResult<WorkerOutput>>,
) -> HarnessResult<(Vec<ProducerSummary>, ThroughputReport)> {
    let producers = try_join_all(
        producers
            .into_iter()
            .map(|handle| async move { worker::join("producer", handle).await?.into_summary() }),
    );
    let consumer = async move { worker::join("consumer", consumer).await?.into_throughput() };
    tokio::try_join!(producers, consumer)
}
