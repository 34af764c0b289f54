//! The three worker roles and how they are spawned.

use futures_util::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::harness::consumer::Consumer;
use crate::harness::error::{HarnessError, HarnessResult};
use crate::harness::monitor::Monitor;
use crate::harness::producer::Producer;
use crate::harness::stats::{ProducerSummary, RunReport, ThroughputReport};

#[derive(Debug)]
pub enum Worker {
    Monitor(Monitor),
    Producer(Producer),
    Consumer(Consumer),
}

/// What a finished worker hands back to whoever joined it.
#[derive(Debug)]
pub enum WorkerOutput {
    Run(RunReport),
    Produced(ProducerSummary),
    Drained(ThroughputReport),
}

impl Worker {
    pub fn role(&self) -> &'static str {
        match self {
            Worker::Monitor(_) => "monitor",
            Worker::Producer(_) => "producer",
            Worker::Consumer(_) => "consumer",
        }
    }

    /// Boxed so the monitor can spawn workers from inside its own run.
    pub fn run(self) -> BoxFuture<'static, HarnessResult<WorkerOutput>> {
        match self {
            Worker::Monitor(monitor) => async move { monitor.run().await.map(WorkerOutput::Run) }.boxed(),
            Worker::Producer(producer) => {
                async move { Ok(WorkerOutput::Produced(producer.run().await)) }.boxed()
            }
            Worker::Consumer(consumer) => {
                async move { consumer.run().await.map(WorkerOutput::Drained) }.boxed()
            }
        }
    }

    /// Run on its own task inside a `worker` span.
    pub fn spawn(self) -> JoinHandle<HarnessResult<WorkerOutput>> {
        let index = match &self {
            Worker::Producer(p) => Some(p.index),
            _ => None,
        };
        let span = tracing::info_span!("worker", role = self.role(), index = index);
        tokio::spawn(self.run().instrument(span))
    }
}

impl WorkerOutput {
    pub fn into_summary(self) -> HarnessResult<ProducerSummary> {
        match self {
            WorkerOutput::Produced(summary) => Ok(summary),
            _ => Err(HarnessError::UnexpectedOutput { role: "producer" }),
        }
    }

    pub fn into_throughput(self) -> HarnessResult<ThroughputReport> {
        match self {
            WorkerOutput::Drained(report) => Ok(report),
            _ => Err(HarnessError::UnexpectedOutput { role: "consumer" }),
        }
    }

    pub fn into_run(self) -> HarnessResult<RunReport> {
        match self {
            WorkerOutput::Run(report) => Ok(report),
            _ => Err(HarnessError::UnexpectedOutput { role: "monitor" }),
        }
    }
}

/// Await a spawned worker, mapping a panic to [`HarnessError::WorkerPanicked`].
pub async fn join(
    role: &'static str,
    handle: JoinHandle<HarnessResult<WorkerOutput>>,
) -> HarnessResult<WorkerOutput> {
    match handle.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(role = role, error = %e, "Worker task failed");
            Err(HarnessError::WorkerPanicked { role })
        }
    }
}
