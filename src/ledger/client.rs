//! Submission client: submit, confirm, and fetch records over one connection.
//!
//! # Responsibilities
//! - Submit a signed request, retrying `BUSY` and transient unavailability
//! - Poll for the asynchronous receipt until it is final or the poll budget runs out
//! - Fetch the fee-gated detailed record with a cost-then-answer query
//! - Reopen the connection when the endpoint drops or ages it out
//!
//! # Design Decisions
//! - Exhausted budgets return the last status as data, not an error
//! - `Err` is reserved for failures the caller cannot act on by waiting
//!   (connection refused, reconnect failed, malformed answers, rejected queries)
//! - One client per worker; clients are never shared across tasks

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::ledger::builder::{BuilderError, OperationBuilder};
use crate::ledger::transport::{
    Endpoint, LedgerTransport, TransportError, TransportFactory, TransportOutcome,
};
use crate::ledger::types::{
    Confirmation, DetailedRecord, OperationId, OperationRequest, QueryMode, RecordResponse,
    ResponseCode,
};
use crate::observability::metrics;
use crate::resilience::{PollPolicy, RetryDecision, RetryPolicy};

/// Errors raised by the submission client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("could not build query payment: {0}")]
    Payment(#[from] BuilderError),

    #[error("{mode} query rejected with {code}")]
    QueryRejected { mode: QueryMode, code: ResponseCode },

    #[error("record for {id} still pending after {attempts} attempts")]
    RecordPending { id: OperationId, attempts: u32 },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Tunables for one client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientPolicy {
    pub retry: RetryPolicy,
    pub receipt: PollPolicy,
    /// Re-fetch schedule while a record's receipt is still `UNKNOWN`.
    pub record: PollPolicy,
    /// Payment attached to the `COST_ANSWER` probe.
    pub probe_fee: u64,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            receipt: PollPolicy::fixed(Duration::from_millis(500), 120),
            record: PollPolicy::fixed(Duration::from_millis(300), 60),
            probe_fee: 100_000,
        }
    }
}

/// Result of [`SubmissionClient::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub id: OperationId,
    /// Outcome of the last attempt.
    pub outcome: TransportOutcome,
    /// Number of times the request was sent.
    pub attempts: u32,
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        self.outcome.is_accepted()
    }
}

/// Result of [`SubmissionClient::submit_and_confirm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedSubmission {
    pub submission: Submission,
    /// `None` when the submission was not accepted.
    pub confirmation: Option<Confirmation>,
}

/// Client bound to one ledger node through one connection.
pub struct SubmissionClient {
    endpoint: Endpoint,
    factory: Arc<dyn TransportFactory>,
    transport: Arc<dyn LedgerTransport>,
    policy: ClientPolicy,
}

impl fmt::Debug for SubmissionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionClient")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SubmissionClient {
    /// Open a connection to `endpoint`.
    pub fn connect(
        endpoint: Endpoint,
        factory: Arc<dyn TransportFactory>,
        policy: ClientPolicy,
    ) -> ClientResult<Self> {
        let transport = open(&endpoint, factory.as_ref())?;
        Ok(Self {
            endpoint,
            factory,
            transport,
            policy,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn policy(&self) -> &ClientPolicy {
        &self.policy
    }

    /// Drop the current connection and open a new one.
    pub fn reconnect(&mut self) -> ClientResult<()> {
        tracing::info!(endpoint = %self.endpoint, "Reconnecting");
        self.transport = open(&self.endpoint, self.factory.as_ref())?;
        metrics::record_reconnect();
        Ok(())
    }

    /// Send `request`, retrying under the retry policy.
    ///
    /// On exhaustion the last outcome is returned, which may still be `Busy`.
    /// A `DUPLICATE_TRANSACTION` answer to a resend made after a reconnect
    /// means the node took the earlier copy, so it counts as accepted.
    pub async fn submit(&mut self, request: &OperationRequest) -> ClientResult<Submission> {
        let id = request.id();
        let mut attempt = 0;
        let mut reconnected = false;

        loop {
            let mut outcome = TransportOutcome::from(self.transport.submit(request).await);
            if reconnected && outcome == TransportOutcome::Fatal(ResponseCode::DuplicateTransaction)
            {
                tracing::info!(
                    id = %id,
                    attempts = attempt + 1,
                    "Resend already known to the node, treating as accepted"
                );
                outcome = TransportOutcome::Accepted;
            }
            metrics::record_submission(outcome.label());

            match self.policy.retry.decide(&outcome, attempt) {
                RetryDecision::Stop => {
                    if outcome.is_accepted() {
                        tracing::debug!(id = %id, attempts = attempt + 1, "Submission accepted");
                    } else {
                        tracing::warn!(
                            id = %id,
                            outcome = %outcome,
                            attempts = attempt + 1,
                            "Submission not accepted"
                        );
                    }
                    return Ok(Submission {
                        id,
                        outcome,
                        attempts: attempt + 1,
                    });
                }
                RetryDecision::Retry { delay, reconnect } => {
                    metrics::record_submit_retry(outcome.label());
                    tracing::debug!(
                        id = %id,
                        outcome = %outcome,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying submission"
                    );
                    sleep(delay).await;
                    if reconnect {
                        self.reconnect()?;
                        reconnected = true;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Poll the receipt of `id` until it is final or the poll budget is spent.
    ///
    /// `Pending` and `Busy` answers are treated alike. On exhaustion the last
    /// non-terminal confirmation is returned.
    pub async fn await_confirmation(&mut self, id: &OperationId) -> ClientResult<Confirmation> {
        let policy = self.policy.receipt;
        let started = Instant::now();
        let mut last = Confirmation::Pending;

        for attempt in 0..policy.max_attempts {
            let delay = policy.delay(attempt);
            if !delay.is_zero() {
                sleep(delay).await;
            }

            match self.transport.poll_receipt(id).await {
                Ok(response) => {
                    let confirmation = Confirmation::from_response(response);
                    if confirmation.is_terminal() {
                        log_confirmation(id, &confirmation, attempt + 1, started.elapsed());
                        return Ok(confirmation);
                    }
                    last = confirmation;
                }
                Err(TransportError::Unavailable(reason)) if reason.is_retryable() => {
                    tracing::warn!(id = %id, reason = %reason, "Receipt poll failed, reconnecting");
                    self.reconnect()?;
                }
                Err(e) => {
                    metrics::record_confirmation("error", started.elapsed());
                    return Err(e.into());
                }
            }
        }

        log_confirmation(id, &last, policy.max_attempts, started.elapsed());
        Ok(last)
    }

    /// Fetch the detailed record of `id`, paying from `payer`.
    ///
    /// Phase one asks what the answer costs; phase two pays exactly that. A
    /// record whose receipt is still `UNKNOWN` is fetched again under the
    /// record poll policy.
    pub async fn fetch_detailed_record(
        &mut self,
        id: &OperationId,
        payer: &OperationBuilder,
    ) -> ClientResult<DetailedRecord> {
        let probe = self
            .query_record(id, payer, self.policy.probe_fee, QueryMode::CostAnswer)
            .await?;
        let cost = probe.cost;
        tracing::debug!(id = %id, cost = cost, "Record cost");

        let policy = self.policy.record;
        for attempt in 0..policy.max_attempts {
            let delay = policy.delay(attempt);
            if !delay.is_zero() {
                sleep(delay).await;
            }

            let answer = self
                .query_record(id, payer, cost, QueryMode::AnswerOnly)
                .await?;
            let record = answer.record.ok_or_else(|| {
                TransportError::Malformed(format!("answer for {} carries no record", id))
            })?;
            if record.receipt.status != ResponseCode::Unknown {
                return Ok(record);
            }
            tracing::debug!(id = %id, attempt = attempt + 1, "Record not final yet");
        }

        Err(ClientError::RecordPending {
            id: *id,
            attempts: policy.max_attempts,
        })
    }

    /// Submit, and if accepted, wait for the receipt.
    pub async fn submit_and_confirm(
        &mut self,
        request: &OperationRequest,
    ) -> ClientResult<ConfirmedSubmission> {
        let submission = self.submit(request).await?;
        let confirmation = if submission.is_accepted() {
            Some(self.await_confirmation(&submission.id).await?)
        } else {
            None
        };
        Ok(ConfirmedSubmission {
            submission,
            confirmation,
        })
    }

    /// One paid query with `BUSY` and transient failures retried under the
    /// submit retry budget. Each attempt carries a freshly built payment.
    async fn query_record(
        &mut self,
        id: &OperationId,
        payer: &OperationBuilder,
        fee: u64,
        mode: QueryMode,
    ) -> ClientResult<RecordResponse> {
        let mut attempt = 0;

        loop {
            let payment = payer.payment(fee)?;
            metrics::record_record_query(mode.as_str());
            let result = self.transport.get_record(id, &payment, mode).await;

            let outcome = match &result {
                Ok(response) => TransportOutcome::from(Ok(response.precheck)),
                Err(e) => TransportOutcome::from(Err(e.clone())),
            };
            if outcome.is_accepted() {
                return result.map_err(ClientError::from);
            }

            match self.policy.retry.decide(&outcome, attempt) {
                RetryDecision::Stop => {
                    return Err(match result {
                        Ok(response) => ClientError::QueryRejected {
                            mode,
                            code: response.precheck,
                        },
                        Err(e) => e.into(),
                    });
                }
                RetryDecision::Retry { delay, reconnect } => {
                    tracing::debug!(
                        id = %id,
                        mode = %mode,
                        outcome = %outcome,
                        "Retrying record query"
                    );
                    sleep(delay).await;
                    if reconnect {
                        self.reconnect()?;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

fn open(
    endpoint: &Endpoint,
    factory: &dyn TransportFactory,
) -> ClientResult<Arc<dyn LedgerTransport>> {
    factory.connect(endpoint).map_err(|source| ClientError::Connect {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn log_confirmation(id: &OperationId, confirmation: &Confirmation, attempts: u32, elapsed: Duration) {
    metrics::record_confirmation(confirmation.label(), elapsed);
    if confirmation.is_success() {
        tracing::info!(
            id = %id,
            status = confirmation.label(),
            attempts = attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "Receipt final"
        );
    } else {
        tracing::warn!(
            id = %id,
            status = confirmation.label(),
            attempts = attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "Receipt not successful"
        );
    }
}
