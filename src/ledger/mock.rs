//! Deterministic in-memory ledger for tests and offline runs.
//!
//! Implements both [`LedgerTransport`] and [`TransportFactory`], so the same
//! instance can stand in for a node and for the connection factory. Every
//! "connection" is a clone sharing one operation table.
//!
//! Behaviour knobs:
//! - scripted submit prechecks and scripted query prechecks (consumed in order)
//! - scripted transport failures (consumed by the next call of any kind)
//! - probabilistic `BUSY` injection on submissions
//! - receipts stay `UNKNOWN` for `confirm_after` observations
//! - an optional forced final status

use alloy::primitives::{keccak256, Bytes};
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::ledger::http::{RecordRequest, SubmitResponse};
use crate::ledger::transport::{
    Endpoint, LedgerTransport, TransportError, TransportFactory, TransportResult,
    UnavailableReason,
};
use crate::ledger::types::{
    AccountId, ContractCallPayload, CreateAccountPayload, CreateContractPayload, DetailedRecord,
    EntityId, OperationId, OperationKind, OperationRequest, QueryMode, Receipt, ReceiptResponse,
    RecordResponse, ResponseCode, Transfer, TransferPayload, UploadFilePayload,
};

/// Payer account used by offline runs against the mock.
pub const MOCK_PAYER: AccountId = AccountId::new(0, 0, 2);

/// Tunables of the mock ledger.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Probability in `[0, 1]` that a submission is answered `BUSY`.
    pub busy_ratio: f64,
    /// Receipt/record observations answered `UNKNOWN` before the final status.
    pub confirm_after: u32,
    /// Final status of every accepted operation.
    pub final_status: ResponseCode,
    /// Price of an `ANSWER_ONLY` record query.
    pub record_cost: u64,
    /// Fee charged for processing any operation.
    pub operation_fee: u64,
    /// Added latency on every submission.
    pub submit_latency: Duration,
    /// First entity number handed out to created entities.
    pub first_entity: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            busy_ratio: 0.0,
            confirm_after: 0,
            final_status: ResponseCode::Success,
            record_cost: 25,
            operation_fee: 100,
            submit_latency: Duration::ZERO,
            first_entity: 1001,
        }
    }
}

/// Snapshot of the mock's call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MockStats {
    pub submissions: u64,
    pub accepted: u64,
    pub receipt_polls: u64,
    pub cost_queries: u64,
    pub answer_queries: u64,
    pub connects: u64,
}

#[derive(Debug)]
struct StoredOperation {
    request: OperationRequest,
    created: Option<EntityId>,
    observations: u32,
}

#[derive(Debug, Default)]
struct Counters {
    submissions: AtomicU64,
    accepted: AtomicU64,
    receipt_polls: AtomicU64,
    cost_queries: AtomicU64,
    answer_queries: AtomicU64,
    connects: AtomicU64,
}

#[derive(Debug)]
struct Inner {
    config: MockConfig,
    operations: DashMap<OperationId, StoredOperation>,
    submit_script: Mutex<VecDeque<ResponseCode>>,
    query_script: Mutex<VecDeque<ResponseCode>>,
    failure_script: Mutex<VecDeque<TransportError>>,
    down: AtomicBool,
    next_entity: AtomicU64,
    counters: Counters,
}

/// Shared handle to one in-memory ledger.
#[derive(Debug, Clone)]
pub struct MockLedger {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockLedger {
    pub fn new(config: MockConfig) -> Self {
        let first_entity = config.first_entity;
        Self {
            inner: Arc::new(Inner {
                config,
                operations: DashMap::new(),
                submit_script: Mutex::new(VecDeque::new()),
                query_script: Mutex::new(VecDeque::new()),
                failure_script: Mutex::new(VecDeque::new()),
                down: AtomicBool::new(false),
                next_entity: AtomicU64::new(first_entity),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &MockConfig {
        &self.inner.config
    }

    /// Answer the next submissions with these prechecks, in order, before
    /// normal processing resumes. A scripted `OK` falls through to normal
    /// processing.
    pub fn script_submits(&self, codes: impl IntoIterator<Item = ResponseCode>) {
        lock(&self.inner.submit_script).extend(codes);
    }

    /// Answer the next receipt/record queries with these prechecks.
    pub fn script_queries(&self, codes: impl IntoIterator<Item = ResponseCode>) {
        lock(&self.inner.query_script).extend(codes);
    }

    /// Fail the next calls (of any kind) with these errors.
    pub fn script_failures(&self, errors: impl IntoIterator<Item = TransportError>) {
        lock(&self.inner.failure_script).extend(errors);
    }

    /// While down, connects and calls are refused.
    pub fn set_down(&self, down: bool) {
        self.inner.down.store(down, Ordering::SeqCst);
    }

    pub fn stats(&self) -> MockStats {
        let c = &self.inner.counters;
        MockStats {
            submissions: c.submissions.load(Ordering::Relaxed),
            accepted: c.accepted.load(Ordering::Relaxed),
            receipt_polls: c.receipt_polls.load(Ordering::Relaxed),
            cost_queries: c.cost_queries.load(Ordering::Relaxed),
            answer_queries: c.answer_queries.load(Ordering::Relaxed),
            connects: c.connects.load(Ordering::Relaxed),
        }
    }

    /// Number of operations accepted so far.
    pub fn operation_count(&self) -> usize {
        self.inner.operations.len()
    }

    fn injected_failure(&self) -> TransportResult<()> {
        if self.inner.down.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable(UnavailableReason::Refused));
        }
        match lock(&self.inner.failure_script).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn scripted_query(&self) -> Option<ResponseCode> {
        lock(&self.inner.query_script).pop_front()
    }

    fn process_submit(&self, request: &OperationRequest) -> ResponseCode {
        if let Some(code) = lock(&self.inner.submit_script).pop_front() {
            if code != ResponseCode::Ok {
                return code;
            }
        }

        let ratio = self.inner.config.busy_ratio;
        if ratio > 0.0 && fastrand::f64() < ratio {
            return ResponseCode::Busy;
        }

        if request.signature.is_empty() {
            return ResponseCode::InvalidSignature;
        }

        let creates = match validate_payload(request) {
            Ok(creates) => creates,
            Err(code) => return code,
        };

        match self.inner.operations.entry(request.id()) {
            Entry::Occupied(_) => ResponseCode::DuplicateTransaction,
            Entry::Vacant(slot) => {
                let created = creates.then(|| {
                    let num = self.inner.next_entity.fetch_add(1, Ordering::SeqCst);
                    EntityId::new(0, 0, num)
                });
                slot.insert(StoredOperation {
                    request: request.clone(),
                    created,
                    observations: 0,
                });
                self.inner.counters.accepted.fetch_add(1, Ordering::Relaxed);
                ResponseCode::Ok
            }
        }
    }

    /// Observe an operation once; returns its receipt at this point.
    fn observe(&self, id: &OperationId) -> Option<Receipt> {
        let mut op = self.inner.operations.get_mut(id)?;
        op.observations = op.observations.saturating_add(1);
        if op.observations <= self.inner.config.confirm_after {
            return Some(Receipt::unknown());
        }
        Some(Receipt {
            status: self.inner.config.final_status,
            created: op.created,
        })
    }

    fn build_record(&self, id: &OperationId, receipt: Receipt) -> Option<DetailedRecord> {
        let op = self.inner.operations.get(id)?;
        let fee = self.inner.config.operation_fee;
        let final_status = receipt.status;
        let pending = final_status == ResponseCode::Unknown;

        let call_result = match op.request.payload::<ContractCallPayload>() {
            Ok(call) if op.request.kind() == OperationKind::CallContract && !pending => {
                Some(Bytes::from(keccak256(&call.call_data).to_vec()))
            }
            _ => None,
        };
        let error_message = (final_status == ResponseCode::ContractRevertExecuted)
            .then(|| "execution reverted".to_string());

        Some(DetailedRecord {
            id: *id,
            receipt,
            consensus_timestamp: (!pending).then(|| id.valid_start.plus_seconds(1)),
            fee_charged: if pending { 0 } else { fee },
            memo: op.request.body.memo.clone(),
            call_result,
            error_message,
            transfers: if pending {
                Vec::new()
            } else {
                vec![
                    Transfer {
                        account: id.payer,
                        amount: -(fee as i64),
                    },
                    Transfer {
                        account: op.request.body.node,
                        amount: fee as i64,
                    },
                ]
            },
        })
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

/// Decode the payload for its kind. `Ok(true)` when the operation creates an entity.
fn validate_payload(request: &OperationRequest) -> Result<bool, ResponseCode> {
    let decoded = match request.kind() {
        OperationKind::CreateAccount => request.payload::<CreateAccountPayload>().map(|_| true),
        OperationKind::Transfer => request.payload::<TransferPayload>().map(|_| false),
        OperationKind::UploadFile => request.payload::<UploadFilePayload>().map(|_| true),
        OperationKind::CreateContract => request.payload::<CreateContractPayload>().map(|_| true),
        OperationKind::CallContract => request.payload::<ContractCallPayload>().map(|_| false),
    };
    decoded.map_err(|_| ResponseCode::InvalidTransactionBody)
}

fn payment_amount(payment: &OperationRequest) -> Option<u64> {
    if payment.kind() != OperationKind::Transfer || payment.signature.is_empty() {
        return None;
    }
    payment.payload::<TransferPayload>().ok().map(|p| p.amount)
}

#[async_trait]
impl LedgerTransport for MockLedger {
    async fn submit(&self, request: &OperationRequest) -> TransportResult<ResponseCode> {
        if !self.inner.config.submit_latency.is_zero() {
            tokio::time::sleep(self.inner.config.submit_latency).await;
        }
        self.injected_failure()?;
        self.inner.counters.submissions.fetch_add(1, Ordering::Relaxed);
        Ok(self.process_submit(request))
    }

    async fn poll_receipt(&self, id: &OperationId) -> TransportResult<ReceiptResponse> {
        self.injected_failure()?;
        self.inner.counters.receipt_polls.fetch_add(1, Ordering::Relaxed);

        if let Some(code) = self.scripted_query() {
            return Ok(ReceiptResponse {
                precheck: code,
                receipt: Receipt::unknown(),
            });
        }

        Ok(match self.observe(id) {
            Some(receipt) => ReceiptResponse {
                precheck: ResponseCode::Ok,
                receipt,
            },
            None => ReceiptResponse {
                precheck: ResponseCode::ReceiptNotFound,
                receipt: Receipt::unknown(),
            },
        })
    }

    async fn get_record(
        &self,
        id: &OperationId,
        payment: &OperationRequest,
        mode: QueryMode,
    ) -> TransportResult<RecordResponse> {
        self.injected_failure()?;
        let counter = match mode {
            QueryMode::CostAnswer => &self.inner.counters.cost_queries,
            QueryMode::AnswerOnly => &self.inner.counters.answer_queries,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let cost = self.inner.config.record_cost;
        let rejected = |precheck| RecordResponse {
            precheck,
            cost,
            record: None,
        };

        if let Some(code) = self.scripted_query() {
            return Ok(rejected(code));
        }

        let Some(paid) = payment_amount(payment) else {
            return Ok(rejected(ResponseCode::InvalidTransactionBody));
        };

        match mode {
            QueryMode::CostAnswer => Ok(RecordResponse {
                precheck: ResponseCode::Ok,
                cost,
                record: None,
            }),
            QueryMode::AnswerOnly if paid < cost => Ok(rejected(ResponseCode::InsufficientTxFee)),
            QueryMode::AnswerOnly => {
                let record = self
                    .observe(id)
                    .and_then(|receipt| self.build_record(id, receipt));
                Ok(match record {
                    Some(record) => RecordResponse {
                        precheck: ResponseCode::Ok,
                        cost,
                        record: Some(record),
                    },
                    None => rejected(ResponseCode::RecordNotFound),
                })
            }
        }
    }
}

impl TransportFactory for MockLedger {
    fn connect(&self, endpoint: &Endpoint) -> TransportResult<Arc<dyn LedgerTransport>> {
        if self.inner.down.load(Ordering::SeqCst) {
            tracing::warn!(endpoint = %endpoint, "Mock ledger is down, refusing connection");
            return Err(TransportError::Unavailable(UnavailableReason::Refused));
        }
        self.inner.counters.connects.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(self.clone()))
    }
}

// ---------------------------------------------------------------------------
// HTTP surface

/// Router serving the JSON-over-HTTP routes backed by `ledger`.
pub fn router(ledger: MockLedger) -> Router {
    Router::new()
        .route("/v1/operations", post(submit_handler))
        .route("/v1/operations/{id}/receipt", get(receipt_handler))
        .route("/v1/operations/{id}/record", post(record_handler))
        .route("/v1/stats", get(stats_handler))
        .with_state(ledger)
}

fn error_response(err: TransportError) -> Response {
    match err {
        TransportError::Unavailable(reason) => {
            (StatusCode::SERVICE_UNAVAILABLE, reason.to_string()).into_response()
        }
        TransportError::Malformed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
    }
}

fn parse_id(raw: &str) -> Result<OperationId, Response> {
    raw.parse::<OperationId>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()).into_response())
}

async fn submit_handler(
    State(ledger): State<MockLedger>,
    Json(request): Json<OperationRequest>,
) -> Response {
    match ledger.submit(&request).await {
        Ok(precheck) => {
            tracing::debug!(id = %request.id(), precheck = %precheck, "Submission");
            Json(SubmitResponse { precheck }).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn receipt_handler(State(ledger): State<MockLedger>, Path(raw): Path<String>) -> Response {
    let id = match parse_id(&raw) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match ledger.poll_receipt(&id).await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(err) => error_response(err),
    }
}

async fn record_handler(
    State(ledger): State<MockLedger>,
    Path(raw): Path<String>,
    Json(body): Json<RecordRequest>,
) -> Response {
    let id = match parse_id(&raw) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match ledger.get_record(&id, &body.payment, body.mode).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => error_response(err),
    }
}

async fn stats_handler(State(ledger): State<MockLedger>) -> Json<MockStats> {
    Json(ledger.stats())
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::{builder, endpoint};
    use crate::ledger::builder::OperationBuilder;

    fn create_account(b: &OperationBuilder) -> OperationRequest {
        test_support::create_account(b, 100)
    }

    #[tokio::test]
    async fn test_submit_then_receipt() {
        let ledger = MockLedger::new(MockConfig {
            confirm_after: 2,
            ..MockConfig::default()
        });
        let b = builder();
        let request = create_account(&b);

        assert_eq!(ledger.submit(&request).await.unwrap(), ResponseCode::Ok);

        for _ in 0..2 {
            let resp = ledger.poll_receipt(&request.id()).await.unwrap();
            assert_eq!(resp.receipt.status, ResponseCode::Unknown);
        }
        let resp = ledger.poll_receipt(&request.id()).await.unwrap();
        assert_eq!(resp.receipt.status, ResponseCode::Success);
        assert_eq!(resp.receipt.created, Some(EntityId::new(0, 0, 1001)));
        assert_eq!(ledger.stats().receipt_polls, 3);
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let ledger = MockLedger::default();
        let request = create_account(&builder());
        assert_eq!(ledger.submit(&request).await.unwrap(), ResponseCode::Ok);
        assert_eq!(
            ledger.submit(&request).await.unwrap(),
            ResponseCode::DuplicateTransaction
        );
        assert_eq!(ledger.operation_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_busy_then_normal() {
        let ledger = MockLedger::default();
        ledger.script_submits([ResponseCode::Busy, ResponseCode::Busy]);
        let request = create_account(&builder());
        assert_eq!(ledger.submit(&request).await.unwrap(), ResponseCode::Busy);
        assert_eq!(ledger.submit(&request).await.unwrap(), ResponseCode::Busy);
        assert_eq!(ledger.submit(&request).await.unwrap(), ResponseCode::Ok);
        assert_eq!(ledger.stats().submissions, 3);
        assert_eq!(ledger.stats().accepted, 1);
    }

    #[tokio::test]
    async fn test_unknown_receipt_is_not_found() {
        let ledger = MockLedger::default();
        let id = builder().payment(1).unwrap().id();
        let resp = ledger.poll_receipt(&id).await.unwrap();
        assert_eq!(resp.precheck, ResponseCode::ReceiptNotFound);
    }

    #[tokio::test]
    async fn test_record_requires_cost() {
        let ledger = MockLedger::default();
        let b = builder();
        let request = create_account(&b);
        ledger.submit(&request).await.unwrap();

        let cost = ledger
            .get_record(&request.id(), &b.payment(100).unwrap(), QueryMode::CostAnswer)
            .await
            .unwrap();
        assert_eq!(cost.precheck, ResponseCode::Ok);
        assert_eq!(cost.cost, 25);
        assert!(cost.record.is_none());

        let short = ledger
            .get_record(&request.id(), &b.payment(24).unwrap(), QueryMode::AnswerOnly)
            .await
            .unwrap();
        assert_eq!(short.precheck, ResponseCode::InsufficientTxFee);

        let paid = ledger
            .get_record(&request.id(), &b.payment(25).unwrap(), QueryMode::AnswerOnly)
            .await
            .unwrap();
        let record = paid.record.unwrap();
        assert_eq!(record.receipt.status, ResponseCode::Success);
        assert_eq!(record.fee_charged, 100);
        assert_eq!(record.transfers.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_script_and_down() {
        let ledger = MockLedger::default();
        ledger.script_failures([TransportError::Unavailable(UnavailableReason::AgeOut)]);
        let request = create_account(&builder());
        assert_eq!(
            ledger.submit(&request).await,
            Err(TransportError::Unavailable(UnavailableReason::AgeOut))
        );
        assert_eq!(ledger.submit(&request).await, Ok(ResponseCode::Ok));

        ledger.set_down(true);
        let endpoint = endpoint();
        assert!(ledger.connect(&endpoint).is_err());
        ledger.set_down(false);
        assert!(ledger.connect(&endpoint).is_ok());
        assert_eq!(ledger.stats().connects, 1);
    }

    #[tokio::test]
    async fn test_forced_final_status() {
        let ledger = MockLedger::new(MockConfig {
            final_status: ResponseCode::InsufficientPayerBalance,
            ..MockConfig::default()
        });
        let request = create_account(&builder());
        ledger.submit(&request).await.unwrap();
        let resp = ledger.poll_receipt(&request.id()).await.unwrap();
        assert_eq!(resp.receipt.status, ResponseCode::InsufficientPayerBalance);
    }

    #[tokio::test]
    async fn test_invalid_payload_rejected() {
        let ledger = MockLedger::default();
        let b = builder();
        let bogus = b
            .build(OperationKind::CallContract, &"not a call", 1, "")
            .unwrap();
        assert_eq!(
            ledger.submit(&bogus).await.unwrap(),
            ResponseCode::InvalidTransactionBody
        );
    }
}
