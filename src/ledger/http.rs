//! JSON-over-HTTP transport.
//!
//! # Routes
//! ```text
//! POST /v1/operations                  OperationRequest          → { "precheck": code }
//! GET  /v1/operations/{id}/receipt                               → ReceiptResponse
//! POST /v1/operations/{id}/record      { payment, mode }         → RecordResponse
//! ```
//!
//! # Error mapping
//! - request timeout → `Deadline`
//! - connect failure → `Refused`
//! - HTTP 503 → `AgeOut` (node rotated the connection out)
//! - other I/O failure → `Reset`
//! - undecodable body or any other non-2xx status → `Malformed`

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use crate::ledger::transport::{
    Endpoint, LedgerTransport, TransportError, TransportFactory, TransportResult,
    UnavailableReason,
};
use crate::ledger::types::{
    OperationId, OperationRequest, QueryMode, ReceiptResponse, RecordResponse, ResponseCode,
};

/// Body of a submission answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub precheck: ResponseCode,
}

/// Body of a record query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRequest {
    pub payment: OperationRequest,
    pub mode: QueryMode,
}

/// One HTTP connection pool to a single node.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(endpoint: &Endpoint) -> TransportResult<Self> {
        let base = Url::parse(&endpoint.base_url())
            .map_err(|e| TransportError::Malformed(format!("invalid endpoint URL: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(endpoint.request_timeout)
            .connect_timeout(endpoint.request_timeout)
            .build()
            .map_err(|e| TransportError::Malformed(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self { client, base })
    }

    fn url(&self, path: &str) -> TransportResult<Url> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Malformed(format!("invalid path {}: {}", path, e)))
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> TransportResult<T> {
        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(TransportError::Unavailable(UnavailableReason::AgeOut));
        }
        if !status.is_success() {
            return Err(TransportError::Malformed(format!("unexpected status {}", status)));
        }
        response.json::<T>().await.map_err(classify)
    }
}

/// Map a reqwest failure onto a transport error.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Unavailable(UnavailableReason::Deadline)
    } else if err.is_connect() {
        TransportError::Unavailable(UnavailableReason::Refused)
    } else if err.is_decode() {
        TransportError::Malformed(err.to_string())
    } else {
        TransportError::Unavailable(UnavailableReason::Reset)
    }
}

#[async_trait]
impl LedgerTransport for HttpTransport {
    async fn submit(&self, request: &OperationRequest) -> TransportResult<ResponseCode> {
        let response = self
            .client
            .post(self.url("v1/operations")?)
            .json(request)
            .send()
            .await
            .map_err(classify)?;
        let body: SubmitResponse = Self::read_json(response).await?;
        Ok(body.precheck)
    }

    async fn poll_receipt(&self, id: &OperationId) -> TransportResult<ReceiptResponse> {
        let response = self
            .client
            .get(self.url(&format!("v1/operations/{}/receipt", id))?)
            .send()
            .await
            .map_err(classify)?;
        Self::read_json(response).await
    }

    async fn get_record(
        &self,
        id: &OperationId,
        payment: &OperationRequest,
        mode: QueryMode,
    ) -> TransportResult<RecordResponse> {
        let body = RecordRequest {
            payment: payment.clone(),
            mode,
        };
        let response = self
            .client
            .post(self.url(&format!("v1/operations/{}/record", id))?)
            .json(&body)
            .send()
            .await
            .map_err(classify)?;
        Self::read_json(response).await
    }
}

/// Opens a fresh [`HttpTransport`] (new connection pool) per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn connect(&self, endpoint: &Endpoint) -> TransportResult<Arc<dyn LedgerTransport>> {
        tracing::debug!(endpoint = %endpoint, "Opening HTTP transport");
        Ok(Arc::new(HttpTransport::new(endpoint)?))
    }
}
