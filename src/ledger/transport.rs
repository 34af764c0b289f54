//! The RPC boundary to the ledger service.
//!
//! # Responsibilities
//! - Define the three logical calls (submit, poll receipt, paid record query)
//! - Classify transport failures into typed reasons instead of error strings
//! - Define the connection factory used to (re)open a worker's connection

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::ledger::types::{
    AccountId, OperationId, OperationRequest, QueryMode, ReceiptResponse, RecordResponse,
    ResponseCode,
};

/// Why the endpoint could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnavailableReason {
    /// The endpoint rotated or closed an aged connection; a new one will work.
    AgeOut,
    /// The connection dropped mid-request.
    Reset,
    /// The request ran past its deadline.
    Deadline,
    /// Nothing is listening; the server is down.
    Refused,
}

impl UnavailableReason {
    /// Whether a fresh connection and another attempt can help.
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::Refused)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AgeOut => "age_out",
            Self::Reset => "reset",
            Self::Deadline => "deadline",
            Self::Refused => "refused",
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint could not serve the call.
    #[error("endpoint unavailable ({0})")]
    Unavailable(UnavailableReason),

    /// The endpoint answered with something that is not a valid response.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// Classified result of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOutcome {
    /// Precheck `OK`: the ledger will process the operation.
    Accepted,
    /// Precheck `BUSY`: transient overload.
    Busy,
    /// The call never reached a precheck.
    Unavailable(UnavailableReason),
    /// Any other precheck; retrying will not change it.
    Fatal(ResponseCode),
}

impl TransportOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted => "OK",
            Self::Busy => "BUSY",
            Self::Unavailable(reason) => reason.as_str(),
            Self::Fatal(code) => code.as_str(),
        }
    }
}

impl From<TransportResult<ResponseCode>> for TransportOutcome {
    fn from(result: TransportResult<ResponseCode>) -> Self {
        match result {
            Ok(ResponseCode::Ok) => Self::Accepted,
            Ok(ResponseCode::Busy) => Self::Busy,
            Ok(code) => Self::Fatal(code),
            Err(TransportError::Unavailable(reason)) => Self::Unavailable(reason),
            Err(TransportError::Malformed(_)) => Self::Fatal(ResponseCode::Unrecognized),
        }
    }
}

impl fmt::Display for TransportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Address of one ledger node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Node account that requests are addressed to and queries pay.
    pub node_account: AccountId,
    /// Per-call deadline.
    pub request_timeout: Duration,
}

impl Endpoint {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (node {})", self.host, self.port, self.node_account)
    }
}

/// One open connection to a ledger node.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Send a signed mutating request; returns its synchronous precheck.
    async fn submit(&self, request: &OperationRequest) -> TransportResult<ResponseCode>;

    /// Read the current receipt of an operation. Free and idempotent.
    async fn poll_receipt(&self, id: &OperationId) -> TransportResult<ReceiptResponse>;

    /// Paid query for an operation's detailed record.
    async fn get_record(
        &self,
        id: &OperationId,
        payment: &OperationRequest,
        mode: QueryMode,
    ) -> TransportResult<RecordResponse>;
}

/// Opens connections; called again whenever a worker has to reconnect.
pub trait TransportFactory: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> TransportResult<Arc<dyn LedgerTransport>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        assert_eq!(TransportOutcome::from(Ok(ResponseCode::Ok)), TransportOutcome::Accepted);
        assert_eq!(TransportOutcome::from(Ok(ResponseCode::Busy)), TransportOutcome::Busy);
        assert_eq!(
            TransportOutcome::from(Ok(ResponseCode::InvalidSignature)),
            TransportOutcome::Fatal(ResponseCode::InvalidSignature)
        );
        assert_eq!(
            TransportOutcome::from(Err(TransportError::Unavailable(UnavailableReason::AgeOut))),
            TransportOutcome::Unavailable(UnavailableReason::AgeOut)
        );
        assert_eq!(
            TransportOutcome::from(Err(TransportError::Malformed("junk".into()))),
            TransportOutcome::Fatal(ResponseCode::Unrecognized)
        );
    }

    #[test]
    fn test_refused_is_not_retryable() {
        assert!(!UnavailableReason::Refused.is_retryable());
        assert!(UnavailableReason::AgeOut.is_retryable());
        assert!(UnavailableReason::Reset.is_retryable());
        assert!(UnavailableReason::Deadline.is_retryable());
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = Endpoint {
            host: "127.0.0.1".into(),
            port: 50211,
            node_account: AccountId::new(0, 0, 3),
            request_timeout: Duration::from_secs(5),
        };
        assert_eq!(endpoint.base_url(), "http://127.0.0.1:50211");
        assert!(endpoint.to_string().contains("0.0.3"));
    }
}
