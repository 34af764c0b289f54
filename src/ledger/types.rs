//! Ledger data model: identifiers, signed requests, status codes, receipts and records.

use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Identifier of a ledger entity (account, file or contract), written `shard.realm.num`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

/// Accounts are plain entities; the alias keeps signatures readable.
pub type AccountId = EntityId;

impl EntityId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

/// Error parsing an identifier from its text form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {what} '{input}'")]
pub struct ParseIdError {
    what: &'static str,
    input: String,
}

impl ParseIdError {
    fn new(what: &'static str, input: &str) -> Self {
        Self {
            what,
            input: input.to_string(),
        }
    }
}

impl FromStr for EntityId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u64, ParseIdError> {
            parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| ParseIdError::new("entity id", s))
        };
        let id = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(ParseIdError::new("entity id", s));
        }
        Ok(id)
    }
}

/// Seconds + nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub const fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::new(now.as_secs() as i64, now.subsec_nanos())
    }

    /// The next representable timestamp (one nanosecond later).
    pub fn successor(self) -> Self {
        if self.nanos >= 999_999_999 {
            Self::new(self.seconds + 1, 0)
        } else {
            Self::new(self.seconds, self.nanos + 1)
        }
    }

    pub fn plus_seconds(self, secs: i64) -> Self {
        Self::new(self.seconds + secs, self.nanos)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl FromStr for Timestamp {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (secs, nanos) = s
            .split_once('.')
            .ok_or_else(|| ParseIdError::new("timestamp", s))?;
        let seconds = secs.parse().map_err(|_| ParseIdError::new("timestamp", s))?;
        let nanos: u32 = nanos.parse().map_err(|_| ParseIdError::new("timestamp", s))?;
        if nanos > 999_999_999 {
            return Err(ParseIdError::new("timestamp", s));
        }
        Ok(Self::new(seconds, nanos))
    }
}

/// Names one operation: the paying account plus its valid-start timestamp.
///
/// Written `0.0.1001@1700000000.000000042`. It is the join key between a
/// submission and its later receipt/record lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId {
    pub payer: AccountId,
    pub valid_start: Timestamp,
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.payer, self.valid_start)
    }
}

impl FromStr for OperationId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (payer, start) = s
            .split_once('@')
            .ok_or_else(|| ParseIdError::new("operation id", s))?;
        Ok(Self {
            payer: payer.parse()?,
            valid_start: start.parse()?,
        })
    }
}

/// Kind of mutating call carried by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateAccount,
    Transfer,
    UploadFile,
    CreateContract,
    CallContract,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateAccount => "create_account",
            Self::Transfer => "transfer",
            Self::UploadFile => "upload_file",
            Self::CreateContract => "create_contract",
            Self::CallContract => "call_contract",
        }
    }
}

/// The signed portion of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationBody {
    pub id: OperationId,
    pub kind: OperationKind,
    /// Node account the request is addressed to.
    pub node: AccountId,
    /// Maximum fee the payer agrees to pay.
    pub max_fee: u64,
    #[serde(default)]
    pub memo: String,
    /// Kind-specific payload, opaque to the client once built.
    pub payload: Bytes,
}

/// A signed, immutable mutating request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub body: OperationBody,
    pub signer: Address,
    pub signature: Bytes,
}

impl OperationRequest {
    pub fn id(&self) -> OperationId {
        self.body.id
    }

    pub fn kind(&self) -> OperationKind {
        self.body.kind
    }

    /// Decode the kind-specific payload.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body.payload)
    }
}

/// Payload of [`OperationKind::CreateAccount`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountPayload {
    pub key: Address,
    pub initial_balance: u64,
}

/// Payload of [`OperationKind::Transfer`]; also the payment attached to queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPayload {
    pub to: AccountId,
    pub amount: u64,
}

/// Payload of [`OperationKind::UploadFile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFilePayload {
    pub contents: Bytes,
}

/// Payload of [`OperationKind::CreateContract`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateContractPayload {
    pub bytecode_file: EntityId,
    pub gas: u64,
    #[serde(default)]
    pub constructor_args: Bytes,
}

/// Payload of [`OperationKind::CallContract`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCallPayload {
    pub contract: EntityId,
    pub gas: u64,
    pub call_data: Bytes,
}

/// Status codes shared by prechecks, receipts and query headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    Ok,
    Busy,
    Unknown,
    Success,
    ReceiptNotFound,
    RecordNotFound,
    DuplicateTransaction,
    InvalidSignature,
    InsufficientTxFee,
    InsufficientPayerBalance,
    TransactionExpired,
    ContractRevertExecuted,
    InvalidTransactionBody,
    PlatformNotActive,
    #[serde(other)]
    Unrecognized,
}

impl ResponseCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Busy => "BUSY",
            Self::Unknown => "UNKNOWN",
            Self::Success => "SUCCESS",
            Self::ReceiptNotFound => "RECEIPT_NOT_FOUND",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InsufficientTxFee => "INSUFFICIENT_TX_FEE",
            Self::InsufficientPayerBalance => "INSUFFICIENT_PAYER_BALANCE",
            Self::TransactionExpired => "TRANSACTION_EXPIRED",
            Self::ContractRevertExecuted => "CONTRACT_REVERT_EXECUTED",
            Self::InvalidTransactionBody => "INVALID_TRANSACTION_BODY",
            Self::PlatformNotActive => "PLATFORM_NOT_ACTIVE",
            Self::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response type requested from a paid query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryMode {
    /// Only report what the answer would cost.
    CostAnswer,
    /// Return the answer, paid for by the attached payment.
    AnswerOnly,
}

impl QueryMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CostAnswer => "COST_ANSWER",
            Self::AnswerOnly => "ANSWER_ONLY",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an operation as computed by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub status: ResponseCode,
    /// Entity created by the operation, if any.
    #[serde(default)]
    pub created: Option<EntityId>,
}

impl Receipt {
    pub fn unknown() -> Self {
        Self {
            status: ResponseCode::Unknown,
            created: None,
        }
    }
}

/// Answer to a receipt poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptResponse {
    pub precheck: ResponseCode,
    pub receipt: Receipt,
}

/// Client-side view of where an operation's receipt stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Not processed yet (`UNKNOWN`).
    Pending,
    /// The service could not answer right now.
    Busy,
    /// Terminal; never changes once observed.
    Final(Receipt),
}

impl Confirmation {
    pub fn from_response(response: ReceiptResponse) -> Self {
        match (response.precheck, response.receipt.status) {
            (ResponseCode::Busy, _) => Self::Busy,
            (ResponseCode::Ok, ResponseCode::Unknown) => Self::Pending,
            (ResponseCode::Ok, _) => Self::Final(response.receipt),
            // Any other query precheck (e.g. RECEIPT_NOT_FOUND) will not resolve by waiting.
            (precheck, _) => Self::Final(Receipt {
                status: precheck,
                created: None,
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Final(r) if r.status == ResponseCode::Success)
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            Self::Final(r) => Some(r),
            _ => None,
        }
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "UNKNOWN",
            Self::Busy => "BUSY",
            Self::Final(r) => r.status.as_str(),
        }
    }
}

/// One balance change listed in a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub account: AccountId,
    pub amount: i64,
}

/// Fee-gated record with the side effects of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedRecord {
    pub id: OperationId,
    pub receipt: Receipt,
    #[serde(default)]
    pub consensus_timestamp: Option<Timestamp>,
    pub fee_charged: u64,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub call_result: Option<Bytes>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub transfers: Vec<Transfer>,
}

/// Answer to a record query in either [`QueryMode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordResponse {
    pub precheck: ResponseCode,
    /// Price of an `ANSWER_ONLY` query; filled in for `COST_ANSWER`.
    #[serde(default)]
    pub cost: u64,
    #[serde(default)]
    pub record: Option<DetailedRecord>,
}
