//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment / config (private key, payer, node)
//!     → builder.rs (unique operation ids, signing, query payments)
//!     → client.rs (submit with retry, receipt polling, paid record queries)
//!     → transport.rs (typed RPC boundary)
//!         → http.rs (JSON over HTTP)
//!         → mock.rs (in-memory ledger, also served over HTTP)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables or explicit hex input
//! - Never log private keys or signatures
//! - Every call is bounded by the endpoint's request timeout

pub mod builder;
pub mod client;
pub mod http;
pub mod mock;
pub mod transport;
pub mod types;

pub use builder::{BuilderError, OperationBuilder};
pub use client::{ClientError, ClientPolicy, ConfirmedSubmission, Submission, SubmissionClient};
pub use http::HttpTransportFactory;
pub use mock::{MockConfig, MockLedger};
pub use transport::{
    Endpoint, LedgerTransport, TransportError, TransportFactory, TransportOutcome,
    UnavailableReason,
};
pub use types::{AccountId, Confirmation, EntityId, OperationId, OperationKind, ResponseCode};
