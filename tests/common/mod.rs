//! Shared utilities for integration tests.

#![allow(dead_code)]

use alloy::signers::local::PrivateKeySigner;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use ledger_harness::harness::{HarnessContext, RunSettings};
use ledger_harness::ledger::client::ClientPolicy;
use ledger_harness::ledger::mock::{router, MockLedger, MOCK_PAYER};
use ledger_harness::ledger::{AccountId, Endpoint, HttpTransportFactory, OperationBuilder};
use ledger_harness::resilience::{PollPolicy, RetryPolicy};

pub const NODE: AccountId = AccountId::new(0, 0, 3);

/// Serve `ledger` over HTTP on an ephemeral local port.
pub async fn start_mock_node(ledger: MockLedger) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(ledger)).await;
    });
    addr
}

pub fn endpoint(addr: SocketAddr) -> Endpoint {
    Endpoint {
        host: addr.ip().to_string(),
        port: addr.port(),
        node_account: NODE,
        request_timeout: Duration::from_secs(2),
    }
}

/// Endpoint for in-memory runs; host and port are never dialed.
pub fn mock_endpoint() -> Endpoint {
    Endpoint {
        host: "mock".into(),
        port: 0,
        node_account: NODE,
        request_timeout: Duration::from_secs(1),
    }
}

pub fn builder() -> OperationBuilder {
    OperationBuilder::new(PrivateKeySigner::random(), MOCK_PAYER, NODE)
}

/// Short delays so real-time tests finish quickly.
pub fn fast_policy() -> ClientPolicy {
    ClientPolicy {
        retry: RetryPolicy {
            max_retries: 5,
            busy_delay: Duration::from_millis(5),
            reconnect_delay: Duration::from_millis(5),
        },
        receipt: PollPolicy::fixed(Duration::from_millis(20), 50),
        record: PollPolicy::fixed(Duration::from_millis(20), 20),
        probe_fee: 1_000,
    }
}

pub fn mock_context(ledger: &MockLedger, policy: ClientPolicy) -> HarnessContext {
    HarnessContext::new(mock_endpoint(), Arc::new(ledger.clone()), builder(), policy)
}

pub fn http_context(addr: SocketAddr, policy: ClientPolicy) -> HarnessContext {
    HarnessContext::new(endpoint(addr), Arc::new(HttpTransportFactory), builder(), policy)
}

pub fn settings(producers: usize, iterations: u64, submit_rate: u32) -> RunSettings {
    RunSettings {
        iterations,
        producers,
        submit_rate,
        drain_rate: 50,
        stall_window: Duration::from_secs(20),
    }
}
