//! Full harness runs against the in-memory ledger, on paused time.

use alloy::primitives::Bytes;
use std::time::Duration;

use ledger_harness::harness::workload::{
    ContractCallWorkload, CreateAccountWorkload, TransferWorkload, Workload,
};
use ledger_harness::harness::{HarnessError, Monitor};
use ledger_harness::ledger::client::ClientPolicy;
use ledger_harness::ledger::mock::{MockConfig, MockLedger};
use ledger_harness::ledger::{AccountId, ResponseCode};
use ledger_harness::resilience::{PollPolicy, RetryPolicy};

mod common;

fn create_accounts() -> Box<dyn Workload> {
    Box::new(CreateAccountWorkload {
        initial_balance: 1,
        max_fee: 100,
    })
}

fn policy() -> ClientPolicy {
    ClientPolicy {
        receipt: PollPolicy::fixed(Duration::from_millis(100), 20),
        ..ClientPolicy::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_single_producer() {
    let ledger = MockLedger::new(MockConfig {
        confirm_after: 2,
        ..MockConfig::default()
    });
    let context = common::mock_context(&ledger, policy());

    let report = Monitor::new(context, common::settings(1, 20, 5), create_accounts())
        .run()
        .await
        .unwrap();

    assert_eq!(report.throughput.completed, 20);
    assert_eq!(report.throughput.missing, 0);
    // 20 submissions at 5/s cannot finish in under four seconds.
    assert!(report.throughput.elapsed >= Duration::from_secs(4));
    assert!(report.throughput.ops_per_sec <= 5.0);
    assert!(report.is_balanced());
}

#[tokio::test(start_paused = true)]
async fn test_multiple_producers_share_one_consumer() {
    let ledger = MockLedger::default();
    let context = common::mock_context(&ledger, policy());

    let report = Monitor::new(context, common::settings(4, 10, 10), create_accounts())
        .run()
        .await
        .unwrap();

    assert_eq!(report.producers, 4);
    assert_eq!(report.per_producer.len(), 4);
    assert!(report.per_producer.iter().all(|p| p.enqueued == 10));
    assert_eq!(report.throughput.completed, 40);
    assert_eq!(report.throughput.end_markers, 4);
    assert_eq!(ledger.operation_count(), 40);
}

#[tokio::test(start_paused = true)]
async fn test_busy_node_keeps_accounting_balanced() {
    let ledger = MockLedger::new(MockConfig {
        busy_ratio: 0.4,
        ..MockConfig::default()
    });
    let policy = ClientPolicy {
        retry: RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        },
        ..policy()
    };
    let context = common::mock_context(&ledger, policy);

    let report = Monitor::new(context, common::settings(3, 15, 20), create_accounts())
        .run()
        .await
        .unwrap();

    assert!(report.is_balanced());
    assert_eq!(report.throughput.completed as usize, ledger.operation_count());
    assert_eq!(report.submitted, 45);
    let stats = ledger.stats();
    assert!(stats.submissions >= stats.accepted);
}

#[tokio::test(start_paused = true)]
async fn test_failed_operations_are_missing() {
    let ledger = MockLedger::new(MockConfig {
        final_status: ResponseCode::InsufficientPayerBalance,
        ..MockConfig::default()
    });
    let context = common::mock_context(&ledger, policy());
    let workload = Box::new(TransferWorkload {
        to: AccountId::new(0, 0, 98),
        amount: 10,
        max_fee: 100,
    });

    let report = Monitor::new(context, common::settings(2, 5, 5), workload)
        .run()
        .await
        .unwrap();

    assert_eq!(report.throughput.completed, 0);
    assert_eq!(report.throughput.missing, 10);
    assert!(report.is_balanced());
}

#[tokio::test(start_paused = true)]
async fn test_contract_call_run_deploys_first() {
    let ledger = MockLedger::default();
    let context = common::mock_context(&ledger, policy());
    let workload = Box::new(ContractCallWorkload::new(
        Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]),
        200_000,
        Bytes::from_static(&[0xa9, 0x05, 0x9c, 0xbb]),
        1_000,
    ));

    let report = Monitor::new(context, common::settings(2, 3, 10), workload)
        .run()
        .await
        .unwrap();

    assert_eq!(report.workload, "contract-call");
    assert_eq!(report.throughput.completed, 6);
    // upload + create + six calls
    assert_eq!(ledger.operation_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_producer_stalls_the_run() {
    let ledger = MockLedger::new(MockConfig {
        submit_latency: Duration::from_secs(3600),
        ..MockConfig::default()
    });
    let context = common::mock_context(&ledger, policy());
    let mut settings = common::settings(1, 1, 5);
    settings.stall_window = Duration::from_secs(5);

    let run = Monitor::new(context, settings, create_accounts()).run();
    let err = tokio::time::timeout(Duration::from_secs(60), run)
        .await
        .expect("stall was not reported while the producer hung")
        .unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Stalled {
            finished: 0,
            expected: 1,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_node_fails_setup() {
    let ledger = MockLedger::default();
    ledger.set_down(true);
    let context = common::mock_context(&ledger, policy());

    let err = Monitor::new(context, common::settings(2, 5, 5), create_accounts())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::Client(_)));
}
