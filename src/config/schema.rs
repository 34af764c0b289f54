//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the harness.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so a minimal file (or none) is enough.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::ledger::client::ClientPolicy;
use crate::ledger::transport::Endpoint;
use crate::ledger::types::{AccountId, ParseIdError};
use crate::resilience::{Backoff, PollPolicy, RetryPolicy};

/// Root configuration for the harness.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    /// Ledger node to talk to.
    pub endpoint: EndpointConfig,

    /// Paying account (the key itself comes from the environment).
    pub payer: PayerConfig,

    /// Submission retry settings.
    pub submit: SubmitConfig,

    /// Receipt polling settings.
    pub receipt: ReceiptConfig,

    /// Paid record query settings.
    pub record: RecordConfig,

    /// Throughput run settings.
    pub run: RunConfig,

    /// What the producers submit.
    pub workload: WorkloadConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Ledger node address.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,

    /// Node account requests are addressed to, e.g. "0.0.3".
    pub node_account: String,

    /// Per-call timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50211,
            node_account: "0.0.3".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

/// Paying account.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PayerConfig {
    /// Payer account id, e.g. "0.0.2".
    pub account: String,

    /// Seconds to wind the valid-start timestamp back from the wall clock.
    pub wind_back_secs: u64,
}

impl Default for PayerConfig {
    fn default() -> Self {
        Self {
            account: "0.0.2".to_string(),
            wind_back_secs: 0,
        }
    }
}

/// Submission retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmitConfig {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,

    /// Wait after a BUSY precheck, in milliseconds.
    pub busy_delay_ms: u64,

    /// Wait before resending over a fresh connection, in milliseconds.
    pub reconnect_delay_ms: u64,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            max_retries: 15,
            busy_delay_ms: 200,
            reconnect_delay_ms: 50,
        }
    }
}

/// How receipt poll intervals grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

/// Receipt polling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiptConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
    pub backoff: BackoffKind,

    /// Cap for exponential backoff, in milliseconds.
    pub max_interval_ms: u64,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_attempts: 120,
            backoff: BackoffKind::Fixed,
            max_interval_ms: 5_000,
        }
    }
}

/// Paid record query configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecordConfig {
    /// Payment attached to the COST_ANSWER probe.
    pub probe_fee: u64,

    /// Re-fetch interval while the record is not final, in milliseconds.
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            probe_fee: 100_000,
            interval_ms: 300,
            max_attempts: 60,
        }
    }
}

/// Throughput run configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Submissions per producer.
    pub iterations: u64,

    /// Number of producers.
    pub producers: usize,

    /// Target submissions per second, per producer.
    pub submit_rate: u32,

    /// Queue drain rate hint (operations per second).
    pub drain_rate: u32,

    /// Seconds with an empty queue before the run is declared stalled.
    pub stall_window_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            producers: 1,
            submit_rate: 10,
            drain_rate: 50,
            stall_window_secs: 20,
        }
    }
}

/// Kind of operation the producers generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WorkloadKind {
    #[default]
    CreateAccount,
    Transfer,
    ContractCall,
}

/// Workload configuration. Fields unused by the selected kind are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub kind: WorkloadKind,

    /// Maximum fee per operation.
    pub max_fee: u64,

    /// create-account: balance of each new account.
    pub initial_balance: u64,

    /// transfer: recipient account id.
    pub transfer_to: String,

    /// transfer: amount per operation.
    pub amount: u64,

    /// contract-call: hex contract bytecode, uploaded once during setup.
    pub bytecode_hex: String,

    /// contract-call: gas per call (and for the deployment).
    pub gas: u64,

    /// contract-call: hex call data sent with every call.
    pub call_data_hex: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            kind: WorkloadKind::CreateAccount,
            max_fee: 100_000_000,
            initial_balance: 100_000,
            transfer_to: "0.0.3".to_string(),
            amount: 1,
            bytecode_hex: String::new(),
            gas: 250_000,
            call_data_hex: String::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl ObservabilityConfig {
    /// Parsed log format; unknown values fall back to pretty.
    pub fn format(&self) -> LogFormat {
        self.log_format.parse().unwrap_or(LogFormat::Pretty)
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Resolved node endpoint.
    pub fn endpoint(&self) -> Result<Endpoint, ParseIdError> {
        Ok(Endpoint {
            host: self.endpoint.host.clone(),
            port: self.endpoint.port,
            node_account: self.endpoint.node_account.parse()?,
            request_timeout: Duration::from_millis(self.endpoint.request_timeout_ms),
        })
    }

    pub fn payer_account(&self) -> Result<AccountId, ParseIdError> {
        self.payer.account.parse()
    }

    /// Retry and polling policy for every client opened by a run.
    pub fn client_policy(&self) -> ClientPolicy {
        let backoff = match self.receipt.backoff {
            BackoffKind::Fixed => Backoff::Fixed,
            BackoffKind::Exponential => Backoff::Exponential {
                max: Duration::from_millis(self.receipt.max_interval_ms),
            },
        };

        ClientPolicy {
            retry: RetryPolicy {
                max_retries: self.submit.max_retries,
                busy_delay: Duration::from_millis(self.submit.busy_delay_ms),
                reconnect_delay: Duration::from_millis(self.submit.reconnect_delay_ms),
            },
            receipt: PollPolicy {
                interval: Duration::from_millis(self.receipt.interval_ms),
                max_attempts: self.receipt.max_attempts,
                backoff,
            },
            record: PollPolicy::fixed(
                Duration::from_millis(self.record.interval_ms),
                self.record.max_attempts,
            ),
            probe_fee: self.record.probe_fee,
        }
    }
}
