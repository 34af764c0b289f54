//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates, counts and intervals > 0, ports valid)
//! - Check that account ids and hex blobs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HarnessConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Bytes;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{BackoffKind, HarnessConfig, LogFormat, WorkloadKind};
use crate::ledger::types::AccountId;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Default)]
struct Collector {
    errors: Vec<ValidationError>,
}

impl Collector {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field,
            message: message.into(),
        });
    }

    fn positive(&mut self, field: &'static str, value: u64) {
        if value == 0 {
            self.push(field, "must be greater than zero");
        }
    }

    fn account(&mut self, field: &'static str, value: &str) {
        if let Err(e) = value.parse::<AccountId>() {
            self.push(field, e.to_string());
        }
    }

    fn hex(&mut self, field: &'static str, value: &str, required: bool) {
        if value.is_empty() {
            if required {
                self.push(field, "must not be empty");
            }
            return;
        }
        if value.parse::<Bytes>().is_err() {
            self.push(field, format!("'{}' is not valid hex", value));
        }
    }
}

/// Check every semantic constraint of `config`.
pub fn validate_config(config: &HarnessConfig) -> Result<(), Vec<ValidationError>> {
    let mut c = Collector::default();

    if config.endpoint.host.trim().is_empty() {
        c.push("endpoint.host", "must not be empty");
    }
    c.positive("endpoint.port", config.endpoint.port as u64);
    c.account("endpoint.node_account", &config.endpoint.node_account);
    c.positive("endpoint.request_timeout_ms", config.endpoint.request_timeout_ms);

    c.account("payer.account", &config.payer.account);

    c.positive("receipt.interval_ms", config.receipt.interval_ms);
    c.positive("receipt.max_attempts", config.receipt.max_attempts as u64);
    if config.receipt.backoff == BackoffKind::Exponential
        && config.receipt.max_interval_ms < config.receipt.interval_ms
    {
        c.push("receipt.max_interval_ms", "must be at least receipt.interval_ms");
    }

    c.positive("record.probe_fee", config.record.probe_fee);
    c.positive("record.interval_ms", config.record.interval_ms);
    c.positive("record.max_attempts", config.record.max_attempts as u64);

    c.positive("run.iterations", config.run.iterations);
    c.positive("run.producers", config.run.producers as u64);
    c.positive("run.submit_rate", config.run.submit_rate as u64);
    c.positive("run.drain_rate", config.run.drain_rate as u64);
    c.positive("run.stall_window_secs", config.run.stall_window_secs);

    c.positive("workload.max_fee", config.workload.max_fee);
    match config.workload.kind {
        WorkloadKind::CreateAccount => {}
        WorkloadKind::Transfer => {
            c.account("workload.transfer_to", &config.workload.transfer_to);
            c.positive("workload.amount", config.workload.amount);
        }
        WorkloadKind::ContractCall => {
            c.hex("workload.bytecode_hex", &config.workload.bytecode_hex, true);
            c.hex("workload.call_data_hex", &config.workload.call_data_hex, false);
            c.positive("workload.gas", config.workload.gas);
        }
    }

    let obs = &config.observability;
    if obs.log_level.parse::<tracing::Level>().is_err() {
        c.push("observability.log_level", format!("unknown level '{}'", obs.log_level));
    }
    if let Err(e) = obs.log_format.parse::<LogFormat>() {
        c.push("observability.log_format", e);
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        c.push(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        );
    }

    if c.errors.is_empty() {
        Ok(())
    } else {
        Err(c.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&HarnessConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = HarnessConfig::default();
        config.run.submit_rate = 0;
        config.run.producers = 0;
        config.payer.account = "bogus".into();
        config.observability.log_format = "xml".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(errors.len(), 4);
        assert!(fields.contains(&"run.submit_rate"));
        assert!(fields.contains(&"run.producers"));
        assert!(fields.contains(&"payer.account"));
        assert!(fields.contains(&"observability.log_format"));
    }

    #[test]
    fn test_contract_workload_requires_bytecode() {
        let mut config = HarnessConfig::default();
        config.workload.kind = WorkloadKind::ContractCall;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "workload.bytecode_hex");

        config.workload.bytecode_hex = "0x6080zz".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].message.contains("not valid hex"));

        config.workload.bytecode_hex = "0x6080".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_exponential_cap_below_interval() {
        let mut config = HarnessConfig::default();
        config.receipt.backoff = BackoffKind::Exponential;
        config.receipt.max_interval_ms = 100;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "receipt.max_interval_ms");
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError {
            field: "run.iterations",
            message: "must be greater than zero".into(),
        };
        assert_eq!(err.to_string(), "run.iterations: must be greater than zero");
    }
}
