//! Signed request construction.
//!
//! # Security
//! - Private keys are loaded ONLY from a hex string or an environment variable
//! - Keys are never logged or serialized
//!
//! # Identity
//! Every request built here gets a fresh operation id. Valid-start timestamps
//! are strictly increasing per builder, so two requests built in the same
//! nanosecond still differ.

use alloy::primitives::{Address, Bytes};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;

use crate::ledger::types::{
    AccountId, OperationBody, OperationId, OperationKind, OperationRequest, Timestamp,
    TransferPayload,
};

/// Environment variable name for the payer's private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "LEDGER_HARNESS_PRIVATE_KEY";

/// Errors raised while building a request.
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("key error: {0}")]
    Key(String),

    #[error("payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("signing failed: {0}")]
    Signing(String),
}

pub type BuilderResult<T> = Result<T, BuilderError>;

/// Builds signed requests on behalf of one payer account.
#[derive(Debug)]
pub struct OperationBuilder {
    signer: PrivateKeySigner,
    payer: AccountId,
    node: AccountId,
    /// Seconds subtracted from the wall clock when picking a valid start.
    wind_back_secs: i64,
    last_start: Mutex<Option<Timestamp>>,
}

impl OperationBuilder {
    pub fn new(signer: PrivateKeySigner, payer: AccountId, node: AccountId) -> Self {
        Self {
            signer,
            payer,
            node,
            wind_back_secs: 0,
            last_start: Mutex::new(None),
        }
    }

    /// Create a builder from a hex-encoded private key (with or without 0x prefix).
    pub fn from_private_key(
        private_key_hex: &str,
        payer: AccountId,
        node: AccountId,
    ) -> BuilderResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BuilderError::Key(format!("Invalid private key format: {}", e)))?;

        tracing::info!(
            payer = %payer,
            node = %node,
            signer = %signer.address(),
            "Operation builder initialized"
        );

        Ok(Self::new(signer, payer, node))
    }

    /// Load the payer key from `LEDGER_HARNESS_PRIVATE_KEY`.
    pub fn from_env(payer: AccountId, node: AccountId) -> BuilderResult<Self> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            BuilderError::Key(format!(
                "Environment variable {} not set",
                PRIVATE_KEY_ENV_VAR
            ))
        })?;

        Self::from_private_key(&private_key, payer, node)
    }

    /// Start valid-start timestamps this many seconds in the past.
    pub fn with_wind_back(mut self, secs: u64) -> Self {
        self.wind_back_secs = secs as i64;
        self
    }

    pub fn payer(&self) -> AccountId {
        self.payer
    }

    pub fn node(&self) -> AccountId {
        self.node
    }

    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// Build and sign a request of `kind` carrying `payload`.
    pub fn build<P: Serialize>(
        &self,
        kind: OperationKind,
        payload: &P,
        max_fee: u64,
        memo: impl Into<String>,
    ) -> BuilderResult<OperationRequest> {
        let body = OperationBody {
            id: self.next_id(),
            kind,
            node: self.node,
            max_fee,
            memo: memo.into(),
            payload: Bytes::from(serde_json::to_vec(payload)?),
        };
        self.sign(body)
    }

    /// Build the transfer that pays a query: `amount` from the payer to the node.
    pub fn payment(&self, amount: u64) -> BuilderResult<OperationRequest> {
        let payload = TransferPayload {
            to: self.node,
            amount,
        };
        self.build(OperationKind::Transfer, &payload, amount, "query payment")
    }

    fn sign(&self, body: OperationBody) -> BuilderResult<OperationRequest> {
        let message = serde_json::to_vec(&body)?;
        let signature = self
            .signer
            .sign_message_sync(&message)
            .map_err(|e| BuilderError::Signing(e.to_string()))?;

        Ok(OperationRequest {
            body,
            signer: self.signer.address(),
            signature: Bytes::copy_from_slice(&signature.as_bytes()),
        })
    }

    fn next_id(&self) -> OperationId {
        let mut candidate = Timestamp::now().plus_seconds(-self.wind_back_secs);
        let mut last = self
            .last_start
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(prev) = *last {
            if candidate <= prev {
                candidate = prev.successor();
            }
        }
        *last = Some(candidate);

        OperationId {
            payer: self.payer,
            valid_start: candidate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::CreateAccountPayload;
    use std::collections::HashSet;

    // Well-known test private key (Anvil's first account)
    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn builder() -> OperationBuilder {
        OperationBuilder::from_private_key(
            TEST_PRIVATE_KEY,
            AccountId::new(0, 0, 2),
            AccountId::new(0, 0, 3),
        )
        .unwrap()
    }

    #[test]
    fn test_builder_from_private_key() {
        let b = builder();
        assert_eq!(
            b.signer_address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_builder_with_0x_prefix() {
        let b = OperationBuilder::from_private_key(
            &format!("0x{}", TEST_PRIVATE_KEY),
            AccountId::new(0, 0, 2),
            AccountId::new(0, 0, 3),
        )
        .unwrap();
        assert_eq!(b.payer(), AccountId::new(0, 0, 2));
    }

    #[test]
    fn test_invalid_private_key() {
        let result =
            OperationBuilder::from_private_key("invalid_key", AccountId::new(0, 0, 2), AccountId::new(0, 0, 3));
        assert!(result.unwrap_err().to_string().contains("Invalid private key"));
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let b = builder();
        let mut seen = HashSet::new();
        let mut prev = None;
        for _ in 0..1000 {
            let id = b.next_id();
            assert!(seen.insert(id));
            if let Some(p) = prev {
                assert!(id.valid_start > p);
            }
            prev = Some(id.valid_start);
        }
    }

    #[test]
    fn test_wind_back_moves_start_into_past() {
        let b = builder().with_wind_back(30);
        let id = b.next_id();
        let now = Timestamp::now();
        assert!(id.valid_start.seconds <= now.seconds - 29);
    }

    #[test]
    fn test_build_signs_and_encodes_payload() {
        let b = builder();
        let payload = CreateAccountPayload {
            key: b.signer_address(),
            initial_balance: 1_000,
        };
        let request = b
            .build(OperationKind::CreateAccount, &payload, 50, "perf")
            .unwrap();

        assert_eq!(request.kind(), OperationKind::CreateAccount);
        assert_eq!(request.body.node, AccountId::new(0, 0, 3));
        assert_eq!(request.signature.len(), 65);
        assert_eq!(request.payload::<CreateAccountPayload>().unwrap(), payload);
    }

    #[test]
    fn test_payment_targets_node() {
        let b = builder();
        let payment = b.payment(1234).unwrap();
        assert_eq!(payment.kind(), OperationKind::Transfer);
        let transfer: TransferPayload = payment.payload().unwrap();
        assert_eq!(transfer.to, b.node());
        assert_eq!(transfer.amount, 1234);
    }
}
