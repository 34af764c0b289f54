//! What producers submit.
//!
//! A workload performs one-time setup through the monitor's client, then
//! builds one request per producer iteration. Building is synchronous and
//! cheap; all network work happens in `prepare` or in the producer loop.

use alloy::primitives::Bytes;
use async_trait::async_trait;

use crate::config::schema::{WorkloadConfig, WorkloadKind};
use crate::harness::error::{HarnessError, HarnessResult};
use crate::ledger::builder::OperationBuilder;
use crate::ledger::client::SubmissionClient;
use crate::ledger::types::{
    AccountId, ContractCallPayload, CreateAccountPayload, CreateContractPayload, EntityId,
    OperationKind, OperationRequest, TransferPayload, UploadFilePayload,
};

#[async_trait]
pub trait Workload: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &'static str;

    /// One-time setup before producers start.
    async fn prepare(
        &mut self,
        client: &mut SubmissionClient,
        builder: &OperationBuilder,
    ) -> HarnessResult<()>;

    /// Request number `seq` of producer `producer`.
    fn next_request(
        &self,
        builder: &OperationBuilder,
        producer: usize,
        seq: u64,
    ) -> HarnessResult<OperationRequest>;
}

fn memo(name: &str, producer: usize, seq: u64) -> String {
    format!("{} p{} #{}", name, producer, seq)
}

/// Creates one account per iteration, keyed to the payer's signer.
#[derive(Debug, Clone)]
pub struct CreateAccountWorkload {
    pub initial_balance: u64,
    pub max_fee: u64,
}

#[async_trait]
impl Workload for CreateAccountWorkload {
    fn name(&self) -> &'static str {
        "create-account"
    }

    async fn prepare(
        &mut self,
        _client: &mut SubmissionClient,
        _builder: &OperationBuilder,
    ) -> HarnessResult<()> {
        Ok(())
    }

    fn next_request(
        &self,
        builder: &OperationBuilder,
        producer: usize,
        seq: u64,
    ) -> HarnessResult<OperationRequest> {
        let payload = CreateAccountPayload {
            key: builder.signer_address(),
            initial_balance: self.initial_balance,
        };
        Ok(builder.build(
            OperationKind::CreateAccount,
            &payload,
            self.max_fee,
            memo(self.name(), producer, seq),
        )?)
    }
}

/// Moves a fixed amount from the payer to one account per iteration.
#[derive(Debug, Clone)]
pub struct TransferWorkload {
    pub to: AccountId,
    pub amount: u64,
    pub max_fee: u64,
}

#[async_trait]
impl Workload for TransferWorkload {
    fn name(&self) -> &'static str {
        "transfer"
    }

    async fn prepare(
        &mut self,
        _client: &mut SubmissionClient,
        _builder: &OperationBuilder,
    ) -> HarnessResult<()> {
        Ok(())
    }

    fn next_request(
        &self,
        builder: &OperationBuilder,
        producer: usize,
        seq: u64,
    ) -> HarnessResult<OperationRequest> {
        let payload = TransferPayload {
            to: self.to,
            amount: self.amount,
        };
        Ok(builder.build(
            OperationKind::Transfer,
            &payload,
            self.max_fee,
            memo(self.name(), producer, seq),
        )?)
    }
}

/// Deploys a contract once, then calls it every iteration.
#[derive(Debug, Clone)]
pub struct ContractCallWorkload {
    pub bytecode: Bytes,
    pub gas: u64,
    pub call_data: Bytes,
    pub max_fee: u64,
    contract: Option<EntityId>,
}

impl ContractCallWorkload {
    pub fn new(bytecode: Bytes, gas: u64, call_data: Bytes, max_fee: u64) -> Self {
        Self {
            bytecode,
            gas,
            call_data,
            max_fee,
            contract: None,
        }
    }

    /// Contract created by `prepare`.
    pub fn contract(&self) -> Option<EntityId> {
        self.contract
    }

    /// Submit `request`, wait for it, and return the entity it created.
    async fn create(
        client: &mut SubmissionClient,
        request: OperationRequest,
        what: &str,
    ) -> HarnessResult<EntityId> {
        let result = client.submit_and_confirm(&request).await?;
        let Some(confirmation) = result.confirmation else {
            return Err(HarnessError::Setup(format!(
                "{} not accepted: {}",
                what, result.submission.outcome
            )));
        };
        if !confirmation.is_success() {
            return Err(HarnessError::Setup(format!(
                "{} failed: {}",
                what,
                confirmation.label()
            )));
        }
        confirmation
            .receipt()
            .and_then(|r| r.created)
            .ok_or_else(|| HarnessError::Setup(format!("{} receipt carries no created id", what)))
    }
}

#[async_trait]
impl Workload for ContractCallWorkload {
    fn name(&self) -> &'static str {
        "contract-call"
    }

    async fn prepare(
        &mut self,
        client: &mut SubmissionClient,
        builder: &OperationBuilder,
    ) -> HarnessResult<()> {
        let upload = builder.build(
            OperationKind::UploadFile,
            &UploadFilePayload {
                contents: self.bytecode.clone(),
            },
            self.max_fee,
            "bytecode upload",
        )?;
        let file = Self::create(client, upload, "bytecode upload").await?;
        tracing::info!(file = %file, bytes = self.bytecode.len(), "Bytecode uploaded");

        let deploy = builder.build(
            OperationKind::CreateContract,
            &CreateContractPayload {
                bytecode_file: file,
                gas: self.gas,
                constructor_args: Bytes::new(),
            },
            self.max_fee,
            "contract create",
        )?;
        let contract = Self::create(client, deploy, "contract create").await?;
        tracing::info!(contract = %contract, "Contract created");

        self.contract = Some(contract);
        Ok(())
    }

    fn next_request(
        &self,
        builder: &OperationBuilder,
        producer: usize,
        seq: u64,
    ) -> HarnessResult<OperationRequest> {
        let contract = self
            .contract
            .ok_or_else(|| HarnessError::Setup("contract-call workload used before prepare".into()))?;
        let payload = ContractCallPayload {
            contract,
            gas: self.gas,
            call_data: self.call_data.clone(),
        };
        Ok(builder.build(
            OperationKind::CallContract,
            &payload,
            self.max_fee,
            memo(self.name(), producer, seq),
        )?)
    }
}

/// Build the configured workload.
pub fn from_config(config: &WorkloadConfig) -> HarnessResult<Box<dyn Workload>> {
    Ok(match config.kind {
        WorkloadKind::CreateAccount => Box::new(CreateAccountWorkload {
            initial_balance: config.initial_balance,
            max_fee: config.max_fee,
        }),
        WorkloadKind::Transfer => Box::new(TransferWorkload {
            to: config
                .transfer_to
                .parse()
                .map_err(|e| HarnessError::Setup(format!("workload.transfer_to: {}", e)))?,
            amount: config.amount,
            max_fee: config.max_fee,
        }),
        WorkloadKind::ContractCall => {
            let hex = |field: &str, value: &str| -> HarnessResult<Bytes> {
                if value.is_empty() {
                    return Ok(Bytes::new());
                }
                value
                    .parse()
                    .map_err(|e| HarnessError::Setup(format!("{}: {}", field, e)))
            };
            Box::new(ContractCallWorkload::new(
                hex("workload.bytecode_hex", &config.bytecode_hex)?,
                config.gas,
                hex("workload.call_data_hex", &config.call_data_hex)?,
                config.max_fee,
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::client::ClientPolicy;
    use crate::ledger::mock::test_support::{self, builder};
    use crate::ledger::mock::{MockConfig, MockLedger};
    use crate::ledger::types::ResponseCode;

    fn client(ledger: &MockLedger) -> SubmissionClient {
        test_support::client(ledger, ClientPolicy::default())
    }

    #[test]
    fn test_create_account_requests_are_distinct() {
        let b = builder();
        let w = CreateAccountWorkload {
            initial_balance: 5,
            max_fee: 10,
        };
        let a = w.next_request(&b, 0, 0).unwrap();
        let c = w.next_request(&b, 0, 1).unwrap();
        assert_ne!(a.id(), c.id());
        assert_eq!(a.body.memo, "create-account p0 #0");
        assert_eq!(a.kind(), OperationKind::CreateAccount);
    }

    #[test]
    fn test_from_config_transfer() {
        let config = WorkloadConfig {
            kind: WorkloadKind::Transfer,
            transfer_to: "0.0.98".into(),
            amount: 7,
            ..WorkloadConfig::default()
        };
        let w = from_config(&config).unwrap();
        assert_eq!(w.name(), "transfer");
        let request = w.next_request(&builder(), 1, 2).unwrap();
        let payload: TransferPayload = request.payload().unwrap();
        assert_eq!(payload.to, AccountId::new(0, 0, 98));
        assert_eq!(payload.amount, 7);
    }

    #[test]
    fn test_contract_call_requires_prepare() {
        let w = ContractCallWorkload::new(Bytes::from_static(&[0x60, 0x80]), 1, Bytes::new(), 1);
        assert!(matches!(
            w.next_request(&builder(), 0, 0),
            Err(HarnessError::Setup(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_contract_call_prepare_deploys_once() {
        let ledger = MockLedger::default();
        let b = builder();
        let mut c = client(&ledger);
        let mut w = ContractCallWorkload::new(
            Bytes::from_static(&[0x60, 0x80]),
            100_000,
            Bytes::from_static(&[0xde, 0xad]),
            1_000,
        );

        w.prepare(&mut c, &b).await.unwrap();
        // file 1001, contract 1002
        assert_eq!(w.contract(), Some(EntityId::new(0, 0, 1002)));
        assert_eq!(ledger.operation_count(), 2);

        let call: ContractCallPayload = w.next_request(&b, 0, 0).unwrap().payload().unwrap();
        assert_eq!(call.contract, EntityId::new(0, 0, 1002));
    }

    #[tokio::test(start_paused = true)]
    async fn test_contract_prepare_fails_on_unsuccessful_receipt() {
        let ledger = MockLedger::new(MockConfig {
            final_status: ResponseCode::InsufficientPayerBalance,
            ..MockConfig::default()
        });
        let b = builder();
        let mut c = client(&ledger);
        let mut w = ContractCallWorkload::new(Bytes::from_static(&[0x60]), 1, Bytes::new(), 1);

        let err = w.prepare(&mut c, &b).await.unwrap_err();
        assert!(err.to_string().contains("INSUFFICIENT_PAYER_BALANCE"));
    }
}
