//! Shared run context.

use std::sync::Arc;

use crate::ledger::builder::OperationBuilder;
use crate::ledger::client::{ClientPolicy, ClientResult, SubmissionClient};
use crate::ledger::transport::{Endpoint, TransportFactory};

/// Everything a worker needs to talk to the ledger. Passed explicitly to
/// every worker; there is no global client state.
#[derive(Clone)]
pub struct HarnessContext {
    pub endpoint: Endpoint,
    pub factory: Arc<dyn TransportFactory>,
    pub builder: Arc<OperationBuilder>,
    pub policy: ClientPolicy,
}

impl std::fmt::Debug for HarnessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarnessContext")
            .field("endpoint", &self.endpoint)
            .field("payer", &self.builder.payer())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl HarnessContext {
    pub fn new(
        endpoint: Endpoint,
        factory: Arc<dyn TransportFactory>,
        builder: OperationBuilder,
        policy: ClientPolicy,
    ) -> Self {
        Self {
            endpoint,
            factory,
            builder: Arc::new(builder),
            policy,
        }
    }

    /// Open a fresh client with its own connection.
    pub fn client(&self) -> ClientResult<SubmissionClient> {
        SubmissionClient::connect(self.endpoint.clone(), self.factory.clone(), self.policy)
    }
}
