//! Relay request builder bound to one chain and relay configuration.

use std::sync::Arc;

use relay_types::{ChainConfig, Result};

use crate::params::{self, ContractCaller};
use crate::signing::Erc2771Struct;
use crate::{Erc2771Type, RelayConfig, RelayRequest, ResolvedOptionalParameters};

/// A completed request together with the struct the user signs for it.
#[derive(Debug, Clone)]
pub struct PreparedErc2771<S> {
    /// The request with nonce and deadline filled in.
    pub request: RelayRequest,
    pub signing_struct: S,
}

pub struct Erc2771Builder {
    config: RelayConfig,
    chain: ChainConfig,
    caller: Arc<dyn ContractCaller>,
}

impl Erc2771Builder {
    pub fn new(config: RelayConfig, chain: ChainConfig, caller: Arc<dyn ContractCaller>) -> Self {
        Self { config, chain, caller }
    }

    pub fn relay_address(&self, kind: Erc2771Type) -> Result<&str> {
        params::select_relay_address(kind, &self.config, &self.chain)
    }

    pub async fn resolve_optional_parameters(
        &self,
        request: &RelayRequest,
        kind: Erc2771Type,
    ) -> Result<ResolvedOptionalParameters> {
        params::resolve_optional_parameters(request, kind, &self.config, &self.chain, self.caller.as_ref())
            .await
    }

    /// Resolve the request's missing fields and build its signing struct.
    pub async fn prepare<S: Erc2771Struct>(&self, request: &RelayRequest) -> Result<PreparedErc2771<S>> {
        let resolved = self.resolve_optional_parameters(request, S::KIND).await?;
        self.complete(request, &resolved)
    }

    /// As [`Erc2771Builder::prepare`], with the current time supplied.
    pub async fn prepare_at<S: Erc2771Struct>(
        &self,
        request: &RelayRequest,
        now_secs: u64,
    ) -> Result<PreparedErc2771<S>> {
        let resolved = params::resolve_optional_parameters_at(
            request,
            S::KIND,
            &self.config,
            &self.chain,
            self.caller.as_ref(),
            now_secs,
        )
        .await?;
        self.complete(request, &resolved)
    }

    fn complete<S: Erc2771Struct>(
        &self,
        request: &RelayRequest,
        resolved: &ResolvedOptionalParameters,
    ) -> Result<PreparedErc2771<S>> {
        let signing_struct = request.map_to_struct::<S>(resolved, S::KIND)?;
        Ok(PreparedErc2771 {
            request: request.merged(resolved)?,
            signing_struct,
        })
    }
}
