//! JSON-RPC provider: network detection and the cached network identity.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use relay_types::{parse_quantity, ChainConfig, NetworkIdentity, RelayError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::{ChainRegistry, RpcClient, RpcTransport};

/// Provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonRpcProviderConfig {
    /// RPC node URL. Falls back to the chain's configured RPC when unset.
    pub rpc_node_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for JsonRpcProviderConfig {
    fn default() -> Self {
        Self {
            rpc_node_url: None,
            timeout_ms: 30_000,
        }
    }
}

impl JsonRpcProviderConfig {
    pub fn rpc_url<'a>(&'a self, chain: &'a ChainConfig) -> &'a str {
        match self.rpc_node_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => &chain.rpc,
        }
    }
}

/// Start/stop hooks run by the host around the SDK's lifetime.
#[async_trait]
pub trait LifecycleParticipant: Send + Sync {
    async fn will_start(&self) -> Result<()> {
        Ok(())
    }
    async fn will_stop(&self) -> Result<()> {
        Ok(())
    }
}

/// RPC provider bound to one node, caching the detected network.
pub struct JsonRpcProvider {
    client: RpcClient,
    registry: Arc<dyn ChainRegistry>,
    network: Mutex<Option<Arc<NetworkIdentity>>>,
}

impl JsonRpcProvider {
    /// Build an HTTP provider. The node URL is resolved once, here.
    pub fn new(
        config: &JsonRpcProviderConfig,
        chain: &ChainConfig,
        registry: Arc<dyn ChainRegistry>,
    ) -> Self {
        let client = RpcClient::http(config.rpc_url(chain), Some(config.timeout_ms));
        Self::with_client(client, registry)
    }

    pub fn with_transport(transport: Arc<dyn RpcTransport>, registry: Arc<dyn ChainRegistry>) -> Self {
        Self::with_client(RpcClient::new(transport), registry)
    }

    pub fn with_client(client: RpcClient, registry: Arc<dyn ChainRegistry>) -> Self {
        Self {
            client,
            registry,
            network: Mutex::new(None),
        }
    }

    pub async fn perform<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        self.client.perform(method, params).await
    }

    /// Query `eth_chainId` and resolve the chain name through the registry.
    pub async fn detect_network(&self) -> Result<NetworkIdentity> {
        let chain_id_hex: String = self.client.perform("eth_chainId", vec![]).await?;
        let chain_id =
            parse_quantity(&chain_id_hex).map_err(|e| RelayError::transport("eth_chainId", e))?;

        if chain_id == 0 {
            return Err(RelayError::Network { chain_id });
        }

        Ok(match self.registry.get_chain(chain_id).await {
            Some(chain) => NetworkIdentity::new(chain.name, chain_id),
            None => NetworkIdentity::unknown(chain_id),
        })
    }

    /// Re-detect the network and update the cache.
    ///
    /// Always performs a round trip. When the chain id is unchanged the
    /// previously cached identity is returned as-is; otherwise the freshly
    /// detected identity replaces it.
    pub async fn refresh_network(&self) -> Result<Arc<NetworkIdentity>> {
        let detected = self.detect_network().await?;

        let mut cached = self.network.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = cached.as_ref() {
            if current.chain_id == detected.chain_id {
                debug!(chain_id = current.chain_id, "network unchanged");
                return Ok(Arc::clone(current));
            }
        }

        info!(
            previous = ?cached.as_ref().map(|n| n.chain_id),
            chain_id = detected.chain_id,
            name = %detected.name,
            "network changed"
        );
        let detected = Arc::new(detected);
        *cached = Some(Arc::clone(&detected));
        Ok(detected)
    }

    /// The cached network identity, without a round trip.
    pub fn last_known_network(&self) -> Option<Arc<NetworkIdentity>> {
        self.network
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn get_block_number(&self) -> Result<u64> {
        let block: String = self.client.perform("eth_blockNumber", vec![]).await?;
        parse_quantity(&block).map_err(|e| RelayError::transport("eth_blockNumber", e))
    }
}

#[async_trait]
impl LifecycleParticipant for JsonRpcProvider {
    async fn will_start(&self) -> Result<()> {
        self.refresh_network().await?;
        Ok(())
    }
}
