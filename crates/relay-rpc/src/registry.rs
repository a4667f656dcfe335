//! Chain registry: maps a numeric chain id to a chain descriptor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Known chain metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub chain_id: u64,
    pub name: String,
}

#[async_trait]
pub trait ChainRegistry: Send + Sync {
    async fn get_chain(&self, chain_id: u64) -> Option<ChainDescriptor>;
}

/// In-memory chain registry for a fixed chain list (and for testing).
pub struct StaticChainRegistry {
    chains: Mutex<HashMap<u64, ChainDescriptor>>,
}

impl StaticChainRegistry {
    pub fn new() -> Self {
        Self {
            chains: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_chains(chains: impl IntoIterator<Item = ChainDescriptor>) -> Self {
        let registry = Self::new();
        for chain in chains {
            registry.insert(chain);
        }
        registry
    }

    /// Add or replace the descriptor for `chain.chain_id`.
    pub fn insert(&self, chain: ChainDescriptor) {
        let mut chains = self.chains.lock().unwrap_or_else(PoisonError::into_inner);
        chains.insert(chain.chain_id, chain);
    }
}

impl Default for StaticChainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainRegistry for StaticChainRegistry {
    async fn get_chain(&self, chain_id: u64) -> Option<ChainDescriptor> {
        let chains = self.chains.lock().unwrap_or_else(PoisonError::into_inner);
        chains.get(&chain_id).cloned()
    }
}
