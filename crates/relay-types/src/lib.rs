use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 0x-prefixed hex string (e.g. "0x1234...").
pub type Hex = String;

/// Boxed error used to carry the underlying cause of a transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Relay SDK error types.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The request never produced a usable response: network failure,
    /// malformed payload or a result that could not be decoded.
    #[error("{method}: bad result from RPC endpoint: {source}")]
    Transport {
        method: String,
        #[source]
        source: BoxError,
    },

    /// The remote peer answered with a structured JSON-RPC error.
    #[error("RPC returned error for \"{method}\": {code} {message} {data}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
        data: serde_json::Value,
    },

    #[error("could not detect network: eth_chainId returned {chain_id}")]
    Network { chain_id: u64 },

    #[error("incorrect relay option: {0}")]
    Config(String),

    #[error("{field} is not found in the request, nor fetched")]
    Validation { field: &'static str },

    /// The relay service rejected an HTTP call.
    #[error("relay service returned status {status} for {endpoint}: {message}")]
    Relay {
        endpoint: String,
        status: u16,
        message: String,
    },
}

impl RelayError {
    pub fn transport(method: impl Into<String>, source: impl Into<BoxError>) -> Self {
        RelayError::Transport {
            method: method.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// The chain the SDK is configured against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Decimal chain id, kept textual as it is in host configuration.
    pub chain_id: String,
    pub chain: String,
    /// Default RPC node URL for this chain.
    pub rpc: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: "1".into(),
            chain: "Ethereum".into(),
            rpc: String::new(),
        }
    }
}

/// Identity of the network a provider is connected to.
///
/// Two identities are equal iff their chain ids match; the name is informational.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIdentity {
    pub name: String,
    pub chain_id: u64,
}

impl NetworkIdentity {
    pub const UNKNOWN_NAME: &'static str = "Unknown";

    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            chain_id,
        }
    }

    pub fn unknown(chain_id: u64) -> Self {
        Self::new(Self::UNKNOWN_NAME, chain_id)
    }
}

impl PartialEq for NetworkIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id
    }
}

impl fmt::Display for NetworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}

/// Parse a JSON-RPC hex quantity ("0x1a", or bare "1a") into a u64.
pub fn parse_quantity(quantity: &str) -> std::result::Result<u64, std::num::ParseIntError> {
    let digits = quantity
        .strip_prefix("0x")
        .or_else(|| quantity.strip_prefix("0X"))
        .unwrap_or(quantity);
    u64::from_str_radix(digits, 16)
}

/// Convert bytes to a 0x-prefixed hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> Hex {
    format!("0x{}", hex::encode(bytes))
}
