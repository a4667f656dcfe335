//! JSON-RPC client for EVM chain nodes.
//!
//! - `RpcClient`: message-id sequencing, request submission, error unwrapping
//! - `JsonRpcProvider`: network detection with a cached identity
//! - `ChainRegistry`: chain id to chain name lookup

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use relay_types::{BoxError, RelayError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

pub mod http;
pub mod provider;
pub mod registry;

pub use http::HttpTransport;
pub use provider::{JsonRpcProvider, JsonRpcProviderConfig, LifecycleParticipant};
pub use registry::{ChainDescriptor, ChainRegistry, StaticChainRegistry};

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: &str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// Error object carried by a failed JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// JSON-RPC response message. Exactly one of `result` / `error` is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

/// Request/response transport to a chain node.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, request: &RpcRequest) -> std::result::Result<RpcResponse, BoxError>;
}

/// JSON-RPC client owning the message-id sequence.
pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    /// Client over an HTTP transport posting to `url`.
    pub fn http(url: &str, timeout_ms: Option<u64>) -> Self {
        Self::new(Arc::new(HttpTransport::new(url, timeout_ms)))
    }

    // fetch_add wraps on overflow
    fn next_message_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call `method` with positional `params` and decode the result into `T`.
    ///
    /// A structured error from the node becomes `RelayError::Rpc`; any failure
    /// to obtain or decode a response becomes `RelayError::Transport`.
    pub async fn perform<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let request = RpcRequest::new(self.next_message_id(), method, params);
        trace!(id = request.id, method, "submitting rpc request");

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| RelayError::transport(method, e))?;

        if let Some(id) = response.id {
            if id != request.id {
                return Err(RelayError::transport(
                    method,
                    format!("response id {} does not match request id {}", id, request.id),
                ));
            }
        }

        if let Some(error) = response.error {
            debug!(id = request.id, method, code = error.code, rpc_message = %error.message, "rpc returned error");
            return Err(RelayError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| RelayError::transport(method, e))
    }
}
