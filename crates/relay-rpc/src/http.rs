//! HTTP transport posting JSON-RPC messages to a node URL.

use async_trait::async_trait;
use relay_types::BoxError;
use std::time::Duration;

use crate::{RpcRequest, RpcResponse, RpcTransport};

/// reqwest-backed JSON-RPC transport.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(30_000);
        Self {
            url: url.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, request: &RpcRequest) -> Result<RpcResponse, BoxError> {
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("rpc node returned status {}: {}", status, body).into());
        }

        Ok(resp.json::<RpcResponse>().await?)
    }
}
