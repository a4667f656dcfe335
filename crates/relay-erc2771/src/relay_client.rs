//! HTTP client for the relay service.
//!
//! Endpoints:
//! - POST /relays/v2/call-with-sync-fee-erc2771
//! - POST /relays/v2/sponsored-call-erc2771
//! - GET /tasks/status/<task_id>

use serde::{Deserialize, Serialize};
use relay_types::{RelayError, Result};
use std::time::Duration;
use tracing::debug;

use crate::{Erc2771Type, RelayConfig, RelayRequest};

/// Relay task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    CheckPending,
    ExecPending,
    WaitingForConfirmation,
    ExecSuccess,
    ExecReverted,
    Blacklisted,
    Cancelled,
    NotFound,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::ExecSuccess
                | TaskState::ExecReverted
                | TaskState::Blacklisted
                | TaskState::Cancelled
                | TaskState::NotFound
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub chain_id: u64,
    pub task_id: String,
    pub task_state: TaskState,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub execution_date: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub last_check_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskStatusResponse {
    task: TaskStatus,
}

/// Relay client for submitting signed ERC-2771 requests.
pub struct RelayClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    sponsor_api_key: Option<String>,
}

impl RelayClient {
    pub fn new(base_url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(30_000);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
            sponsor_api_key: None,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        let mut client = Self::new(&config.relay_url, Some(config.timeout_ms));
        client.sponsor_api_key = config.sponsor_api_key.clone();
        client
    }

    pub fn endpoint(kind: Erc2771Type) -> &'static str {
        match kind {
            Erc2771Type::CallWithSyncFee => "/relays/v2/call-with-sync-fee-erc2771",
            Erc2771Type::SponsoredCall => "/relays/v2/sponsored-call-erc2771",
        }
    }

    /// Check a request is complete for `kind` and return the payload to post.
    pub fn payload(&self, kind: Erc2771Type, request: &RelayRequest) -> Result<RelayRequest> {
        if request.user_nonce.is_none() {
            return Err(RelayError::Validation { field: "userNonce" });
        }
        if request.user_deadline.is_none() {
            return Err(RelayError::Validation { field: "userDeadline" });
        }
        if request.signature.is_none() {
            return Err(RelayError::Validation { field: "userSignature" });
        }

        let mut payload = request.clone();
        match kind {
            Erc2771Type::CallWithSyncFee => {
                if payload.fee_token.is_none() {
                    return Err(RelayError::Validation { field: "feeToken" });
                }
                payload.sponsor_api_key = None;
            }
            Erc2771Type::SponsoredCall => {
                if payload.sponsor_api_key.is_none() {
                    payload.sponsor_api_key = self.sponsor_api_key.clone();
                }
                if payload.sponsor_api_key.is_none() {
                    return Err(RelayError::Validation { field: "sponsorApiKey" });
                }
                payload.fee_token = None;
                payload.is_relay_context = None;
            }
        }
        Ok(payload)
    }

    /// Submit a signed request; returns the relay task id.
    pub async fn submit(&self, kind: Erc2771Type, request: &RelayRequest) -> Result<String> {
        let payload = self.payload(kind, request)?;
        let endpoint = Self::endpoint(kind);
        let url = format!("{}{}", self.base_url, endpoint);

        debug!(%kind, chain_id = payload.chain_id, user = %payload.user, "submitting relay request");

        let resp = self.client
            .post(&url)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayError::transport(endpoint, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Relay {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: body,
            });
        }

        let body: SubmitResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::transport(endpoint, e))?;

        debug!(task_id = %body.task_id, "relay request accepted");
        Ok(body.task_id)
    }

    /// Fetch a task's status. `None` if the relay service does not know the task.
    ///
    /// GET /tasks/status/<task_id>
    pub async fn get_task_status(&self, task_id: &str) -> Result<Option<TaskStatus>> {
        let endpoint = "/tasks/status";
        let url = format!("{}{}/{}", self.base_url, endpoint, task_id);

        let resp = self.client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RelayError::transport(endpoint, e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Relay {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: body,
            });
        }

        let body: TaskStatusResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::transport(endpoint, e))?;

        Ok(Some(body.task))
    }

    /// Poll a task until it reaches a terminal state, waiting between attempts.
    ///
    /// Returns the last status seen, which is non-terminal if the attempts ran out.
    pub async fn wait_for_task(
        &self,
        task_id: &str,
        max_attempts: u32,
        poll_interval_ms: u64,
    ) -> Result<Option<TaskStatus>> {
        let mut last = None;
        for attempt in 0..max_attempts {
            last = self.get_task_status(task_id).await?;
            if let Some(status) = &last {
                debug!(task_id, attempt, state = ?status.task_state, "polled relay task");
                if status.task_state.is_terminal() {
                    break;
                }
            }
            if attempt + 1 < max_attempts {
                tokio::time::sleep(Duration::from_millis(poll_interval_ms)).await;
            }
        }
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    type Seen = Arc<Mutex<Vec<(String, String)>>>;

    // Reads one HTTP/1.1 request; returns its request line and body.
    async fn read_request(socket: &mut TcpStream) -> (String, String) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return (String::new(), String::new());
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_string();
                let len = head
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while buf.len() < end + 4 + len {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                let body = String::from_utf8_lossy(&buf[end + 4..]).to_string();
                let request_line = head.lines().next().unwrap_or_default().to_string();
                return (request_line, body);
            }
        }
    }

    /// Loopback relay answering each connection with the next canned reply.
    async fn serve(replies: Vec<(u16, Value)>) -> (String, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            for (status, body) in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);
                let body = body.to_string();
                let response = format!(
                    "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{}", addr), seen)
    }

    fn task(state: &str) -> Value {
        json!({"task": {"chainId": 5, "taskId": "0x93a3", "taskState": state}})
    }

    fn signed_request() -> RelayRequest {
        RelayRequest::new(1, "0xTarget", "0x", "0xUser")
            .user_nonce(1)
            .user_deadline(2)
            .with_signature("0xsig")
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(
            RelayClient::endpoint(Erc2771Type::CallWithSyncFee),
            "/relays/v2/call-with-sync-fee-erc2771"
        );
        assert_eq!(
            RelayClient::endpoint(Erc2771Type::SponsoredCall),
            "/relays/v2/sponsored-call-erc2771"
        );
    }

    #[test]
    fn test_sponsored_payload_uses_configured_key() {
        let config = RelayConfig {
            sponsor_api_key: Some("cfg-key".into()),
            ..Default::default()
        };
        let client = RelayClient::from_config(&config);
        let request = signed_request().fee_token("0xToken", true);

        let payload = client.payload(Erc2771Type::SponsoredCall, &request).unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "chainId": 1,
                "target": "0xTarget",
                "data": "0x",
                "user": "0xUser",
                "userNonce": 1,
                "userDeadline": 2,
                "userSignature": "0xsig",
                "sponsorApiKey": "cfg-key",
            })
        );

        let own_key = signed_request().sponsor_api_key("own-key");
        let payload = client.payload(Erc2771Type::SponsoredCall, &own_key).unwrap();
        assert_eq!(payload.sponsor_api_key.as_deref(), Some("own-key"));
    }

    #[test]
    fn test_payload_validation() {
        let client = RelayClient::new("https://relay.example/", None);

        let err = client
            .payload(Erc2771Type::SponsoredCall, &signed_request())
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation { field: "sponsorApiKey" }));

        let err = client
            .payload(Erc2771Type::CallWithSyncFee, &signed_request())
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation { field: "feeToken" }));

        let unsigned = RelayRequest::new(1, "0xTarget", "0x", "0xUser")
            .user_nonce(1)
            .user_deadline(2);
        let err = client
            .payload(Erc2771Type::CallWithSyncFee, &unsigned)
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation { field: "userSignature" }));

        let ok = client
            .payload(Erc2771Type::CallWithSyncFee, &signed_request().fee_token("0xToken", false))
            .unwrap();
        assert_eq!(ok.is_relay_context, Some(false));
    }

    #[test]
    fn test_task_status_parsing() {
        let body: TaskStatusResponse = serde_json::from_value(json!({
            "task": {
                "chainId": 5,
                "taskId": "0x93a3",
                "taskState": "ExecSuccess",
                "creationDate": "2023-06-01T10:00:00.000Z",
                "transactionHash": "0xabc",
                "blockNumber": 9114471
            }
        }))
        .unwrap();

        assert_eq!(body.task.task_state, TaskState::ExecSuccess);
        assert!(body.task.task_state.is_terminal());
        assert_eq!(body.task.block_number, Some(9114471));
        assert!(!TaskState::ExecPending.is_terminal());
        assert!(!TaskState::WaitingForConfirmation.is_terminal());
    }

    #[tokio::test]
    async fn test_submit_sync_fee_posts_to_endpoint() {
        let (url, seen) = serve(vec![(201, json!({"taskId": "0x93a3"}))]).await;
        let client = RelayClient::new(&url, Some(5_000));
        let request = signed_request().fee_token("0xToken", true);

        let task_id = client.submit(Erc2771Type::CallWithSyncFee, &request).await.unwrap();
        assert_eq!(task_id, "0x93a3");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "POST /relays/v2/call-with-sync-fee-erc2771 HTTP/1.1");
        let body: Value = serde_json::from_str(&seen[0].1).unwrap();
        assert_eq!(body["feeToken"], "0xToken");
        assert_eq!(body["isRelayContext"], true);
        assert_eq!(body["userSignature"], "0xsig");
        assert!(body.get("sponsorApiKey").is_none());
    }

    #[tokio::test]
    async fn test_submit_sponsored_posts_to_endpoint() {
        let (url, seen) = serve(vec![(200, json!({"taskId": "0xabcd"}))]).await;
        let client = RelayClient::new(&url, Some(5_000));
        let request = signed_request().sponsor_api_key("own-key");

        let task_id = client.submit(Erc2771Type::SponsoredCall, &request).await.unwrap();
        assert_eq!(task_id, "0xabcd");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "POST /relays/v2/sponsored-call-erc2771 HTTP/1.1");
        let body: Value = serde_json::from_str(&seen[0].1).unwrap();
        assert_eq!(body["sponsorApiKey"], "own-key");
        assert_eq!(body["userNonce"], 1);
        assert!(body.get("feeToken").is_none());
    }

    #[tokio::test]
    async fn test_submit_server_error_is_relay_error() {
        let (url, _) = serve(vec![(500, json!({"message": "internal error"}))]).await;
        let client = RelayClient::new(&url, Some(5_000));
        let request = signed_request().fee_token("0xToken", false);

        let err = client
            .submit(Erc2771Type::CallWithSyncFee, &request)
            .await
            .unwrap_err();
        match err {
            RelayError::Relay { endpoint, status, message } => {
                assert_eq!(endpoint, "/relays/v2/call-with-sync-fee-erc2771");
                assert_eq!(status, 500);
                assert!(message.contains("internal error"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_task_status_not_found_is_none() {
        let (url, seen) = serve(vec![(404, json!({"message": "Task not found"}))]).await;
        let client = RelayClient::new(&url, Some(5_000));

        assert!(client.get_task_status("0x93a3").await.unwrap().is_none());
        assert_eq!(seen.lock().unwrap()[0].0, "GET /tasks/status/0x93a3 HTTP/1.1");
    }

    #[tokio::test]
    async fn test_wait_for_task_stops_on_terminal_state() {
        let (url, seen) = serve(vec![
            (200, task("ExecPending")),
            (200, task("ExecSuccess")),
            (200, task("ExecSuccess")),
        ])
        .await;
        let client = RelayClient::new(&url, Some(5_000));

        let status = client.wait_for_task("0x93a3", 5, 1).await.unwrap().unwrap();
        assert_eq!(status.task_state, TaskState::ExecSuccess);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_wait_for_task_returns_last_status_when_attempts_run_out() {
        let (url, seen) = serve(vec![
            (200, task("CheckPending")),
            (200, task("WaitingForConfirmation")),
        ])
        .await;
        let client = RelayClient::new(&url, Some(5_000));

        let status = client.wait_for_task("0x93a3", 2, 1).await.unwrap().unwrap();
        assert_eq!(status.task_state, TaskState::WaitingForConfirmation);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
