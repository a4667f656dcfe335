//! Optional-parameter resolution and relay contract selection.

use async_trait::async_trait;
use relay_types::{parse_quantity, ChainConfig, RelayError, Result};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::{Erc2771Type, RelayConfig, RelayRequest, ResolvedOptionalParameters};

/// Chain ids whose relay contracts live at the zkSync deployment addresses.
pub const ZK_SYNC_CHAIN_IDS: &[&str] = &["324", "280"];

/// ABI fragment for the relay contracts' `userNonce(address)` view.
pub const USER_NONCE_ABI: &str = r#"[{"inputs":[{"internalType":"address","name":"account","type":"address"}],"name":"userNonce","outputs":[{"internalType":"uint256","name":"","type":"uint256"}],"stateMutability":"view","type":"function"}]"#;

/// Read-only contract call capability.
///
/// Implementations ABI-encode `args`, dispatch the call to `address` and
/// return the decoded outputs in order.
#[async_trait]
pub trait ContractCaller: Send + Sync {
    async fn call(&self, abi: &str, address: &str, method: &str, args: Vec<Value>) -> Result<Vec<Value>>;
}

pub fn is_zk_sync(chain_id: &str) -> bool {
    ZK_SYNC_CHAIN_IDS.contains(&chain_id)
}

/// Relay contract address for a request type on the configured chain.
pub fn select_relay_address<'a>(
    kind: Erc2771Type,
    config: &'a RelayConfig,
    chain: &ChainConfig,
) -> Result<&'a str> {
    let zk_sync = is_zk_sync(&chain.chain_id);
    let address = match (kind, zk_sync) {
        (Erc2771Type::CallWithSyncFee, true) => &config.zk_sync_erc2771_address,
        (Erc2771Type::CallWithSyncFee, false) => &config.erc2771_address,
        (Erc2771Type::SponsoredCall, true) => &config.zk_sync_one_balance_erc2771_address,
        (Erc2771Type::SponsoredCall, false) => &config.one_balance_erc2771_address,
    };

    if address.is_empty() {
        return Err(RelayError::Config(format!(
            "no relay contract configured for {} on chain {}",
            kind, chain.chain_id
        )));
    }
    Ok(address.as_str())
}

pub fn unix_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn calculate_deadline(now_secs: u64, deadline_gap_secs: u64) -> u64 {
    now_secs.saturating_add(deadline_gap_secs)
}

/// Read the user's current nonce from the relay contract.
pub async fn get_user_nonce(
    account: &str,
    kind: Erc2771Type,
    config: &RelayConfig,
    chain: &ChainConfig,
    caller: &dyn ContractCaller,
) -> Result<u64> {
    let address = select_relay_address(kind, config, chain)?;
    let result = caller
        .call(USER_NONCE_ABI, address, "userNonce", vec![Value::String(account.to_string())])
        .await?;

    let first = result
        .first()
        .ok_or_else(|| RelayError::transport("userNonce", "empty result"))?;
    parse_uint(first).ok_or_else(|| {
        RelayError::transport("userNonce", format!("unexpected userNonce result: {}", first))
    })
}

// Decoded uint outputs arrive as JSON numbers, decimal strings or hex quantities.
fn parse_uint(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if s.starts_with("0x") || s.starts_with("0X") => parse_quantity(s).ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Resolve the nonce and deadline `request` leaves empty.
pub async fn resolve_optional_parameters(
    request: &RelayRequest,
    kind: Erc2771Type,
    config: &RelayConfig,
    chain: &ChainConfig,
    caller: &dyn ContractCaller,
) -> Result<ResolvedOptionalParameters> {
    resolve_optional_parameters_at(request, kind, config, chain, caller, unix_time_secs()).await
}

/// As [`resolve_optional_parameters`], with the current time supplied.
pub async fn resolve_optional_parameters_at(
    request: &RelayRequest,
    kind: Erc2771Type,
    config: &RelayConfig,
    chain: &ChainConfig,
    caller: &dyn ContractCaller,
    now_secs: u64,
) -> Result<ResolvedOptionalParameters> {
    let mut resolved = ResolvedOptionalParameters::default();

    if request.user_deadline.is_none() {
        let deadline = calculate_deadline(now_secs, config.deadline_gap_secs);
        debug!(user = %request.user, deadline, "resolved user deadline");
        resolved.user_deadline = Some(deadline);
    }

    if request.user_nonce.is_none() {
        let nonce = get_user_nonce(&request.user, kind, config, chain, caller).await?;
        debug!(user = %request.user, %kind, nonce, "resolved user nonce");
        resolved.user_nonce = Some(nonce);
    }

    Ok(resolved)
}
