//! ERC-2771 relay request builder and client.
//!
//! - Resolve a request's missing nonce/deadline
//! - Select the relay contract for the request type and chain
//! - Project the completed request into its signing struct
//! - Submit signed requests to the relay service

use serde::{Deserialize, Serialize};
use relay_types::{bytes_to_hex, Hex, RelayError, Result};
use std::fmt;
use std::str::FromStr;

pub mod builder;
pub mod params;
pub mod relay_client;
pub mod signing;

pub use builder::{Erc2771Builder, PreparedErc2771};
pub use params::{resolve_optional_parameters, select_relay_address, ContractCaller};
pub use relay_client::{RelayClient, TaskState, TaskStatus};
pub use signing::{CallWithSyncFeeErc2771, Erc2771Fields, Erc2771Struct, SponsoredCallErc2771};

pub const GELATO_RELAY_URL: &str = "https://api.gelato.digital";
pub const GELATO_RELAY_ERC2771_ADDRESS: &str = "0xb539068872230f20456CF38EC52EF2f91AF4AE49";
pub const GELATO_RELAY_ERC2771_ZKSYNC_ADDRESS: &str = "0x22DCC39b2AC376862183dd35A1664798dafC7Da6";
pub const GELATO_RELAY_1BALANCE_ERC2771_ADDRESS: &str = "0xd8253782c45a12053594b9deB72d8e8aB2Fca54c";
pub const GELATO_RELAY_1BALANCE_ERC2771_ZKSYNC_ADDRESS: &str =
    "0x97015cD4C3d456997DD1C40e2a18c79108FCc412";

/// Seconds a relay request stays valid when the user gives no deadline.
pub const DEFAULT_DEADLINE_GAP: u64 = 86_400;

/// How the relayed call is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Erc2771Type {
    /// The target contract pays the relayer out of the call itself.
    CallWithSyncFee,
    /// The developer's 1Balance account sponsors the call.
    SponsoredCall,
}

impl Erc2771Type {
    pub fn as_str(&self) -> &'static str {
        match self {
            Erc2771Type::CallWithSyncFee => "callWithSyncFee",
            Erc2771Type::SponsoredCall => "sponsoredCall",
        }
    }
}

impl fmt::Display for Erc2771Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Erc2771Type {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "callWithSyncFee" => Ok(Erc2771Type::CallWithSyncFee),
            "sponsoredCall" => Ok(Erc2771Type::SponsoredCall),
            other => Err(RelayError::Config(other.to_string())),
        }
    }
}

/// Relay service and contract configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayConfig {
    pub relay_url: String,
    pub sponsor_api_key: Option<String>,
    pub erc2771_address: Hex,
    pub zk_sync_erc2771_address: Hex,
    pub one_balance_erc2771_address: Hex,
    pub zk_sync_one_balance_erc2771_address: Hex,
    pub deadline_gap_secs: u64,
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            relay_url: GELATO_RELAY_URL.into(),
            sponsor_api_key: None,
            erc2771_address: GELATO_RELAY_ERC2771_ADDRESS.into(),
            zk_sync_erc2771_address: GELATO_RELAY_ERC2771_ZKSYNC_ADDRESS.into(),
            one_balance_erc2771_address: GELATO_RELAY_1BALANCE_ERC2771_ADDRESS.into(),
            zk_sync_one_balance_erc2771_address: GELATO_RELAY_1BALANCE_ERC2771_ZKSYNC_ADDRESS.into(),
            deadline_gap_secs: DEFAULT_DEADLINE_GAP,
            timeout_ms: 30_000,
        }
    }
}

/// ERC-2771 relay request.
///
/// `user_nonce` and `user_deadline` may be left empty and resolved later;
/// absent optional fields are omitted from the wire payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub chain_id: u64,
    /// Address the transaction is sent to.
    pub target: Hex,
    /// Calldata.
    pub data: Hex,
    /// Token the relayer is paid in (sync-fee calls).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_token: Option<Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_relay_context: Option<bool>,
    /// The user's EOA.
    pub user: Hex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_nonce: Option<u64>,
    /// Unix timestamp (seconds) after which the relay backend drops the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_deadline: Option<u64>,
    #[serde(rename = "userSignature", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor_api_key: Option<String>,
}

impl RelayRequest {
    pub fn new(chain_id: u64, target: &str, data: &str, user: &str) -> Self {
        Self {
            chain_id,
            target: target.to_string(),
            data: data.to_string(),
            fee_token: None,
            is_relay_context: None,
            user: user.to_string(),
            user_nonce: None,
            user_deadline: None,
            signature: None,
            sponsor_api_key: None,
        }
    }

    /// Request with raw calldata bytes.
    pub fn with_calldata(chain_id: u64, target: &str, calldata: &[u8], user: &str) -> Self {
        Self::new(chain_id, target, &bytes_to_hex(calldata), user)
    }

    pub fn fee_token(mut self, fee_token: &str, is_relay_context: bool) -> Self {
        self.fee_token = Some(fee_token.to_string());
        self.is_relay_context = Some(is_relay_context);
        self
    }

    pub fn user_nonce(mut self, nonce: u64) -> Self {
        self.user_nonce = Some(nonce);
        self
    }

    pub fn user_deadline(mut self, deadline: u64) -> Self {
        self.user_deadline = Some(deadline);
        self
    }

    pub fn sponsor_api_key(mut self, key: &str) -> Self {
        self.sponsor_api_key = Some(key.to_string());
        self
    }

    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    /// Copy of this request with `overrides` applied over its nonce and deadline.
    ///
    /// Fails before producing anything if either field would remain empty.
    pub fn merged(&self, overrides: &ResolvedOptionalParameters) -> Result<RelayRequest> {
        let user_nonce = overrides
            .user_nonce
            .or(self.user_nonce)
            .ok_or(RelayError::Validation { field: "userNonce" })?;
        let user_deadline = overrides
            .user_deadline
            .or(self.user_deadline)
            .ok_or(RelayError::Validation { field: "userDeadline" })?;

        let mut merged = self.clone();
        merged.user_nonce = Some(user_nonce);
        merged.user_deadline = Some(user_deadline);
        Ok(merged)
    }
}

/// Fields filled in by resolution; only the ones the request lacked are set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOptionalParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_deadline: Option<u64>,
}
