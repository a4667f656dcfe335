//! EIP-712 signing structs for ERC-2771 relay requests.

use relay_types::{RelayError, Result};
use serde::{Deserialize, Serialize};

use crate::{Erc2771Type, RelayRequest, ResolvedOptionalParameters};

/// EIP-712 field layout shared by the ERC-2771 relay structs.
pub const ERC2771_TYPE_FIELDS: &[(&str, &str)] = &[
    ("chainId", "uint256"),
    ("target", "address"),
    ("data", "bytes"),
    ("user", "address"),
    ("userNonce", "uint256"),
    ("userDeadline", "uint256"),
];

/// Textual field values of a fully resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc2771Fields {
    pub chain_id: String,
    pub target: String,
    pub data: String,
    pub user: String,
    pub user_nonce: String,
    pub user_deadline: String,
}

/// A signing struct the builder can produce.
pub trait Erc2771Struct: Sized {
    /// EIP-712 primary type name.
    const PRIMARY_TYPE: &'static str;
    /// Request type this struct is signed for.
    const KIND: Erc2771Type;

    fn from_fields(fields: Erc2771Fields) -> Self;

    fn type_fields() -> &'static [(&'static str, &'static str)] {
        ERC2771_TYPE_FIELDS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallWithSyncFeeErc2771 {
    pub chain_id: String,
    pub target: String,
    pub data: String,
    pub user: String,
    pub user_nonce: String,
    pub user_deadline: String,
}

impl Erc2771Struct for CallWithSyncFeeErc2771 {
    const PRIMARY_TYPE: &'static str = "CallWithSyncFeeERC2771";
    const KIND: Erc2771Type = Erc2771Type::CallWithSyncFee;

    fn from_fields(fields: Erc2771Fields) -> Self {
        Self {
            chain_id: fields.chain_id,
            target: fields.target,
            data: fields.data,
            user: fields.user,
            user_nonce: fields.user_nonce,
            user_deadline: fields.user_deadline,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredCallErc2771 {
    pub chain_id: String,
    pub target: String,
    pub data: String,
    pub user: String,
    pub user_nonce: String,
    pub user_deadline: String,
}

impl Erc2771Struct for SponsoredCallErc2771 {
    const PRIMARY_TYPE: &'static str = "SponsoredCallERC2771";
    const KIND: Erc2771Type = Erc2771Type::SponsoredCall;

    fn from_fields(fields: Erc2771Fields) -> Self {
        Self {
            chain_id: fields.chain_id,
            target: fields.target,
            data: fields.data,
            user: fields.user,
            user_nonce: fields.user_nonce,
            user_deadline: fields.user_deadline,
        }
    }
}

impl RelayRequest {
    /// Project this request, with `overrides` applied, into the signing struct `S`.
    ///
    /// Numeric fields become decimal strings; `self` is left untouched.
    pub fn map_to_struct<S: Erc2771Struct>(
        &self,
        overrides: &ResolvedOptionalParameters,
        kind: Erc2771Type,
    ) -> Result<S> {
        let merged = self.merged(overrides)?;
        if kind != S::KIND {
            return Err(RelayError::Config(format!(
                "{} request cannot be signed as {}",
                kind,
                S::PRIMARY_TYPE
            )));
        }
        Ok(S::from_fields(merged.signing_fields()))
    }

    fn signing_fields(&self) -> Erc2771Fields {
        Erc2771Fields {
            chain_id: self.chain_id.to_string(),
            target: self.target.clone(),
            data: self.data.clone(),
            user: self.user.clone(),
            user_nonce: self.user_nonce.map(|n| n.to_string()).unwrap_or_default(),
            user_deadline: self.user_deadline.map(|d| d.to_string()).unwrap_or_default(),
        }
    }
}
