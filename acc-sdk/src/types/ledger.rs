use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::error::ResponseError;
use crate::proto::DecimalU256;

/// A balance and its value in the ledger's reference currency.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Balance in base units.
    #[serde_as(as = "DecimalU256")]
    pub balance: U256,
    /// Value of the balance in base units of the reference currency.
    #[serde_as(as = "DecimalU256")]
    pub value: U256,
}

/// Point and token balances of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    /// Loyalty point balance.
    pub point: Balance,
    /// Token balance.
    pub token: Balance,
}

impl UserBalance {
    /// Builds a balance from a response payload.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::MissingField`] if `point` or `token` is absent or
    /// null, and [`ResponseError::Decode`] if either has the wrong shape.
    pub fn from_data(data: Value) -> Result<Self, ResponseError> {
        let mut data = match data {
            Value::Object(map) => map,
            Value::Null => return Err(ResponseError::NullData),
            other => return Ok(serde_json::from_value(other)?),
        };
        let mut take = |field: &'static str| match data.remove(field) {
            None | Some(Value::Null) => Err(ResponseError::MissingField(field)),
            Some(value) => Ok(serde_json::from_value::<Balance>(value)?),
        };
        let point = take("point")?;
        let token = take("token")?;
        Ok(Self { point, token })
    }
}

/// Network section of a chain description.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainNetwork {
    /// Network name.
    pub name: String,
    /// EIP-155 chain id.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub chain_id: u64,
    /// ENS registry address.
    #[serde(default)]
    pub ens_address: String,
    /// Fee for a token transfer on this chain.
    #[serde_as(as = "DecimalU256")]
    pub chain_transfer_fee: U256,
    /// Fee for a bridge transfer of tokens.
    #[serde_as(as = "DecimalU256")]
    pub chain_bridge_fee: U256,
    /// Fee for a loyalty transfer.
    #[serde_as(as = "DecimalU256")]
    pub loyalty_transfer_fee: U256,
    /// Fee for a loyalty bridge transfer.
    #[serde_as(as = "DecimalU256")]
    pub loyalty_bridge_fee: U256,
}

/// Contract section of a chain description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainContract {
    /// Token contract.
    pub token: Address,
    /// Token bridge contract.
    pub chain_bridge: Address,
    /// Loyalty bridge contract.
    pub loyalty_bridge: Address,
}

/// Description of the main or side chain served by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// RPC URL of the chain.
    pub url: String,
    /// Network parameters.
    pub network: ChainNetwork,
    /// Deployed contracts.
    pub contract: ChainContract,
}
