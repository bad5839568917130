use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::proto::DecimalU256;

/// Settlement state of a shop.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopData {
    /// Shop id.
    pub shop_id: B256,
    /// Shop name.
    pub name: String,
    /// Shop currency.
    pub currency: String,
    /// Shop owner.
    pub account: Address,
    /// Delegated signer, zero if none.
    pub delegator: Address,
    /// Points provided to customers by this shop.
    #[serde_as(as = "DecimalU256")]
    pub provided_amount: U256,
    /// Points customers spent at this shop.
    #[serde_as(as = "DecimalU256")]
    pub used_amount: U256,
    /// Amount collected from settlement clients.
    #[serde_as(as = "DecimalU256")]
    pub collected_amount: U256,
    /// Amount already refunded to the shop.
    #[serde_as(as = "DecimalU256")]
    pub refunded_amount: U256,
    /// Server-owned shop status.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub status: i32,
}

impl ShopData {
    /// `collected + used - provided`, floored at zero.
    #[must_use]
    pub fn settled_amount(&self) -> U256 {
        self.collected_amount
            .saturating_add(self.used_amount)
            .saturating_sub(self.provided_amount)
    }
}

/// Amount a shop may currently refund.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopRefundableData {
    /// Refundable amount in the shop currency.
    #[serde_as(as = "DecimalU256")]
    pub refundable_amount: U256,
    /// Refundable amount converted to tokens.
    #[serde_as(as = "DecimalU256")]
    pub refundable_token: U256,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shop(provided: u64, used: u64, collected: u64) -> ShopData {
        serde_json::from_value(json!({
            "shopId": "0x0001be96d74202df38fd21462ffcef10dfe0fcbd7caa3947689a3903e8b6b874",
            "name": "Shop",
            "currency": "php",
            "account": "0x5A3Fc8990417b3e6ddCdAE0E8039E798A609Ef84",
            "delegator": "0x0000000000000000000000000000000000000000",
            "providedAmount": provided.to_string(),
            "usedAmount": used.to_string(),
            "collectedAmount": collected.to_string(),
            "refundedAmount": "0",
            "status": 1
        }))
        .unwrap()
    }

    #[test]
    fn settled_amount_is_floored() {
        assert_eq!(shop(100, 30, 20).settled_amount(), U256::ZERO);
        assert_eq!(shop(100, 80, 50).settled_amount(), U256::from(30u8));
    }
}
