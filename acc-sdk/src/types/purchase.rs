use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

/// One purchased product, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDetail {
    /// Product id.
    pub product_id: String,
    /// Unit price as a decimal literal, e.g. `"1000.5"`.
    pub amount: String,
    /// Loyalty rate in percent as a decimal literal; `"2.5"` means 2.5%.
    ///
    /// Digits past the second decimal place are truncated when the rate is sent.
    pub provide_percent: String,
}

impl PurchaseDetail {
    /// Creates a detail line.
    #[must_use]
    pub fn new(
        product_id: impl Into<String>,
        amount: impl Into<String>,
        provide_percent: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            amount: amount.into(),
            provide_percent: provide_percent.into(),
        }
    }
}

/// Receipt returned by the save server for a recorded purchase.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePurchaseResponse {
    /// Transaction type.
    #[serde(rename = "type")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub kind: i32,
    /// Sequence assigned by the save server.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub sequence: u64,
    /// Purchase id the receipt refers to.
    pub purchase_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn receipt_accepts_string_numbers() {
        let receipt: SavePurchaseResponse = serde_json::from_value(json!({
            "type": "0",
            "sequence": "12",
            "purchaseId": "P000001"
        }))
        .unwrap();
        assert_eq!(receipt.kind, 0);
        assert_eq!(receipt.sequence, 12);
    }
}
